//! EntityReader: ids to hydrated collections
//!
//! Basic reads return the row fields plus translated fields resolved along
//! the language chain. Detail reads additionally expand associations:
//! many-to-one targets, one-to-many children (by id) and translation rows
//! (by language). Results follow the order of the supplied ids, one entity
//! per distinct id.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::debug;
use trellis_core::{
    Association, AssociationKind, AssociationValue, BasicCollection, DetailCollection,
    DetailEntity, EntityId, EntitySchema, SchemaRegistry, ShopContext, TrellisError,
    TrellisResult,
};
use trellis_storage::VisibleRow;

use crate::engine::EngineInner;
use crate::path::resolve_hops;
use crate::scope::{foreign_key, ReadScope};

/// How a read treats ids that do not resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    /// Fail with `EntityNotFound` on the first missing id instead of
    /// omitting it
    pub strict: bool,
}

impl ReadOptions {
    /// Missing ids fail the read
    pub fn strict() -> Self {
        Self { strict: true }
    }

    /// Missing ids are silently absent
    pub fn lenient() -> Self {
        Self { strict: false }
    }
}

// ============================================================================
// Association trees
// ============================================================================

/// Associations to expand below one entity
#[derive(Debug, Default)]
struct AssociationTree<'r> {
    nodes: Vec<AssociationNode<'r>>,
}

#[derive(Debug)]
struct AssociationNode<'r> {
    association: &'r Association,
    target: &'r EntitySchema,
    children: AssociationTree<'r>,
}

impl<'r> AssociationTree<'r> {
    /// Every declared association of `schema`, one level deep
    fn all(registry: &'r SchemaRegistry, schema: &'r EntitySchema) -> TrellisResult<Self> {
        let mut tree = Self::default();
        for association in &schema.associations {
            let target = registry.schema(association.reference())?;
            tree.nodes.push(AssociationNode {
                association,
                target,
                children: Self::default(),
            });
        }
        Ok(tree)
    }

    /// The associations named by dotted `paths`, nested as written
    fn from_paths(
        registry: &'r SchemaRegistry,
        schema: &'r EntitySchema,
        paths: &[String],
    ) -> TrellisResult<Self> {
        let mut tree = Self::default();
        for path in paths {
            let names: Vec<&str> = path.split('.').collect();
            let hops = resolve_hops(registry, schema, &names)
                .map_err(|reason| TrellisError::invalid_criteria(&schema.entity, path, reason))?;

            let mut level = &mut tree;
            for hop in hops {
                let position = match level
                    .nodes
                    .iter()
                    .position(|n| n.association.name == hop.association.name)
                {
                    Some(position) => position,
                    None => {
                        level.nodes.push(AssociationNode {
                            association: hop.association,
                            target: hop.target,
                            children: Self::default(),
                        });
                        level.nodes.len() - 1
                    }
                };
                level = &mut level.nodes[position].children;
            }
        }
        Ok(tree)
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Stateless read handle over the engine
#[derive(Clone)]
pub struct EntityReader {
    inner: Arc<EngineInner>,
}

impl EntityReader {
    pub(crate) fn new(inner: Arc<EngineInner>) -> Self {
        Self { inner }
    }

    fn default_options(&self) -> ReadOptions {
        ReadOptions {
            strict: self.inner.config.strict_reads,
        }
    }

    /// Basic entities for `ids`, strictness from the configuration
    pub fn read_basic(
        &self,
        schema: &EntitySchema,
        ids: &[EntityId],
        context: &ShopContext,
    ) -> TrellisResult<BasicCollection> {
        self.read(schema, ids, context, self.default_options())
    }

    /// Basic entities for `ids`
    ///
    /// # Errors
    ///
    /// `EntityNotFound` for the first missing id in strict mode; `Schema`
    /// for an unregistered entity.
    pub fn read(
        &self,
        schema: &EntitySchema,
        ids: &[EntityId],
        context: &ShopContext,
        options: ReadOptions,
    ) -> TrellisResult<BasicCollection> {
        self.inner.check_registered(schema)?;
        let view = self.inner.store.view();
        let scope = self.inner.scope(&view, context);

        let rows = resolve_rows(&scope, schema, ids, options)?;
        let collection: BasicCollection =
            rows.iter().map(|row| scope.hydrate(schema, row)).collect();

        debug!(
            target: "trellis::read",
            entity = %schema.entity,
            version = %context.version_id,
            requested = ids.len(),
            found = collection.len(),
            "read basic"
        );
        Ok(collection)
    }

    /// Detail entities for `ids` with every declared association expanded
    /// one level deep
    pub fn read_detail(
        &self,
        schema: &EntitySchema,
        ids: &[EntityId],
        context: &ShopContext,
    ) -> TrellisResult<DetailCollection> {
        let tree = AssociationTree::all(&self.inner.registry, schema)?;
        self.read_tree(schema, ids, context, &tree, self.default_options())
    }

    /// Detail entities for `ids` expanding only the listed association
    /// paths (`"prices"`, `"manufacturer"`, `"prices.product"`)
    ///
    /// # Errors
    ///
    /// `InvalidCriteria` when a path does not name an association chain.
    pub fn read_detail_with(
        &self,
        schema: &EntitySchema,
        ids: &[EntityId],
        context: &ShopContext,
        associations: &[String],
    ) -> TrellisResult<DetailCollection> {
        let tree = AssociationTree::from_paths(&self.inner.registry, schema, associations)?;
        self.read_tree(schema, ids, context, &tree, self.default_options())
    }

    fn read_tree(
        &self,
        schema: &EntitySchema,
        ids: &[EntityId],
        context: &ShopContext,
        tree: &AssociationTree<'_>,
        options: ReadOptions,
    ) -> TrellisResult<DetailCollection> {
        self.inner.check_registered(schema)?;
        let view = self.inner.store.view();
        let scope = self.inner.scope(&view, context);

        let rows = resolve_rows(&scope, schema, ids, options)?;
        let collection: DetailCollection = rows
            .iter()
            .map(|row| detail(&scope, schema, row, tree))
            .collect();

        debug!(
            target: "trellis::read",
            entity = %schema.entity,
            version = %context.version_id,
            requested = ids.len(),
            found = collection.len(),
            associations = tree.nodes.len(),
            "read detail"
        );
        Ok(collection)
    }
}

/// Visible rows for `ids` in the order supplied, duplicates dropped
fn resolve_rows<'a>(
    scope: &ReadScope<'a>,
    schema: &EntitySchema,
    ids: &[EntityId],
    options: ReadOptions,
) -> TrellisResult<Vec<VisibleRow<'a>>> {
    let mut seen = FxHashSet::default();
    let mut rows: Vec<VisibleRow<'a>> = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            continue;
        }
        match scope.row(&schema.entity, *id) {
            Some(row) => rows.push(row),
            None if options.strict => {
                return Err(TrellisError::entity_not_found(&schema.entity, *id))
            }
            None => {}
        }
    }
    Ok(rows)
}

fn detail<'a>(
    scope: &ReadScope<'a>,
    schema: &EntitySchema,
    row: &VisibleRow<'a>,
    tree: &AssociationTree<'_>,
) -> DetailEntity {
    let mut entity = DetailEntity {
        basic: scope.hydrate(schema, row),
        associations: Default::default(),
    };

    for node in &tree.nodes {
        let value = match &node.association.kind {
            AssociationKind::ManyToOne {
                reference,
                local_field,
            } => AssociationValue::One(
                foreign_key(row, local_field)
                    .and_then(|id| scope.row(reference, id))
                    .map(|target| Box::new(detail(scope, node.target, &target, &node.children))),
            ),
            AssociationKind::OneToMany {
                reference,
                foreign_key,
            } => AssociationValue::Many(
                scope
                    .children(reference, foreign_key, row.id)
                    .iter()
                    .map(|child| detail(scope, node.target, child, &node.children))
                    .collect(),
            ),
            AssociationKind::Translations { .. } => AssociationValue::Many(
                scope
                    .translations(schema, row.id)
                    .iter()
                    .map(|child| detail(scope, node.target, child, &node.children))
                    .collect(),
            ),
        };
        entity
            .associations
            .insert(node.association.name.clone(), value);
    }
    entity
}
