//! Criteria compilation and evaluation
//!
//! Shared by the searcher and the aggregator. A criteria is compiled once
//! per call: every path is resolved and every operator is checked against
//! the target field type, so malformed criteria fail with
//! `InvalidCriteria` before any row is touched. The compiled form is then
//! evaluated against the rows of a plane view.
//!
//! Term filters over to-many paths match when any reached value matches.

use std::cmp::Ordering;

use trellis_core::{
    Criteria, EntitySchema, Filter, FilterOperator, MultiOperator, Range, SchemaRegistry, Sort,
    SortDirection, TrellisError, TrellisResult, Value,
};
use trellis_storage::VisibleRow;

use crate::path::{resolve_hops, FieldPath};
use crate::scope::ReadScope;

// ============================================================================
// Value comparison
// ============================================================================

/// Equality used by filters: numbers compare numerically, everything else
/// strictly
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Order used by range filters, sorting and grouping
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.total_cmp(b),
    }
}

fn in_range(value: &Value, range: &Range) -> bool {
    if value.is_null() {
        return false;
    }
    let bound_ok = |bound: &Option<Value>, accept: fn(Ordering) -> bool| match bound {
        Some(b) => accept(compare_values(value, b)),
        None => true,
    };
    bound_ok(&range.gt, |o| o == Ordering::Greater)
        && bound_ok(&range.gte, |o| o != Ordering::Less)
        && bound_ok(&range.lt, |o| o == Ordering::Less)
        && bound_ok(&range.lte, |o| o != Ordering::Greater)
}

// ============================================================================
// Filters
// ============================================================================

/// A filter with its paths resolved
pub(crate) enum CompiledFilter<'r> {
    Term {
        path: FieldPath<'r>,
        operator: &'r FilterOperator,
    },
    Multi {
        operator: MultiOperator,
        filters: Vec<CompiledFilter<'r>>,
    },
    Not(Box<CompiledFilter<'r>>),
}

impl<'r> CompiledFilter<'r> {
    pub(crate) fn compile(
        registry: &'r SchemaRegistry,
        schema: &'r EntitySchema,
        filter: &'r Filter,
    ) -> TrellisResult<Self> {
        match filter {
            Filter::Term { field, operator } => {
                let path = FieldPath::resolve(registry, schema, field)?;
                check_operator(schema, &path, operator)?;
                Ok(CompiledFilter::Term { path, operator })
            }
            Filter::Multi { operator, filters } => {
                let filters = filters
                    .iter()
                    .map(|f| Self::compile(registry, schema, f))
                    .collect::<TrellisResult<Vec<_>>>()?;
                Ok(CompiledFilter::Multi {
                    operator: *operator,
                    filters,
                })
            }
            Filter::Not(inner) => Ok(CompiledFilter::Not(Box::new(Self::compile(
                registry, schema, inner,
            )?))),
        }
    }

    pub(crate) fn matches<'a>(&self, scope: &ReadScope<'a>, row: &VisibleRow<'a>) -> bool {
        match self {
            CompiledFilter::Term { path, operator } => {
                let values = path.values(scope, row);
                if values.is_empty() {
                    // Nothing reached: behaves like a single null value
                    return term_matches(&Value::Null, operator);
                }
                values.iter().any(|v| term_matches(v, operator))
            }
            CompiledFilter::Multi { operator, filters } => match operator {
                MultiOperator::And => filters.iter().all(|f| f.matches(scope, row)),
                MultiOperator::Or => filters.iter().any(|f| f.matches(scope, row)),
            },
            CompiledFilter::Not(inner) => !inner.matches(scope, row),
        }
    }
}

fn term_matches(value: &Value, operator: &FilterOperator) -> bool {
    match operator {
        FilterOperator::Equals(expected) => values_equal(value, expected),
        FilterOperator::NotEquals(expected) => !values_equal(value, expected),
        FilterOperator::EqualsAny(candidates) => candidates.iter().any(|c| values_equal(value, c)),
        FilterOperator::Contains(needle) => value
            .as_str()
            .map(|s| s.contains(needle.as_str()))
            .unwrap_or(false),
        FilterOperator::Prefix(prefix) => value
            .as_str()
            .map(|s| s.starts_with(prefix.as_str()))
            .unwrap_or(false),
        FilterOperator::Range(range) => in_range(value, range),
    }
}

fn check_operator(
    schema: &EntitySchema,
    path: &FieldPath<'_>,
    operator: &FilterOperator,
) -> TrellisResult<()> {
    let mismatch = |what: &str| {
        TrellisError::invalid_criteria(
            &schema.entity,
            &path.raw,
            format!("{} not supported on {} field", what, path.type_name()),
        )
    };
    let check_operand = |value: &Value| {
        if path.target.accepts(value) {
            Ok(())
        } else {
            Err(TrellisError::invalid_criteria(
                &schema.entity,
                &path.raw,
                format!(
                    "{} value does not fit {} field",
                    value.type_name(),
                    path.type_name()
                ),
            ))
        }
    };

    match operator {
        FilterOperator::Equals(v) | FilterOperator::NotEquals(v) => check_operand(v),
        FilterOperator::EqualsAny(values) => values.iter().try_for_each(check_operand),
        FilterOperator::Contains(_) if !path.target.is_textual() => Err(mismatch("contains")),
        FilterOperator::Prefix(_) if !path.target.is_textual() => Err(mismatch("prefix")),
        FilterOperator::Contains(_) | FilterOperator::Prefix(_) => Ok(()),
        FilterOperator::Range(_) if !path.target.is_ordered() => Err(mismatch("range")),
        FilterOperator::Range(range) => [&range.gt, &range.gte, &range.lt, &range.lte]
            .into_iter()
            .flatten()
            .try_for_each(check_operand),
    }
}

// ============================================================================
// Sorting
// ============================================================================

/// A sort key with its path resolved
pub(crate) struct CompiledSort<'r> {
    path: FieldPath<'r>,
    direction: SortDirection,
}

impl<'r> CompiledSort<'r> {
    fn compile(
        registry: &'r SchemaRegistry,
        schema: &'r EntitySchema,
        sort: &'r Sort,
    ) -> TrellisResult<Self> {
        let path = FieldPath::resolve(registry, schema, &sort.field)?;
        if path.is_to_many() {
            return Err(TrellisError::invalid_criteria(
                &schema.entity,
                &sort.field,
                "cannot sort by a to-many association path",
            ));
        }
        Ok(Self {
            path,
            direction: sort.direction,
        })
    }
}

// ============================================================================
// Compiled criteria
// ============================================================================

/// Filters and sorts of a criteria, resolved against one schema
pub(crate) struct CompiledCriteria<'r> {
    schema: &'r EntitySchema,
    filters: Vec<CompiledFilter<'r>>,
    sorts: Vec<CompiledSort<'r>>,
}

impl<'r> CompiledCriteria<'r> {
    /// Resolve every filter, sort, aggregation and association path of
    /// `criteria`
    pub(crate) fn compile(
        registry: &'r SchemaRegistry,
        schema: &'r EntitySchema,
        criteria: &'r Criteria,
    ) -> TrellisResult<Self> {
        let filters = criteria
            .filters()
            .iter()
            .map(|f| CompiledFilter::compile(registry, schema, f))
            .collect::<TrellisResult<Vec<_>>>()?;
        let sorts = criteria
            .sorts()
            .iter()
            .map(|s| CompiledSort::compile(registry, schema, s))
            .collect::<TrellisResult<Vec<_>>>()?;

        for path in criteria.associations() {
            let names: Vec<&str> = path.split('.').collect();
            resolve_hops(registry, schema, &names)
                .map_err(|reason| TrellisError::invalid_criteria(&schema.entity, path, reason))?;
        }
        for aggregation in criteria.aggregations() {
            for field in aggregation.kind.fields() {
                FieldPath::resolve(registry, schema, field)?;
            }
        }

        Ok(Self {
            schema,
            filters,
            sorts,
        })
    }

    /// Rows of the plane view matching every filter, ordered by id
    pub(crate) fn matching<'a>(&self, scope: &ReadScope<'a>) -> Vec<VisibleRow<'a>> {
        scope
            .rows(&self.schema.entity)
            .into_iter()
            .filter(|row| self.filters.iter().all(|f| f.matches(scope, row)))
            .collect()
    }

    /// Order rows by the sort keys, ties broken by id ascending
    pub(crate) fn sort<'a>(
        &self,
        scope: &ReadScope<'a>,
        rows: Vec<VisibleRow<'a>>,
    ) -> Vec<VisibleRow<'a>> {
        if self.sorts.is_empty() {
            // Already in id order
            return rows;
        }

        let mut keyed: Vec<(Vec<Value>, VisibleRow<'a>)> = rows
            .into_iter()
            .map(|row| {
                let keys = self
                    .sorts
                    .iter()
                    .map(|s| s.path.single_value(scope, &row))
                    .collect();
                (keys, row)
            })
            .collect();

        keyed.sort_by(|(ka, ra), (kb, rb)| {
            for (sort, (a, b)) in self.sorts.iter().zip(ka.iter().zip(kb.iter())) {
                let ord = compare_values(a, b);
                let ord = match sort.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            ra.id.cmp(&rb.id)
        });

        keyed.into_iter().map(|(_, row)| row).collect()
    }
}
