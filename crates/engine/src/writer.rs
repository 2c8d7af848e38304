//! Write sessions
//!
//! A [`WriteSession`] runs inside one store transaction and applies
//! payloads, deletes and merged rows to a single plane. Reads inside the
//! session go through the transaction, so nested writes observe the rows
//! written earlier in the same call.
//!
//! ## Nested payloads
//!
//! 1. many-to-one objects are upserted first and the local key points at them
//! 2. the row itself is written (copy-on-write in a version plane)
//! 3. translations are upserted, one row per language
//! 4. one-to-many arrays are upserted with their foreign key set
//!
//! Every affected row is recorded once as a [`WrittenEvent`], in write
//! order.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use trellis_core::{
    Association, AssociationKind, EntityId, EntitySchema, FieldDefinition, LanguageId, OnDelete,
    SchemaRegistry, TenantId, TrellisError, TrellisResult, Value, VersionId, WriteContext,
    WriteOperation, WrittenEvent, ID_FIELD,
};
use trellis_storage::{RowKey, RowSource, StoredRow, Transaction};

use crate::merge::MergeUpsert;
use crate::payload::{as_object, coerce, payload_id, Payload};

/// How a payload treats an existing row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteMode {
    /// The row must not exist
    Insert,
    /// The row must exist
    Update,
    /// Insert or update by existence
    Upsert,
}

/// Writes against one plane inside an open transaction
pub(crate) struct WriteSession<'t, 's> {
    txn: &'t mut Transaction<'s>,
    registry: &'t SchemaRegistry,
    tenant: TenantId,
    plane: VersionId,
    language: LanguageId,
    events: Vec<WrittenEvent>,
    recorded: FxHashSet<(String, EntityId)>,
}

impl<'t, 's> WriteSession<'t, 's> {
    pub(crate) fn new(
        txn: &'t mut Transaction<'s>,
        registry: &'t SchemaRegistry,
        context: &WriteContext,
    ) -> Self {
        Self {
            txn,
            registry,
            tenant: context.tenant_id,
            plane: context.version_id,
            language: context.language_id.clone(),
            events: Vec::new(),
            recorded: FxHashSet::default(),
        }
    }

    /// Events of every affected row, first occurrence wins
    pub(crate) fn finish(self) -> Vec<WrittenEvent> {
        self.events
    }

    // ========================================================================
    // Row access
    // ========================================================================

    fn record(&mut self, entity: &str, id: EntityId, operation: WriteOperation) {
        if self.recorded.insert((entity.to_string(), id)) {
            self.events
                .push(WrittenEvent::new(entity, id, self.plane, operation));
        }
    }

    fn exists(&self, entity: &str, id: EntityId) -> bool {
        self.txn.visible(self.tenant, entity, id, self.plane).is_some()
    }

    fn visible_fields(&self, entity: &str, id: EntityId) -> Option<BTreeMap<String, Value>> {
        self.txn
            .visible(self.tenant, entity, id, self.plane)
            .map(|r| r.row.fields.clone())
    }

    /// Write `fields` to the session plane, keeping the visible row's
    /// creation time
    fn store_row(&mut self, entity: &str, id: EntityId, fields: BTreeMap<String, Value>) {
        let created_at = self
            .txn
            .visible(self.tenant, entity, id, self.plane)
            .map(|r| r.row.created_at);
        let mut row = StoredRow::new(fields, self.txn.now());
        if let Some(created_at) = created_at {
            row.created_at = created_at;
        }
        self.txn
            .put_row(RowKey::new(self.tenant, entity, self.plane, id), row);
    }

    /// Physical removal in live; in a version plane a tombstone when a
    /// live row is shadowed, removal of the version row otherwise
    fn remove_row(&mut self, entity: &str, id: EntityId) {
        let key = RowKey::new(self.tenant, entity, self.plane, id);
        if self.plane.is_live() {
            self.txn.remove(key);
            return;
        }
        let shadows_live = self
            .txn
            .row(&key.live())
            .map(|r| !r.tombstone)
            .unwrap_or(false);
        if shadows_live {
            self.txn.put_tombstone(key);
        } else {
            self.txn.remove(key);
        }
    }

    /// Visible rows of `entity` whose `field` holds `id`
    fn referencing(&self, entity: &str, field: &str, id: EntityId) -> Vec<EntityId> {
        self.txn
            .visible_rows(self.tenant, entity, self.plane)
            .into_iter()
            .filter(|r| r.row.get(field).as_str().and_then(EntityId::parse) == Some(id))
            .map(|r| r.id)
            .collect()
    }

    fn check_reference(&self, field: &FieldDefinition, value: &Value) -> TrellisResult<()> {
        let Some((reference, _)) = field.reference() else {
            return Ok(());
        };
        match value.as_str().and_then(EntityId::parse) {
            Some(target) if !self.exists(reference, target) => {
                Err(TrellisError::entity_not_found(reference, target))
            }
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Payload writes
    // ========================================================================

    /// Apply one payload, returning the id of the written row
    pub(crate) fn write(
        &mut self,
        schema: &EntitySchema,
        raw: &serde_json::Value,
        mode: WriteMode,
    ) -> TrellisResult<EntityId> {
        let registry = self.registry;
        let payload = as_object(schema, raw)?;

        let id = match (mode, payload_id(schema, payload)?) {
            (WriteMode::Update, None) => {
                return Err(TrellisError::validation(
                    &schema.entity,
                    ID_FIELD,
                    "update requires an id",
                ))
            }
            (_, Some(id)) => id,
            (_, None) => EntityId::new(),
        };

        let existing = self.visible_fields(&schema.entity, id);
        match (mode, existing.is_some()) {
            (WriteMode::Insert, true) => {
                return Err(TrellisError::validation(
                    &schema.entity,
                    ID_FIELD,
                    format!("{} already exists", id),
                ))
            }
            (WriteMode::Update, false) => {
                return Err(TrellisError::entity_not_found(&schema.entity, id))
            }
            _ => {}
        }
        let inserting = existing.is_none();
        let mut fields = existing.unwrap_or_default();

        let mut scalars: Vec<(&FieldDefinition, &serde_json::Value)> = Vec::new();
        let mut translated: Vec<(&FieldDefinition, &serde_json::Value)> = Vec::new();
        let mut nested: Vec<(&Association, &serde_json::Value)> = Vec::new();
        for (key, value) in payload {
            if key == ID_FIELD {
                continue;
            }
            if let Some(field) = schema.get_field(key) {
                if field.translated {
                    translated.push((field, value));
                } else {
                    scalars.push((field, value));
                }
            } else if let Some(association) = schema.get_association(key) {
                nested.push((association, value));
            } else {
                return Err(TrellisError::validation(
                    &schema.entity,
                    key,
                    "unknown field",
                ));
            }
        }

        for (field, raw) in scalars {
            let value = coerce(schema, field, raw)?;
            self.check_reference(field, &value)?;
            fields.insert(field.name.clone(), value);
        }

        for (association, raw) in &nested {
            if let AssociationKind::ManyToOne {
                reference,
                local_field,
            } = &association.kind
            {
                let value = if raw.is_null() {
                    match schema.get_field(local_field) {
                        Some(field) => coerce(schema, field, raw)?,
                        None => Value::Null,
                    }
                } else {
                    let target = self.write(registry.schema(reference)?, raw, WriteMode::Upsert)?;
                    Value::String(target.to_string())
                };
                fields.insert(local_field.clone(), value);
            }
        }

        if inserting {
            for field in schema.storage_fields().filter(|f| f.required) {
                if fields.get(&field.name).map_or(true, Value::is_null) {
                    return Err(TrellisError::validation(
                        &schema.entity,
                        &field.name,
                        "required field is missing",
                    ));
                }
            }
        }

        self.store_row(&schema.entity, id, fields);
        let operation = if inserting {
            WriteOperation::Insert
        } else {
            WriteOperation::Update
        };
        self.record(&schema.entity, id, operation);

        self.write_translations(schema, id, &translated, &nested)?;

        for (association, raw) in &nested {
            if let AssociationKind::OneToMany {
                reference,
                foreign_key,
            } = &association.kind
            {
                let child_schema = registry.schema(reference)?;
                let children = raw.as_array().ok_or_else(|| {
                    TrellisError::validation(
                        &schema.entity,
                        &association.name,
                        "expected an array of objects",
                    )
                })?;
                for child in children {
                    let mut child_payload = as_object(child_schema, child)?.clone();
                    child_payload.insert(
                        foreign_key.clone(),
                        serde_json::Value::String(id.to_string()),
                    );
                    self.write(
                        child_schema,
                        &serde_json::Value::Object(child_payload),
                        WriteMode::Upsert,
                    )?;
                }
            }
        }

        if inserting {
            self.check_required_translations(schema, id)?;
        }
        Ok(id)
    }

    /// Upsert translation rows from top-level translated fields (context
    /// language) and an explicit translations payload
    fn write_translations(
        &mut self,
        schema: &EntitySchema,
        id: EntityId,
        translated: &[(&FieldDefinition, &serde_json::Value)],
        nested: &[(&Association, &serde_json::Value)],
    ) -> TrellisResult<()> {
        let Some(association) = schema.translations() else {
            return Ok(());
        };
        let AssociationKind::Translations {
            reference,
            foreign_key,
            language_field,
        } = &association.kind
        else {
            return Ok(());
        };
        let registry = self.registry;
        let translation_schema = registry.schema(reference)?;

        let mut by_language: BTreeMap<String, Payload> = BTreeMap::new();
        for (_, raw) in nested
            .iter()
            .filter(|(a, _)| matches!(a.kind, AssociationKind::Translations { .. }))
        {
            match raw {
                serde_json::Value::Array(entries) => {
                    for entry in entries {
                        let values = as_object(translation_schema, entry)?;
                        let language = values
                            .get(language_field)
                            .and_then(serde_json::Value::as_str)
                            .ok_or_else(|| {
                                TrellisError::validation(
                                    &translation_schema.entity,
                                    language_field,
                                    "translation entry requires a language",
                                )
                            })?;
                        let slot = by_language.entry(language.to_string()).or_default();
                        slot.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                }
                serde_json::Value::Object(entries) => {
                    for (language, entry) in entries {
                        let values = as_object(translation_schema, entry)?;
                        let slot = by_language.entry(language.clone()).or_default();
                        slot.extend(values.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                }
                _ => {
                    return Err(TrellisError::validation(
                        &schema.entity,
                        &association.name,
                        "expected an array or an object keyed by language",
                    ))
                }
            }
        }

        if !translated.is_empty() {
            let slot = by_language
                .entry(self.language.as_str().to_string())
                .or_default();
            for (field, raw) in translated {
                slot.insert(field.name.clone(), (*raw).clone());
            }
        }

        for (language, mut values) in by_language {
            if language.trim().is_empty() {
                return Err(TrellisError::validation(
                    &translation_schema.entity,
                    language_field,
                    "language must not be empty",
                ));
            }
            let translation_id = EntityId::derived(id, &language);
            values.insert(
                ID_FIELD.to_string(),
                serde_json::Value::String(translation_id.to_string()),
            );
            values.insert(
                foreign_key.clone(),
                serde_json::Value::String(id.to_string()),
            );
            values.insert(language_field.clone(), serde_json::Value::String(language));
            self.write(
                translation_schema,
                &serde_json::Value::Object(values),
                WriteMode::Upsert,
            )?;
        }
        Ok(())
    }

    /// Every required translated field must hold a value in some language
    fn check_required_translations(
        &self,
        schema: &EntitySchema,
        id: EntityId,
    ) -> TrellisResult<()> {
        let required: Vec<&FieldDefinition> =
            schema.translated_fields().filter(|f| f.required).collect();
        if required.is_empty() {
            return Ok(());
        }
        let Some(AssociationKind::Translations {
            reference,
            foreign_key,
            ..
        }) = schema.translations().map(|a| &a.kind)
        else {
            return Ok(());
        };

        let rows = self.txn.visible_rows(self.tenant, reference, self.plane);
        let own: Vec<_> = rows
            .iter()
            .filter(|r| r.row.get(foreign_key).as_str().and_then(EntityId::parse) == Some(id))
            .collect();
        for field in required {
            if !own.iter().any(|r| !r.row.get(&field.name).is_null()) {
                return Err(TrellisError::validation(
                    &schema.entity,
                    &field.name,
                    "required translated field is missing",
                ));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Deletes
    // ========================================================================

    /// Delete `id` and handle its dependents
    ///
    /// Returns `false` when the row is not visible in the plane.
    pub(crate) fn delete(&mut self, schema: &EntitySchema, id: EntityId) -> TrellisResult<bool> {
        if !self.exists(&schema.entity, id) {
            return Ok(false);
        }
        let mut visiting = FxHashSet::default();
        self.delete_row(schema, id, &mut visiting)?;
        Ok(true)
    }

    fn delete_row(
        &mut self,
        schema: &EntitySchema,
        id: EntityId,
        visiting: &mut FxHashSet<(String, EntityId)>,
    ) -> TrellisResult<()> {
        if !visiting.insert((schema.entity.clone(), id)) {
            return Ok(());
        }
        let registry = self.registry;
        let dependents = registry.dependents_of(&schema.entity);

        for dependent in dependents
            .iter()
            .filter(|d| d.on_delete == OnDelete::Restrict)
        {
            let referencing = self.referencing(&dependent.entity, &dependent.field, id);
            if let Some(&referencing_id) = referencing.first() {
                return Err(TrellisError::ForeignKeyConstraint {
                    entity: schema.entity.clone(),
                    id,
                    referenced_by: dependent.entity.clone(),
                    referencing_id,
                });
            }
        }

        for dependent in dependents {
            match dependent.on_delete {
                OnDelete::Restrict => {}
                OnDelete::Cascade => {
                    let child_schema = registry.schema(&dependent.entity)?;
                    for child in self.referencing(&dependent.entity, &dependent.field, id) {
                        self.delete_row(child_schema, child, visiting)?;
                    }
                }
                OnDelete::SetNull => {
                    for child in self.referencing(&dependent.entity, &dependent.field, id) {
                        if let Some(mut fields) = self.visible_fields(&dependent.entity, child) {
                            fields.insert(dependent.field.clone(), Value::Null);
                            self.store_row(&dependent.entity, child, fields);
                            self.record(&dependent.entity, child, WriteOperation::Update);
                        }
                    }
                }
            }
        }

        self.remove_row(&schema.entity, id);
        self.record(&schema.entity, id, WriteOperation::Delete);
        Ok(())
    }

    // ========================================================================
    // Merges
    // ========================================================================

    /// Write a merged version row into the session plane
    ///
    /// A row whose fields equal the current row is left untouched and
    /// records nothing; returns whether the row was written.
    pub(crate) fn apply_merged(&mut self, upsert: MergeUpsert) -> bool {
        let key = RowKey::new(self.tenant, &upsert.entity, self.plane, upsert.id);
        let current = self.txn.row(&key).filter(|r| !r.tombstone);
        if current.is_some_and(|r| r.fields == upsert.fields) {
            return false;
        }
        let existing = current.map(|r| r.created_at);

        let mut row = StoredRow::new(upsert.fields, self.txn.now());
        row.created_at = existing.unwrap_or(upsert.created_at);
        self.txn.put_row(key, row);

        let operation = if existing.is_some() {
            WriteOperation::Update
        } else {
            WriteOperation::Insert
        };
        self.record(&upsert.entity, upsert.id, operation);
        true
    }
}
