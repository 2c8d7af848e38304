//! Write Integration Tests
//!
//! Insert/update/upsert validation, written events and delete behaviour
//! of dependents.

use serde_json::json;
use trellis_core::{
    testing, Criteria, EntityId, ErrorKind, ShopContext, TrellisError, Value, WriteContext,
    WriteOperation,
};
use trellis_engine::Engine;

fn setup() -> Engine {
    Engine::builder().registry(testing::catalog()).build().unwrap()
}

fn ctx() -> WriteContext {
    WriteContext::from_shop_context(&ShopContext::default())
}

fn insert(engine: &Engine, entity: &str, payload: serde_json::Value) -> EntityId {
    let schema = engine.registry().schema(entity).unwrap();
    engine
        .version_manager()
        .insert(schema, &[payload], &ctx())
        .unwrap()
        .iter()
        .find(|e| e.entity == entity)
        .map(|e| e.id)
        .unwrap()
}

fn count(engine: &Engine, entity: &str) -> usize {
    let schema = engine.registry().schema(entity).unwrap();
    engine
        .searcher()
        .search(schema, &Criteria::new(), &ShopContext::default())
        .unwrap()
        .total
}

fn read_field(engine: &Engine, entity: &str, id: EntityId, field: &str) -> Option<Value> {
    let schema = engine.registry().schema(entity).unwrap();
    engine
        .reader()
        .read_basic(schema, &[id], &ShopContext::default())
        .unwrap()
        .first()
        .and_then(|e| e.get(field).cloned())
}

// ============================================================================
// Insert / update / upsert
// ============================================================================

#[test]
fn test_insert_events_cover_nested_rows() {
    let engine = setup();
    let product = engine.registry().schema("product").unwrap();
    let events = engine
        .version_manager()
        .insert(
            product,
            &[json!({
                "name": "Desk",
                "manufacturer": { "name": "Acme" },
                "prices": [{ "quantity_start": 1, "amount": 50.0 }],
            })],
            &ctx(),
        )
        .unwrap();

    let mut entities: Vec<&str> = events.iter().map(|e| e.entity.as_str()).collect();
    entities.sort_unstable();
    assert_eq!(
        entities,
        vec!["manufacturer", "product", "product_price", "product_translation"]
    );
    assert!(events.iter().all(|e| e.operation == WriteOperation::Insert));
    assert!(events.iter().all(|e| e.version_id.is_live()));
}

#[test]
fn test_insert_with_explicit_id() {
    let engine = setup();
    let id = EntityId::new();
    let got = insert(
        &engine,
        "manufacturer",
        json!({ "id": id.to_string(), "name": "Acme" }),
    );
    assert_eq!(got, id);

    let manufacturer = engine.registry().schema("manufacturer").unwrap();
    let err = engine
        .version_manager()
        .insert(
            manufacturer,
            &[json!({ "id": id.to_string(), "name": "Again" })],
            &ctx(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_insert_validation_errors() {
    let engine = setup();
    let product = engine.registry().schema("product").unwrap();
    let manager = engine.version_manager();

    let cases = [
        json!({ "stock": 1 }),
        json!({ "name": "X", "stock": "many" }),
        json!({ "name": "X", "weight": 3 }),
        json!([1, 2, 3]),
    ];
    for payload in cases {
        let err = manager.insert(product, &[payload], &ctx()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{}", err);
    }
    assert_eq!(count(&engine, "product"), 0);
}

#[test]
fn test_insert_dangling_foreign_key() {
    let engine = setup();
    let product = engine.registry().schema("product").unwrap();
    let err = engine
        .version_manager()
        .insert(
            product,
            &[json!({ "name": "X", "category_id": EntityId::new().to_string() })],
            &ctx(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EntityNotFound);
}

#[test]
fn test_failed_batch_writes_nothing() {
    let engine = setup();
    let product = engine.registry().schema("product").unwrap();
    let result = engine.version_manager().insert(
        product,
        &[json!({ "name": "Good" }), json!({ "name": 5 })],
        &ctx(),
    );
    assert!(result.is_err());
    assert_eq!(count(&engine, "product"), 0);
}

#[test]
fn test_update_changes_only_given_fields() {
    let engine = setup();
    let id = insert(&engine, "product", json!({ "name": "Chair", "stock": 3 }));
    let product = engine.registry().schema("product").unwrap();

    let events = engine
        .version_manager()
        .update(product, &[json!({ "id": id.to_string(), "stock": 7 })], &ctx())
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].operation, WriteOperation::Update);

    assert_eq!(read_field(&engine, "product", id, "stock"), Some(Value::Int(7)));
    assert_eq!(
        read_field(&engine, "product", id, "name"),
        Some(Value::from("Chair"))
    );
}

#[test]
fn test_update_translated_field_in_context_language() {
    let engine = setup();
    let id = insert(&engine, "product", json!({ "name": "Chair" }));
    let product = engine.registry().schema("product").unwrap();

    let german = WriteContext::from_shop_context(&ShopContext::new("de-DE"));
    engine
        .version_manager()
        .update(product, &[json!({ "id": id.to_string(), "name": "Stuhl" })], &german)
        .unwrap();

    let read = |language: &str| {
        engine
            .reader()
            .read_basic(product, &[id], &ShopContext::new(language))
            .unwrap()
            .first()
            .and_then(|e| e.get_str("name").map(str::to_string))
    };
    assert_eq!(read("de-DE").as_deref(), Some("Stuhl"));
    assert_eq!(read("en-GB").as_deref(), Some("Chair"));
}

#[test]
fn test_update_errors() {
    let engine = setup();
    let product = engine.registry().schema("product").unwrap();
    let manager = engine.version_manager();

    let err = manager
        .update(product, &[json!({ "stock": 1 })], &ctx())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = manager
        .update(
            product,
            &[json!({ "id": EntityId::new().to_string(), "stock": 1 })],
            &ctx(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EntityNotFound);
}

#[test]
fn test_upsert_inserts_then_updates() {
    let engine = setup();
    let manufacturer = engine.registry().schema("manufacturer").unwrap();
    let id = EntityId::new();
    let manager = engine.version_manager();

    let first = manager
        .upsert(
            manufacturer,
            &[json!({ "id": id.to_string(), "name": "Acme" })],
            &ctx(),
        )
        .unwrap();
    assert_eq!(first[0].operation, WriteOperation::Insert);

    let second = manager
        .upsert(
            manufacturer,
            &[json!({ "id": id.to_string(), "name": "Acme Corp" })],
            &ctx(),
        )
        .unwrap();
    assert_eq!(second[0].operation, WriteOperation::Update);
    assert_eq!(
        read_field(&engine, "manufacturer", id, "name"),
        Some(Value::from("Acme Corp"))
    );
    assert_eq!(count(&engine, "manufacturer"), 1);
}

#[test]
fn test_datetime_is_normalized() {
    let engine = setup();
    let id = insert(
        &engine,
        "product",
        json!({ "name": "Clock", "release_date": "2024-03-01T12:00:00+02:00" }),
    );
    assert_eq!(
        read_field(&engine, "product", id, "release_date"),
        Some(Value::from("2024-03-01T10:00:00Z"))
    );
}

// ============================================================================
// Deletes
// ============================================================================

#[test]
fn test_delete_cascades_to_owned_rows() {
    let engine = setup();
    let id = insert(
        &engine,
        "product",
        json!({
            "name": "Desk",
            "prices": [
                { "quantity_start": 1, "amount": 50.0 },
                { "quantity_start": 5, "amount": 45.0 },
            ],
        }),
    );
    assert_eq!(count(&engine, "product_price"), 2);
    assert_eq!(count(&engine, "product_translation"), 1);

    let product = engine.registry().schema("product").unwrap();
    let events = engine
        .version_manager()
        .delete(product, &[id], &ctx())
        .unwrap();

    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e.operation == WriteOperation::Delete));
    assert_eq!(count(&engine, "product"), 0);
    assert_eq!(count(&engine, "product_price"), 0);
    assert_eq!(count(&engine, "product_translation"), 0);
}

#[test]
fn test_delete_restricted_fails() {
    let engine = setup();
    let category = insert(&engine, "category", json!({ "name": "Chairs" }));
    let chair = insert(
        &engine,
        "product",
        json!({ "name": "Chair", "category_id": category.to_string() }),
    );
    let schema = engine.registry().schema("category").unwrap();

    let err = engine
        .version_manager()
        .delete(schema, &[category], &ctx())
        .unwrap_err();
    match err {
        TrellisError::ForeignKeyConstraint {
            entity,
            referenced_by,
            referencing_id,
            ..
        } => {
            assert_eq!(entity, "category");
            assert_eq!(referenced_by, "product");
            assert_eq!(referencing_id, chair);
        }
        other => panic!("expected foreign key error, got {}", other),
    }
    assert_eq!(count(&engine, "category"), 1);
}

#[test]
fn test_delete_sets_null_on_dependents() {
    let engine = setup();
    let manufacturer = insert(&engine, "manufacturer", json!({ "name": "Acme" }));
    let lamp = insert(
        &engine,
        "product",
        json!({ "name": "Lamp", "manufacturer_id": manufacturer.to_string() }),
    );
    let schema = engine.registry().schema("manufacturer").unwrap();

    let events = engine
        .version_manager()
        .delete(schema, &[manufacturer], &ctx())
        .unwrap();

    assert!(events
        .iter()
        .any(|e| e.entity == "product" && e.id == lamp && e.operation == WriteOperation::Update));
    assert_eq!(
        read_field(&engine, "product", lamp, "manufacturer_id"),
        Some(Value::Null)
    );
}

#[test]
fn test_delete_missing_id_is_skipped() {
    let engine = setup();
    let schema = engine.registry().schema("manufacturer").unwrap();
    let events = engine
        .version_manager()
        .delete(schema, &[EntityId::new()], &ctx())
        .unwrap();
    assert!(events.is_empty());
}
