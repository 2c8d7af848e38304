//! Read Integration Tests
//!
//! Basic and detail reads, strictness and translation fallback.

use std::collections::BTreeSet;

use serde_json::json;
use trellis_core::{
    testing, AssociationValue, EntityId, ErrorKind, ShopContext, Value, WriteContext,
};
use trellis_engine::{Engine, EngineConfig, NoFallback, ReadOptions};

fn setup() -> Engine {
    Engine::builder().registry(testing::catalog()).build().unwrap()
}

fn write_ctx() -> WriteContext {
    WriteContext::from_shop_context(&ShopContext::default())
}

fn insert(engine: &Engine, entity: &str, payload: serde_json::Value) -> EntityId {
    let schema = engine.registry().schema(entity).unwrap();
    let events = engine
        .version_manager()
        .insert(schema, &[payload], &write_ctx())
        .unwrap();
    events
        .iter()
        .find(|e| e.entity == entity)
        .map(|e| e.id)
        .unwrap()
}

// ============================================================================
// Basic reads
// ============================================================================

#[test]
fn test_read_basic_returns_existing_subset() {
    let engine = setup();
    let a = insert(&engine, "product", json!({ "name": "A", "stock": 1 }));
    let b = insert(&engine, "product", json!({ "name": "B", "stock": 2 }));
    let missing = EntityId::new();
    let product = engine.registry().schema("product").unwrap();

    let collection = engine
        .reader()
        .read_basic(product, &[b, missing, a, b], &ShopContext::default())
        .unwrap();

    assert_eq!(collection.ids(), vec![b, a]);
    let keys: BTreeSet<EntityId> = collection.ids().into_iter().collect();
    assert_eq!(keys, BTreeSet::from([a, b]));
    assert_eq!(collection.get(&a).unwrap().get_str("name"), Some("A"));
    assert_eq!(collection.get(&b).unwrap().get_int("stock"), Some(2));
}

#[test]
fn test_read_basic_fills_absent_fields_with_null() {
    let engine = setup();
    let id = insert(&engine, "product", json!({ "name": "Bare" }));
    let product = engine.registry().schema("product").unwrap();

    let collection = engine
        .reader()
        .read_basic(product, &[id], &ShopContext::default())
        .unwrap();
    let entity = collection.first().unwrap();
    assert_eq!(entity.get("stock"), Some(&Value::Null));
    assert_eq!(entity.get("description"), Some(&Value::Null));
    assert!(entity.version_id.is_live());
}

#[test]
fn test_strict_read_fails_on_missing_id() {
    let engine = setup();
    let a = insert(&engine, "product", json!({ "name": "A" }));
    let product = engine.registry().schema("product").unwrap();
    let missing = EntityId::new();

    let err = engine
        .reader()
        .read(
            product,
            &[a, missing],
            &ShopContext::default(),
            ReadOptions::strict(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EntityNotFound);

    let lenient = engine
        .reader()
        .read(
            product,
            &[a, missing],
            &ShopContext::default(),
            ReadOptions::lenient(),
        )
        .unwrap();
    assert_eq!(lenient.len(), 1);
}

#[test]
fn test_strict_reads_from_config() {
    let engine = Engine::builder()
        .registry(testing::catalog())
        .config(EngineConfig {
            strict_reads: true,
            ..EngineConfig::default()
        })
        .build()
        .unwrap();
    let product = engine.registry().schema("product").unwrap();

    let err = engine
        .reader()
        .read_basic(product, &[EntityId::new()], &ShopContext::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EntityNotFound);
}

// ============================================================================
// Detail reads
// ============================================================================

#[test]
fn test_read_detail_resolves_associations() {
    let engine = setup();
    let id = insert(
        &engine,
        "product",
        json!({
            "name": "Desk",
            "manufacturer": { "name": "Acme" },
            "prices": [
                { "quantity_start": 1, "amount": 100.0 },
                { "quantity_start": 10, "amount": 90.0 },
            ],
        }),
    );
    let product = engine.registry().schema("product").unwrap();

    let collection = engine
        .reader()
        .read_detail(product, &[id], &ShopContext::default())
        .unwrap();
    let desk = collection.first().unwrap();

    let manufacturer = desk.association("manufacturer").unwrap().as_one().unwrap();
    assert_eq!(manufacturer.get("name"), Some(&Value::from("Acme")));

    let prices = desk.association("prices").unwrap().as_many();
    let mut amounts: Vec<f64> = prices
        .iter()
        .filter_map(|p| p.get("amount").and_then(Value::as_f64))
        .collect();
    amounts.sort_by(f64::total_cmp);
    assert_eq!(amounts, vec![90.0, 100.0]);

    assert_eq!(
        desk.association("category"),
        Some(&AssociationValue::One(None))
    );
    assert_eq!(desk.association("translations").unwrap().as_many().len(), 1);
}

#[test]
fn test_read_detail_with_nested_paths() {
    let engine = setup();
    let product_id = insert(&engine, "product", json!({ "name": "Pen" }));
    let order_id = insert(
        &engine,
        "order",
        json!({
            "order_number": "10001",
            "line_items": [{ "quantity": 2, "product_id": product_id.to_string() }],
        }),
    );
    let order = engine.registry().schema("order").unwrap();

    let collection = engine
        .reader()
        .read_detail_with(
            order,
            &[order_id],
            &ShopContext::default(),
            &["line_items.product".to_string()],
        )
        .unwrap();
    let items = collection
        .first()
        .unwrap()
        .association("line_items")
        .unwrap()
        .as_many();
    assert_eq!(items.len(), 1);
    let product = items[0].association("product").unwrap().as_one().unwrap();
    assert_eq!(product.basic.id, product_id);
    assert_eq!(product.get("name"), Some(&Value::from("Pen")));

    let err = engine
        .reader()
        .read_detail_with(
            order,
            &[order_id],
            &ShopContext::default(),
            &["line_items.nothing".to_string()],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCriteria);
}

// ============================================================================
// Translations
// ============================================================================

fn insert_translated(engine: &Engine) -> EntityId {
    insert(
        engine,
        "product",
        json!({
            "translations": {
                "en-GB": { "name": "Chair", "description": "Wooden chair" },
                "de-DE": { "name": "Stuhl" },
            },
        }),
    )
}

#[test]
fn test_translation_in_requested_language() {
    let engine = setup();
    let id = insert_translated(&engine);
    let product = engine.registry().schema("product").unwrap();

    let ctx = ShopContext::new("de-DE");
    let entity = engine.reader().read_basic(product, &[id], &ctx).unwrap();
    let entity = entity.first().unwrap();
    assert_eq!(entity.get_str("name"), Some("Stuhl"));
    // Field-level fallback: de-DE has no description
    assert_eq!(entity.get_str("description"), Some("Wooden chair"));
}

#[test]
fn test_translation_fallback_chain() {
    let engine = setup();
    let id = insert_translated(&engine);
    let product = engine.registry().schema("product").unwrap();

    let swiss = ShopContext::new("de-CH").with_fallback_language("de-DE");
    let entity = engine.reader().read_basic(product, &[id], &swiss).unwrap();
    assert_eq!(entity.first().unwrap().get_str("name"), Some("Stuhl"));

    let french = ShopContext::new("fr-FR");
    let entity = engine.reader().read_basic(product, &[id], &french).unwrap();
    assert_eq!(entity.first().unwrap().get_str("name"), Some("Chair"));
}

#[test]
fn test_injected_locale_policy() {
    let engine = Engine::builder()
        .registry(testing::catalog())
        .locale_fallback(NoFallback)
        .build()
        .unwrap();
    let id = insert_translated(&engine);
    let product = engine.registry().schema("product").unwrap();

    let french = ShopContext::new("fr-FR");
    let entity = engine.reader().read_basic(product, &[id], &french).unwrap();
    assert_eq!(entity.first().unwrap().get("name"), Some(&Value::Null));
}

#[test]
fn test_search_on_translated_field_uses_fallback() {
    let engine = setup();
    let id = insert_translated(&engine);
    let product = engine.registry().schema("product").unwrap();
    let criteria = trellis_core::Criteria::new()
        .filter(trellis_core::Filter::equals("name", "Stuhl"));

    let german = engine
        .searcher()
        .search(product, &criteria, &ShopContext::new("de-DE"))
        .unwrap();
    assert_eq!(german.ids, vec![id]);

    let english = engine
        .searcher()
        .search(product, &criteria, &ShopContext::default())
        .unwrap();
    assert!(english.ids.is_empty());
}
