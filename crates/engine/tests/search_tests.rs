//! Search Integration Tests
//!
//! Filtering, ordering and pagination through EntitySearcher.

use proptest::prelude::*;
use serde_json::json;
use trellis_core::{
    testing, Criteria, EntityId, ErrorKind, Filter, Range, ShopContext, Sort, Value, WriteContext,
};
use trellis_engine::{Engine, EngineConfig};

fn setup() -> Engine {
    Engine::builder().registry(testing::catalog()).build().unwrap()
}

fn insert_product(engine: &Engine, name: &str, stock: i64) -> EntityId {
    let registry = engine.registry();
    let product = registry.schema("product").unwrap();
    let ctx = WriteContext::from_shop_context(&ShopContext::default());
    let events = engine
        .version_manager()
        .insert(product, &[json!({ "name": name, "stock": stock })], &ctx)
        .unwrap();
    events[0].id
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn test_insert_then_search_by_name() {
    let engine = setup();
    let chair = insert_product(&engine, "Chair", 3);
    insert_product(&engine, "Table", 1);

    let product = engine.registry().schema("product").unwrap();
    let criteria = Criteria::new().filter(Filter::equals("name", "Chair"));
    let result = engine
        .searcher()
        .search(product, &criteria, &ShopContext::default())
        .unwrap();

    assert_eq!(result.ids, vec![chair]);
    assert_eq!(result.total, 1);
}

#[test]
fn test_range_and_boolean_filters() {
    let engine = setup();
    let low = insert_product(&engine, "Low", 1);
    let mid = insert_product(&engine, "Mid", 5);
    let high = insert_product(&engine, "High", 10);
    let product = engine.registry().schema("product").unwrap();
    let ctx = ShopContext::default();

    let criteria = Criteria::new()
        .filter(Filter::range("stock", Range::new().gte(2).lt(10)))
        .sort(Sort::asc("stock"));
    let result = engine.searcher().search(product, &criteria, &ctx).unwrap();
    assert_eq!(result.ids, vec![mid]);

    let criteria = Criteria::new()
        .filter(Filter::or(vec![
            Filter::equals("stock", 1),
            Filter::prefix("name", "Hi"),
        ]))
        .sort(Sort::asc("stock"));
    let result = engine.searcher().search(product, &criteria, &ctx).unwrap();
    assert_eq!(result.ids, vec![low, high]);

    let criteria = Criteria::new()
        .filter(Filter::not(Filter::contains("name", "i")))
        .sort(Sort::asc("stock"));
    let result = engine.searcher().search(product, &criteria, &ctx).unwrap();
    assert_eq!(result.ids, vec![low]);
}

#[test]
fn test_filter_through_many_to_one() {
    let engine = setup();
    let registry = engine.registry();
    let product = registry.schema("product").unwrap();
    let ctx = WriteContext::from_shop_context(&ShopContext::default());

    let events = engine
        .version_manager()
        .insert(
            product,
            &[json!({ "name": "Lamp", "manufacturer": { "name": "Acme" } })],
            &ctx,
        )
        .unwrap();
    let lamp = events
        .iter()
        .find(|e| e.entity == "product")
        .map(|e| e.id)
        .unwrap();
    insert_product(&engine, "Rug", 1);

    let criteria = Criteria::new().filter(Filter::equals("manufacturer.name", "Acme"));
    let result = engine
        .searcher()
        .search(product, &criteria, &ShopContext::default())
        .unwrap();
    assert_eq!(result.ids, vec![lamp]);
}

#[test]
fn test_unknown_field_is_invalid_criteria() {
    let engine = setup();
    let product = engine.registry().schema("product").unwrap();
    let criteria = Criteria::new().filter(Filter::equals("weight", 3));
    let err = engine
        .searcher()
        .search(product, &criteria, &ShopContext::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCriteria);

    let criteria = Criteria::new().sort(Sort::asc("prices.amount"));
    let err = engine
        .searcher()
        .search(product, &criteria, &ShopContext::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCriteria);
}

#[test]
fn test_unregistered_entity_is_schema_error() {
    let engine = setup();
    let stranger = trellis_core::EntitySchema::new("stranger");
    let err = engine
        .searcher()
        .search(&stranger, &Criteria::new(), &ShopContext::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

// ============================================================================
// Ordering and pagination
// ============================================================================

#[test]
fn test_search_order_is_stable() {
    let engine = setup();
    for i in 0..10 {
        insert_product(&engine, &format!("P{}", i), i % 3);
    }
    let product = engine.registry().schema("product").unwrap();
    let criteria = Criteria::new().sort(Sort::desc("stock"));
    let ctx = ShopContext::default();

    let first = engine.searcher().search(product, &criteria, &ctx).unwrap();
    let second = engine.searcher().search(product, &criteria, &ctx).unwrap();
    assert_eq!(first.ids, second.ids);
    assert_eq!(first.total, 10);

    let stocks: Vec<i64> = engine
        .reader()
        .read_basic(product, &first.ids, &ctx)
        .unwrap()
        .iter()
        .map(|e| e.get_int("stock").unwrap())
        .collect();
    let mut sorted = stocks.clone();
    sorted.sort_by(|a, b| b.cmp(a));
    assert_eq!(stocks, sorted);
}

#[test]
fn test_configured_max_limit_caps_page() {
    let config = EngineConfig {
        max_limit: Some(2),
        ..EngineConfig::default()
    };
    let engine = Engine::builder()
        .registry(testing::catalog())
        .config(config)
        .build()
        .unwrap();
    for i in 0..5 {
        insert_product(&engine, &format!("P{}", i), i);
    }
    let product = engine.registry().schema("product").unwrap();

    let result = engine
        .searcher()
        .search(product, &Criteria::new(), &ShopContext::default())
        .unwrap();
    assert_eq!(result.ids.len(), 2);
    assert_eq!(result.total, 5);
}

#[test]
fn test_tenant_isolation() {
    let engine = setup();
    insert_product(&engine, "Chair", 1);
    let product = engine.registry().schema("product").unwrap();

    let other = ShopContext::default().with_tenant(trellis_core::TenantId::new());
    let result = engine
        .searcher()
        .search(product, &Criteria::new(), &other)
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.total, 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_pagination_bounds(
        stocks in prop::collection::vec(0i64..20, 0..15),
        offset in 0usize..20,
        limit in 0usize..10,
    ) {
        let engine = setup();
        for (i, stock) in stocks.iter().enumerate() {
            insert_product(&engine, &format!("P{}", i), *stock);
        }
        let product = engine.registry().schema("product").unwrap();
        let ctx = ShopContext::default();
        let base = Criteria::new()
            .filter(Filter::range("stock", Range::new().gte(5)))
            .sort(Sort::asc("stock"));

        let all = engine.searcher().search(product, &base, &ctx).unwrap();
        let page = engine
            .searcher()
            .search(product, &base.clone().offset(offset).limit(limit), &ctx)
            .unwrap();

        let expected = stocks.iter().filter(|s| **s >= 5).count();
        prop_assert_eq!(all.total, expected);
        prop_assert_eq!(page.total, all.total);
        prop_assert!(page.ids.len() <= limit);
        let window: Vec<EntityId> = all.ids.iter().skip(offset).take(limit).copied().collect();
        prop_assert_eq!(page.ids, window);
    }
}

#[test]
fn test_equals_any_matches_members() {
    let engine = setup();
    let a = insert_product(&engine, "A", 1);
    insert_product(&engine, "B", 2);
    let c = insert_product(&engine, "C", 3);
    let product = engine.registry().schema("product").unwrap();

    let criteria = Criteria::new()
        .filter(Filter::equals_any("stock", vec![Value::Int(1), Value::Int(3)]))
        .sort(Sort::asc("name"));
    let result = engine
        .searcher()
        .search(product, &criteria, &ShopContext::default())
        .unwrap();
    assert_eq!(result.ids, vec![a, c]);
}
