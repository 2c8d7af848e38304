//! Repository Integration Tests
//!
//! Forwarding to the engine and lifecycle event dispatch.

use std::sync::Arc;

use serde_json::json;
use trellis_api::{
    EntityRepository, RecordingDispatcher, RepositoryEvent, TracingDispatcher,
    GENERIC_WRITTEN_EVENT,
};
use trellis_core::testing::{self, ManufacturerDefinition, ProductDefinition};
use trellis_core::{
    Aggregation, Criteria, EntityDefinition, EntitySchema, ErrorKind, Filter, ShopContext,
    Sort, TenantId, Value, VersionId,
};
use trellis_engine::Engine;

fn setup() -> (Engine, Arc<RecordingDispatcher>) {
    let engine = Engine::builder().registry(testing::catalog()).build().unwrap();
    (engine, Arc::new(RecordingDispatcher::new()))
}

fn products(
    engine: &Engine,
    recorder: &Arc<RecordingDispatcher>,
) -> EntityRepository<ProductDefinition> {
    EntityRepository::new(engine.clone(), recorder.clone()).unwrap()
}

fn ctx() -> ShopContext {
    ShopContext::default()
}

#[test]
fn test_create_then_search_dispatches_events() {
    let (engine, recorder) = setup();
    let repo = products(&engine, &recorder);

    let written = repo
        .create(&[json!({ "name": "Chair", "stock": 2 })], &ctx())
        .unwrap();
    let chair = written.written_ids("product")[0];
    assert_eq!(written.written_ids("product_translation").len(), 1);
    assert!(written.deleted.is_empty());

    let criteria = Criteria::new().filter(Filter::equals("name", "Chair"));
    let result = repo.search(&criteria, &ShopContext::default()).unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(result.entities.ids(), vec![chair]);
    assert_eq!(
        result.entities.get(&chair).unwrap().get_str("name"),
        Some("Chair")
    );
    assert!(result.aggregations.aggregations.is_empty());

    assert_eq!(
        recorder.names(),
        vec![
            GENERIC_WRITTEN_EVENT.to_string(),
            "product.search.result.loaded".to_string(),
        ]
    );
    match recorder.last() {
        Some(RepositoryEvent::SearchResultLoaded { entity, result: dispatched }) => {
            assert_eq!(entity, "product");
            assert_eq!(dispatched, result);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_search_with_aggregations() {
    let (engine, recorder) = setup();
    let repo = products(&engine, &recorder);
    repo.create(
        &[
            json!({ "name": "A", "stock": 1 }),
            json!({ "name": "B", "stock": 2 }),
            json!({ "name": "C", "stock": 3 }),
        ],
        &ctx(),
    )
    .unwrap();

    let criteria = Criteria::new()
        .sort(Sort::asc("stock"))
        .limit(2)
        .aggregation(Aggregation::sum("stock_sum", "stock"));
    let result = repo.search(&criteria, &ShopContext::default()).unwrap();

    assert_eq!(result.entities.len(), 2);
    assert_eq!(result.total, 3);
    assert_eq!(result.aggregations.scalar("stock_sum"), Some(&Value::Int(6)));
}

#[test]
fn test_read_and_id_search_events() {
    let (engine, recorder) = setup();
    let repo = products(&engine, &recorder);
    let id = repo
        .create(&[json!({ "name": "Lamp" })], &ctx())
        .unwrap()
        .written_ids("product")[0];
    recorder.clear();

    let ctx = ShopContext::default();
    repo.search_ids(&Criteria::new(), &ctx).unwrap();
    repo.aggregate(&Criteria::new().aggregation(Aggregation::count("n")), &ctx)
        .unwrap();
    repo.read_basic(&[id], &ctx).unwrap();
    let detail = repo.read_detail(&[id], &ctx).unwrap();
    assert!(detail.first().unwrap().association("translations").is_some());

    assert_eq!(
        recorder.names(),
        vec![
            "product.id.search.result.loaded",
            "product.aggregation.result.loaded",
            "product.basic.loaded",
            "product.detail.loaded",
        ]
    );
}

#[test]
fn test_search_detail_uses_criteria_associations() {
    let (engine, recorder) = setup();
    let repo = products(&engine, &recorder);
    repo.create(
        &[json!({
            "name": "Desk",
            "manufacturer": { "name": "Acme" },
            "prices": [{ "quantity_start": 1, "amount": 10.0 }],
        })],
        &ctx(),
    )
    .unwrap();

    let criteria = Criteria::new().association("manufacturer");
    let result = repo
        .search_detail(&criteria, &ShopContext::default())
        .unwrap();
    let desk = result.entities.first().unwrap();
    assert!(desk.association("manufacturer").unwrap().as_one().is_some());
    assert!(desk.association("prices").is_none());
    assert_eq!(recorder.names().last().unwrap(), "product.search.result.loaded");

    let everything = repo
        .search_detail(&Criteria::new(), &ShopContext::default())
        .unwrap();
    let desk = everything.entities.first().unwrap();
    assert_eq!(desk.association("prices").unwrap().as_many().len(), 1);
}

#[test]
fn test_delete_files_rows_under_deleted() {
    let (engine, recorder) = setup();
    let manufacturers: EntityRepository<ManufacturerDefinition> =
        EntityRepository::new(engine.clone(), recorder.clone()).unwrap();
    let repo = products(&engine, &recorder);

    let acme = manufacturers
        .create(&[json!({ "name": "Acme" })], &ctx())
        .unwrap()
        .written_ids("manufacturer")[0];
    let lamp = repo
        .create(
            &[json!({ "name": "Lamp", "manufacturer_id": acme.to_string() })],
            &ctx(),
        )
        .unwrap()
        .written_ids("product")[0];

    let event = manufacturers.delete(&[acme], &ctx()).unwrap();
    assert_eq!(event.deleted_ids("manufacturer"), vec![acme]);
    assert_eq!(event.written_ids("product"), vec![lamp]);

    let dispatched = recorder.last().unwrap();
    assert_eq!(dispatched.name(), GENERIC_WRITTEN_EVENT);
    assert_eq!(dispatched.as_written(), Some(&event));
}

#[test]
fn test_failed_call_dispatches_nothing() {
    let (engine, recorder) = setup();
    let repo = products(&engine, &recorder);

    let err = repo.create(&[json!({ "stock": 1 })], &ctx()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = repo
        .search(
            &Criteria::new().filter(Filter::equals("weight", 1)),
            &ShopContext::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidCriteria);
    assert!(recorder.is_empty());
}

#[test]
fn test_versioning_dispatches_nothing() {
    let (engine, recorder) = setup();
    let repo = products(&engine, &recorder);
    let id = repo
        .create(&[json!({ "name": "Desk", "stock": 1 })], &ctx())
        .unwrap()
        .written_ids("product")[0];
    recorder.clear();

    let version = repo.create_version(id, &ctx(), Some("draft"), None).unwrap();
    assert!(recorder.is_empty());

    repo.update(
        &[json!({ "id": id.to_string(), "stock": 9 })],
        &ctx().with_version(version),
    )
    .unwrap();
    assert_eq!(recorder.len(), 1);

    let info = repo.merge(version, &ctx()).unwrap();
    assert_eq!(info.version_id, version);
    assert_eq!(recorder.len(), 1);

    let live = repo.read_basic(&[id], &ShopContext::default()).unwrap();
    assert_eq!(live.first().unwrap().get_int("stock"), Some(9));
}

#[test]
fn test_unregistered_definition_is_rejected() {
    struct Ghost;
    impl EntityDefinition for Ghost {
        const ENTITY_NAME: &'static str = "ghost";
        fn schema() -> EntitySchema {
            EntitySchema::new(Self::ENTITY_NAME)
        }
    }

    let (engine, recorder) = setup();
    let err = EntityRepository::<Ghost>::new(engine, recorder).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[test]
fn test_tracing_dispatcher() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let engine = Engine::builder().registry(testing::catalog()).build().unwrap();
    let repo: EntityRepository<ProductDefinition> =
        EntityRepository::new(engine, Arc::new(TracingDispatcher)).unwrap();

    let written = repo.upsert(&[json!({ "name": "Pen" })], &ctx()).unwrap();
    assert!(!written.is_empty());
    assert_eq!(repo.entity(), "product");
}

#[test]
fn test_write_context_is_derived_from_shop_context() {
    let (engine, recorder) = setup();
    let repo = products(&engine, &recorder);
    let tenant = TenantId::new();
    let shop = ShopContext::default().with_tenant(tenant);

    let written = repo.create(&[json!({ "name": "Stuhl" })], &shop).unwrap();
    assert_eq!(written.context.tenant_id, tenant);
    assert_eq!(written.context.version_id, VersionId::LIVE);
    let chair = written.written_ids("product")[0];

    let found = repo.search_ids(&Criteria::new(), &shop).unwrap();
    assert_eq!(found.ids, vec![chair]);
    let elsewhere = repo.search_ids(&Criteria::new(), &ctx()).unwrap();
    assert!(elsewhere.ids.is_empty());

    let version = repo.create_version(chair, &shop, None, None).unwrap();
    let err = repo.merge(version, &ctx()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionNotFound);
    assert_eq!(repo.merge(version, &shop).unwrap().version_id, version);
}
