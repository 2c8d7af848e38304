//! Integration tests for the storage layer
//!
//! These tests verify that RowStore works correctly as a complete system:
//! - Plane overlay resolution (live rows, version rows, tombstones)
//! - Transaction atomicity under concurrent access
//! - Plane index consistency across commits
//! - Version record lifecycle

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use trellis_core::{EntityId, TenantId, Value, VersionId};
use trellis_storage::{RowKey, RowSource, RowStore, VersionRecord};

// ============================================================================
// Helper Functions
// ============================================================================

fn fields(stock: i64) -> BTreeMap<String, Value> {
    BTreeMap::from([("stock".to_string(), Value::Int(stock))])
}

fn live_key(id: EntityId) -> RowKey {
    RowKey::new(TenantId::DEFAULT, "product", VersionId::LIVE, id)
}

fn seed(store: &RowStore, rows: &[(EntityId, i64)]) {
    store
        .transaction(|txn| {
            for (id, stock) in rows {
                txn.put(live_key(*id), fields(*stock));
            }
            Ok(())
        })
        .unwrap();
}

// ============================================================================
// Plane Overlay Tests
// ============================================================================

mod plane_overlay {
    use super::*;

    #[test]
    fn test_version_plane_sees_live_rows() {
        let store = RowStore::new();
        let id = EntityId::new();
        seed(&store, &[(id, 1)]);

        let version = VersionId::new();
        let view = store.view();
        let row = view
            .visible(TenantId::DEFAULT, "product", id, version)
            .unwrap();
        assert_eq!(row.version_id, VersionId::LIVE);
        assert_eq!(row.row.get("stock"), &Value::Int(1));
    }

    #[test]
    fn test_version_row_shadows_live_row() {
        let store = RowStore::new();
        let id = EntityId::new();
        seed(&store, &[(id, 1)]);
        let version = VersionId::new();

        store
            .transaction(|txn| {
                txn.put(live_key(id).in_plane(version), fields(5));
                Ok(())
            })
            .unwrap();

        let view = store.view();
        let in_version = view.visible(TenantId::DEFAULT, "product", id, version).unwrap();
        assert_eq!(in_version.version_id, version);
        assert_eq!(in_version.row.get("stock"), &Value::Int(5));

        // Live plane unaffected
        let live = view
            .visible(TenantId::DEFAULT, "product", id, VersionId::LIVE)
            .unwrap();
        assert_eq!(live.row.get("stock"), &Value::Int(1));
    }

    #[test]
    fn test_tombstone_hides_live_row_in_version_only() {
        let store = RowStore::new();
        let a = EntityId::new();
        let b = EntityId::new();
        seed(&store, &[(a, 1), (b, 2)]);
        let version = VersionId::new();

        store
            .transaction(|txn| {
                txn.put_tombstone(live_key(a).in_plane(version));
                Ok(())
            })
            .unwrap();

        let view = store.view();
        let ids: Vec<_> = view
            .visible_rows(TenantId::DEFAULT, "product", version)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![b]);
        assert_eq!(
            view.visible_rows(TenantId::DEFAULT, "product", VersionId::LIVE)
                .len(),
            2
        );
    }

    #[test]
    fn test_version_only_rows_invisible_live() {
        let store = RowStore::new();
        let id = EntityId::new();
        let version = VersionId::new();
        store
            .transaction(|txn| {
                txn.put(live_key(id).in_plane(version), fields(3));
                Ok(())
            })
            .unwrap();

        let view = store.view();
        assert!(view
            .visible(TenantId::DEFAULT, "product", id, VersionId::LIVE)
            .is_none());
        assert!(view.visible(TenantId::DEFAULT, "product", id, version).is_some());
    }

    #[test]
    fn test_tenants_are_isolated() {
        let store = RowStore::new();
        let id = EntityId::new();
        seed(&store, &[(id, 1)]);

        let other = TenantId::new();
        let view = store.view();
        assert!(view.visible(other, "product", id, VersionId::LIVE).is_none());
        assert!(view.visible_rows(other, "product", VersionId::LIVE).is_empty());
    }
}

// ============================================================================
// Version Plane Bookkeeping
// ============================================================================

mod version_planes {
    use super::*;

    #[test]
    fn test_plane_keys_span_entities() {
        let store = RowStore::new();
        let version = VersionId::new();
        let product = RowKey::new(TenantId::DEFAULT, "product", version, EntityId::new());
        let price = RowKey::new(TenantId::DEFAULT, "product_price", version, EntityId::new());

        store
            .transaction(|txn| {
                txn.put(product.clone(), fields(1));
                txn.put(price.clone(), fields(2));
                Ok(())
            })
            .unwrap();

        let keys = store.view().plane_keys(version);
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&product));
        assert!(keys.contains(&price));
    }

    #[test]
    fn test_version_exists_by_record_or_rows() {
        let store = RowStore::new();
        let with_record = VersionId::new();
        let with_rows = VersionId::new();

        store
            .transaction(|txn| {
                let now = txn.now();
                txn.put_version_record(VersionRecord {
                    version_id: with_record,
                    tenant: TenantId::DEFAULT,
                    name: None,
                    created_at: now,
                });
                txn.put(live_key(EntityId::new()).in_plane(with_rows), fields(1));
                Ok(())
            })
            .unwrap();

        let view = store.view();
        assert!(view.version_exists(with_record));
        assert!(view.version_exists(with_rows));
        assert!(!view.version_exists(VersionId::new()));
        assert!(view.version_exists(VersionId::LIVE));
    }

    #[test]
    fn test_removing_plane_rows_clears_index() {
        let store = RowStore::new();
        let version = VersionId::new();
        let key = live_key(EntityId::new()).in_plane(version);
        store
            .transaction(|txn| {
                txn.put(key.clone(), fields(1));
                Ok(())
            })
            .unwrap();
        store
            .transaction(|txn| {
                txn.remove(key.clone());
                Ok(())
            })
            .unwrap();

        assert!(store.view().plane_keys(version).is_empty());
        assert!(!store.view().version_exists(version));
    }
}

// ============================================================================
// Concurrency Tests
// ============================================================================

mod concurrency {
    use super::*;

    #[test]
    fn test_concurrent_writers_same_row_last_commit_wins() {
        let store = Arc::new(RowStore::new());
        let id = EntityId::new();
        seed(&store, &[(id, 0)]);

        let handles: Vec<_> = (1..=8)
            .map(|n| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .transaction(|txn| {
                            txn.put(live_key(id), fields(n));
                            Ok(())
                        })
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let view = store.view();
        let row = view.row(&live_key(id)).unwrap();
        let stock = row.get("stock").as_int().unwrap();
        assert!((1..=8).contains(&stock));
        // The surviving row is the one written by the last commit
        assert_eq!(row.commit_seq, store.current_commit_seq());
    }

    #[test]
    fn test_readers_never_see_partial_batches() {
        let store = Arc::new(RowStore::new());
        let ids: Vec<EntityId> = (0..10).map(|_| EntityId::new()).collect();
        seed(&store, &ids.iter().map(|id| (*id, 0)).collect::<Vec<_>>());

        let writer = {
            let store = Arc::clone(&store);
            let ids = ids.clone();
            thread::spawn(move || {
                for round in 1..=50 {
                    store
                        .transaction(|txn| {
                            for id in &ids {
                                txn.put(live_key(*id), fields(round));
                            }
                            Ok(())
                        })
                        .unwrap();
                }
            })
        };

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..200 {
                    let view = store.view();
                    let rows = view.visible_rows(TenantId::DEFAULT, "product", VersionId::LIVE);
                    let first = rows[0].row.get("stock").clone();
                    assert!(rows.iter().all(|r| r.row.get("stock") == &first));
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// The view of a version plane equals the live rows with the plane's
    /// rows applied on top.
    #[test]
    fn prop_overlay_matches_model(
        live in prop::collection::vec(0i64..100, 1..20),
        overlay in prop::collection::vec((0usize..20, prop::option::of(0i64..100)), 0..20),
    ) {
        let store = RowStore::new();
        let ids: Vec<EntityId> = live.iter().map(|_| EntityId::new()).collect();
        let version = VersionId::new();

        let mut model: BTreeMap<EntityId, i64> = BTreeMap::new();
        store.transaction(|txn| {
            for (id, stock) in ids.iter().zip(&live) {
                txn.put(live_key(*id), fields(*stock));
            }
            Ok(())
        }).unwrap();
        for (id, stock) in ids.iter().zip(&live) {
            model.insert(*id, *stock);
        }

        store.transaction(|txn| {
            for (index, write) in &overlay {
                let id = ids[index % ids.len()];
                let key = live_key(id).in_plane(version);
                match write {
                    Some(stock) => txn.put(key, fields(*stock)),
                    None => txn.put_tombstone(key),
                }
            }
            Ok(())
        }).unwrap();
        for (index, write) in &overlay {
            let id = ids[index % ids.len()];
            match write {
                Some(stock) => { model.insert(id, *stock); }
                None => { model.remove(&id); }
            }
        }

        let view = store.view();
        let seen: BTreeMap<EntityId, i64> = view
            .visible_rows(TenantId::DEFAULT, "product", version)
            .iter()
            .map(|r| (r.id, r.row.get("stock").as_int().unwrap()))
            .collect();
        prop_assert_eq!(seen, model);
    }
}
