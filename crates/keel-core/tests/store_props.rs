//! Property-based tests for ETag-guarded saves.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeMap;

use proptest::prelude::*;
use serde_json::{Map, Value};
use tokio_test::block_on;

use keel_core::database::{DatabaseClient, InMemoryClient, Object, WritePrecondition};
use keel_core::resource_id::ResourceId;

fn arb_fields() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z]{1,6}", "[a-zA-Z0-9 ]{0,12}", 1..8)
}

fn object_from(fields: impl Iterator<Item = (String, String)>) -> Value {
    let mut map = Map::new();
    for (k, v) in fields {
        map.insert(k, Value::String(v));
    }
    Value::Object(map)
}

fn target() -> ResourceId {
    ResourceId::parse("/planes/radius/local/resourceGroups/rg/providers/System.Test/things/a")
        .unwrap()
}

proptest! {
    #[test]
    fn etag_ignores_field_order(fields in arb_fields()) {
        let forward = object_from(fields.clone().into_iter());
        let backward = object_from(fields.into_iter().rev());

        let store = InMemoryClient::new();
        let mut a = Object::new(target(), forward);
        let mut b = Object::new(target(), backward);
        block_on(store.save(&mut a, WritePrecondition::None)).unwrap();
        block_on(store.save(&mut b, WritePrecondition::None)).unwrap();

        prop_assert_eq!(a.etag(), b.etag());
    }

    #[test]
    fn stale_etag_is_rejected(first in arb_fields(), second in arb_fields()) {
        let first = object_from(first.into_iter());
        let second = object_from(second.into_iter());
        prop_assume!(first != second);

        let store = InMemoryClient::new();
        let mut original = Object::new(target(), first);
        block_on(store.save(&mut original, WritePrecondition::None)).unwrap();
        let stale = original.etag().to_string();

        let mut updated = Object::new(target(), second);
        block_on(store.save(&mut updated, WritePrecondition::from_etag(&stale))).unwrap();
        prop_assert_ne!(updated.etag(), stale.as_str());

        let mut late = Object::new(target(), serde_json::json!({"late": true}));
        let err = block_on(store.save(&mut late, WritePrecondition::from_etag(&stale))).unwrap_err();
        prop_assert!(err.is_concurrency());

        let stored = block_on(store.get(&target())).unwrap();
        prop_assert_eq!(stored.etag(), updated.etag());
    }
}
