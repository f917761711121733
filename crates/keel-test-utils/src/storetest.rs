//! Behavior suite shared by every [`DatabaseClient`] implementation.
//!
//! Call [`run_database_conformance`] from an integration test with a client
//! and a closure that empties it. Each case starts from an empty store.

use keel_core::database::{DatabaseClient, Object, Query, QueryOptions, WritePrecondition};
use keel_core::etag;

use crate::fixtures::{
    self, NESTED_RESOURCE_TYPE_1, PLANE_SCOPE, RADIUS_SCOPE, RESOURCE_GROUP_1_SCOPE,
    RESOURCE_GROUP_2_SCOPE, RESOURCE_PATH_1, RESOURCE_TYPE_1, id,
};

/// Runs the full store conformance suite.
///
/// Panics with the failing case name on the first violation.
pub async fn run_database_conformance(client: &dyn DatabaseClient, clear: impl Fn()) {
    get_and_delete_missing(client, &clear).await;
    save_and_get(client, &clear).await;
    save_preconditions(client, &clear).await;
    delete_preconditions(client, &clear).await;
    queries(client, &clear).await;
}

/// Asserts two objects are equal apart from their ETags.
pub fn assert_same_object(expected: &Object, actual: &Object, case: &str) {
    assert_eq!(expected.metadata.id, actual.metadata.id, "{case}: id");
    assert_eq!(
        expected.metadata.id.to_string(),
        actual.metadata.id.to_string(),
        "{case}: id casing"
    );
    assert_eq!(expected.data, actual.data, "{case}: data");
}

/// Asserts two object sets are equal apart from order and ETags.
pub fn assert_same_objects(expected: &[&Object], actual: &[Object], case: &str) {
    let mut expected_ids: Vec<String> = expected.iter().map(|o| o.id().canonical_key()).collect();
    let mut actual_ids: Vec<String> = actual.iter().map(|o| o.id().canonical_key()).collect();
    expected_ids.sort();
    actual_ids.sort();
    assert_eq!(expected_ids, actual_ids, "{case}: ids");

    for want in expected {
        let got = actual
            .iter()
            .find(|o| o.id() == want.id())
            .unwrap_or_else(|| panic!("{case}: missing {}", want.id()));
        assert_same_object(want, got, case);
    }
}

fn stale_etag() -> String {
    etag::compute(&fixtures::data("2", "resource")).expect("etag")
}

async fn get_and_delete_missing(client: &dyn DatabaseClient, clear: &impl Fn()) {
    clear();
    let err = client.get(&fixtures::resource_1_id()).await.unwrap_err();
    assert!(err.is_not_found(), "get_not_found: {err}");

    let err = client
        .delete(&fixtures::resource_1_id(), WritePrecondition::None)
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "delete_not_found: {err}");
}

async fn save_and_get(client: &dyn DatabaseClient, clear: &impl Fn()) {
    for (case, target, data) in [
        ("save_and_get_arm", fixtures::arm_resource_id(), fixtures::data("1", "resource")),
        ("save_and_get_ucp", fixtures::resource_1_id(), fixtures::data("1", "resource")),
        ("save_and_get_scope", id(RESOURCE_GROUP_1_SCOPE), fixtures::data("1", "group")),
    ] {
        clear();
        let mut obj = fixtures::object(target.clone(), data);
        client.save(&mut obj, WritePrecondition::None).await.unwrap();
        assert!(!obj.etag().is_empty(), "{case}: etag set");

        let got = client.get(&target).await.unwrap();
        assert_same_object(&obj, &got, case);
        assert_eq!(got.etag(), obj.etag(), "{case}: etag round trip");
    }

    clear();
    let mut obj = fixtures::object(fixtures::resource_1_id(), fixtures::data("1", "resource"));
    client.save(&mut obj, WritePrecondition::None).await.unwrap();
    let first_etag = obj.etag().to_string();
    obj.data = fixtures::data("2", "resource");
    client.save(&mut obj, WritePrecondition::None).await.unwrap();
    assert_ne!(obj.etag(), first_etag, "save_can_update: etag changes");
    let got = client.get(&fixtures::resource_1_id()).await.unwrap();
    assert_same_object(&obj, &got, "save_can_update");
}

async fn save_preconditions(client: &dyn DatabaseClient, clear: &impl Fn()) {
    clear();
    let mut obj = fixtures::object(fixtures::resource_1_id(), fixtures::data("1", "resource"));
    client.save(&mut obj, WritePrecondition::None).await.unwrap();
    obj.data = fixtures::data("2", "resource");
    let current = obj.etag().to_string();
    client
        .save(&mut obj, WritePrecondition::MatchesETag(current))
        .await
        .unwrap();
    let got = client.get(&fixtures::resource_1_id()).await.unwrap();
    assert_same_object(&obj, &got, "save_can_update_matching_etag");

    clear();
    let mut obj = fixtures::object(fixtures::resource_1_id(), fixtures::data("1", "resource"));
    client.save(&mut obj, WritePrecondition::None).await.unwrap();
    let saved = obj.clone();
    obj.data = fixtures::data("2", "resource");
    let err = client
        .save(&mut obj, WritePrecondition::MatchesETag(stale_etag()))
        .await
        .unwrap_err();
    assert!(err.is_concurrency(), "save_cannot_update_not_matching_etag: {err}");
    let got = client.get(&fixtures::resource_1_id()).await.unwrap();
    assert_same_object(&saved, &got, "save_cannot_update_not_matching_etag");

    clear();
    let mut obj = fixtures::object(fixtures::resource_1_id(), fixtures::data("1", "resource"));
    let any_etag = etag::compute(&obj.data).expect("etag");
    let err = client
        .save(&mut obj, WritePrecondition::MatchesETag(any_etag))
        .await
        .unwrap_err();
    assert!(
        err.is_concurrency(),
        "save_cannot_update_missing_resource_with_etag: {err}"
    );
    let err = client.get(&fixtures::resource_1_id()).await.unwrap_err();
    assert!(err.is_not_found(), "save_cannot_update_missing_resource_with_etag: {err}");
}

async fn delete_preconditions(client: &dyn DatabaseClient, clear: &impl Fn()) {
    clear();
    let mut obj = fixtures::object(fixtures::resource_1_id(), fixtures::data("1", "resource"));
    client.save(&mut obj, WritePrecondition::None).await.unwrap();
    client
        .delete(&fixtures::resource_1_id(), WritePrecondition::None)
        .await
        .unwrap();
    let err = client.get(&fixtures::resource_1_id()).await.unwrap_err();
    assert!(err.is_not_found(), "save_and_delete: {err}");

    clear();
    let mut obj = fixtures::object(fixtures::resource_1_id(), fixtures::data("1", "resource"));
    client.save(&mut obj, WritePrecondition::None).await.unwrap();
    client
        .delete(
            &fixtures::resource_1_id(),
            WritePrecondition::MatchesETag(obj.etag().to_string()),
        )
        .await
        .unwrap();
    let err = client.get(&fixtures::resource_1_id()).await.unwrap_err();
    assert!(err.is_not_found(), "delete_with_matching_etag: {err}");

    clear();
    let mut obj = fixtures::object(fixtures::resource_1_id(), fixtures::data("1", "resource"));
    client.save(&mut obj, WritePrecondition::None).await.unwrap();
    let err = client
        .delete(&fixtures::resource_1_id(), WritePrecondition::MatchesETag(stale_etag()))
        .await
        .unwrap_err();
    assert!(err.is_concurrency(), "delete_with_non_matching_etag: {err}");
    client.get(&fixtures::resource_1_id()).await.unwrap();

    clear();
    let err = client
        .delete(&fixtures::resource_1_id(), WritePrecondition::MatchesETag(stale_etag()))
        .await
        .unwrap_err();
    assert!(err.is_concurrency(), "delete_missing_with_etag: {err}");
}

async fn queries(client: &dyn DatabaseClient, clear: &impl Fn()) {
    let all = QueryOptions::default();

    clear();
    let empty = client
        .query(&Query::new(id(RADIUS_SCOPE)).resource_type("asdf"), &all)
        .await
        .unwrap();
    assert!(empty.items.is_empty(), "list_can_be_empty");

    let mut group1 = fixtures::object(id(RESOURCE_GROUP_1_SCOPE), fixtures::data("1", "group"));
    let mut group2 = fixtures::object(id(RESOURCE_GROUP_2_SCOPE), fixtures::data("2", "group"));
    let mut obj1 = fixtures::object(fixtures::resource_1_id(), fixtures::data("1", "resource"));
    let mut obj2 = fixtures::object(fixtures::resource_2_id(), fixtures::data("2", "resource"));
    let mut nested: Vec<Object> = (1..=4)
        .map(|n| {
            fixtures::object(
                fixtures::nested_resource_id(n),
                fixtures::data(&format!("n{n}"), "resource"),
            )
        })
        .collect();
    let mut plane = fixtures::object(id(RADIUS_SCOPE), fixtures::data("1", "plane"));

    for obj in [&mut group1, &mut group2, &mut obj1, &mut obj2, &mut plane] {
        client.save(obj, WritePrecondition::None).await.unwrap();
    }
    for obj in &mut nested {
        client.save(obj, WritePrecondition::None).await.unwrap();
    }
    let all_nested: Vec<&Object> = nested.iter().collect();

    let cases: Vec<(&str, Query, Vec<&Object>)> = vec![
        (
            "query_resources_at_resource_group_scope",
            Query::new(id(RESOURCE_GROUP_1_SCOPE)).resource_type(NESTED_RESOURCE_TYPE_1),
            all_nested.clone(),
        ),
        (
            "query_resources_at_resource_group_scope_with_field_filter",
            Query::new(id(RESOURCE_GROUP_1_SCOPE))
                .resource_type(NESTED_RESOURCE_TYPE_1)
                .filter("value", "n1"),
            vec![&nested[0]],
        ),
        (
            "query_resources_at_resource_group_scope_with_prefix",
            Query::new(id(RESOURCE_GROUP_1_SCOPE))
                .resource_type(NESTED_RESOURCE_TYPE_1)
                .routing_scope_prefix(RESOURCE_PATH_1),
            vec![&nested[0], &nested[1]],
        ),
        (
            "query_scopes_at_resource_group_scope",
            Query::new(id(RESOURCE_GROUP_1_SCOPE))
                .scopes()
                .resource_type("resourceGroups"),
            vec![],
        ),
        (
            "query_resources_at_plane_scope",
            Query::new(id(RADIUS_SCOPE)).resource_type(RESOURCE_TYPE_1),
            vec![],
        ),
        (
            "query_resources_at_plane_scope_recursive",
            Query::new(id(RADIUS_SCOPE))
                .recursive()
                .resource_type(NESTED_RESOURCE_TYPE_1),
            all_nested.clone(),
        ),
        (
            "query_resources_at_plane_scope_recursive_with_field_filter",
            Query::new(id(RADIUS_SCOPE))
                .recursive()
                .resource_type(RESOURCE_TYPE_1)
                .filter("value", "1"),
            vec![&obj1],
        ),
        (
            "query_resources_at_plane_scope_recursive_with_prefix",
            Query::new(id(RADIUS_SCOPE))
                .recursive()
                .resource_type(NESTED_RESOURCE_TYPE_1)
                .routing_scope_prefix(RESOURCE_PATH_1),
            vec![&nested[0], &nested[1]],
        ),
        (
            "query_scopes_at_plane_scope",
            Query::new(id(PLANE_SCOPE)).scopes().resource_type("radius"),
            vec![&plane],
        ),
        (
            "query_scopes_at_plane_scope_recursive",
            Query::new(id(RADIUS_SCOPE))
                .recursive()
                .scopes()
                .resource_type("resourcegroups"),
            vec![&group1, &group2],
        ),
        (
            "query_scopes_with_filter_non_matching",
            Query::new(id(RADIUS_SCOPE))
                .scopes()
                .resource_type("resourcegroups")
                .filter("value", "asdf"),
            vec![],
        ),
        (
            "query_scopes_at_plane_scope_recursive_with_field_filter",
            Query::new(id(RADIUS_SCOPE))
                .recursive()
                .scopes()
                .resource_type("resourcegroups")
                .filter("value", "1"),
            vec![&group1],
        ),
    ];

    for (case, query, expected) in cases {
        let result = client.query(&query, &all).await.unwrap();
        assert_same_objects(&expected, &result.items, case);
    }
}
