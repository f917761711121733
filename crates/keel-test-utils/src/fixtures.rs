//! Identifiers and documents shared across tests.
//!
//! The layout is two resource groups under the local radius plane, resources
//! of two types, nested resources under `resourceType1`, and one ARM-style
//! resource group.

use keel_core::database::Object;
use keel_core::resource_id::ResourceId;
use serde_json::{Value, json};

/// Top-level resource type.
pub const RESOURCE_TYPE_1: &str = "System.Resources/resourceType1";
/// Second top-level resource type.
pub const RESOURCE_TYPE_2: &str = "System.Resources/resourceType2";
/// Nested resource type under [`RESOURCE_TYPE_1`].
pub const NESTED_RESOURCE_TYPE_1: &str = "System.Resources/resourceType1/nestedType";

/// Routing path of resource 1.
pub const RESOURCE_PATH_1: &str = "System.Resources/resourceType1/resource1";
/// Routing path of resource 2.
pub const RESOURCE_PATH_2: &str = "System.Resources/resourceType2/resource2";
/// Routing path of resource 3 (mixed-case name).
pub const RESOURCE_PATH_3: &str = "System.Resources/resourceType2/Resource3";
/// Nested resource paths; the first two sit under resource 1.
pub const NESTED_RESOURCE_PATHS: [&str; 4] = [
    "System.Resources/resourceType1/resource1/nestedType/nested1",
    "System.Resources/resourceType1/resource1/nestedType/nested2",
    "System.Resources/resourceType1/resource2/nestedType/nested3",
    "System.Resources/resourceType1/resource2/nestedType/nested4",
];

/// The local radius plane, written with a trailing slash.
pub const RADIUS_SCOPE: &str = "/planes/radius/local/";
/// The UCP root.
pub const PLANE_SCOPE: &str = "/planes";
/// First resource group.
pub const RESOURCE_GROUP_1_SCOPE: &str = "/planes/radius/local/resourceGroups/group1";
/// Second resource group.
pub const RESOURCE_GROUP_2_SCOPE: &str = "/planes/radius/local/resourceGroups/group2";
/// ARM-style resource group.
pub const ARM_RESOURCE_SCOPE: &str = "/subscriptions/abc/resourceGroups/group3";

/// Parses a fixture identifier.
pub fn id(raw: &str) -> ResourceId {
    ResourceId::parse(raw).expect("fixture identifiers are valid")
}

/// `<scope>/providers/<path>` as an identifier.
pub fn resource_id(scope: &str, path: &str) -> ResourceId {
    id(&format!("{scope}/providers/{path}"))
}

/// Resource 1 in group 1.
pub fn resource_1_id() -> ResourceId {
    resource_id(RESOURCE_GROUP_1_SCOPE, RESOURCE_PATH_1)
}

/// Resource 2 in group 2.
pub fn resource_2_id() -> ResourceId {
    resource_id(RESOURCE_GROUP_2_SCOPE, RESOURCE_PATH_2)
}

/// Resource 3 in group 2.
pub fn resource_3_id() -> ResourceId {
    resource_id(RESOURCE_GROUP_2_SCOPE, RESOURCE_PATH_3)
}

/// Nested resource `n` (1-4), all in group 1.
pub fn nested_resource_id(n: usize) -> ResourceId {
    resource_id(RESOURCE_GROUP_1_SCOPE, NESTED_RESOURCE_PATHS[n - 1])
}

/// Resource 1 under the ARM-style scope.
pub fn arm_resource_id() -> ResourceId {
    resource_id(ARM_RESOURCE_SCOPE, RESOURCE_PATH_1)
}

/// Document body with a top-level `value` and a nested `properties` map.
pub fn data(value: &str, property: &str) -> Value {
    json!({
        "value": value,
        "properties": { property: value },
    })
}

/// An unsaved object.
pub fn object(id: ResourceId, data: Value) -> Object {
    Object::new(id, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_parse() {
        assert_eq!(id(RADIUS_SCOPE).to_string(), "/planes/radius/local");
        assert!(id(PLANE_SCOPE).is_ucp_qualified());
        assert_eq!(nested_resource_id(4).name(), "nested4");
        assert_eq!(arm_resource_id().resource_type(), RESOURCE_TYPE_1);
        assert_eq!(resource_3_id().name(), "Resource3");
        assert_eq!(data("1", "group")["properties"]["group"], "1");
    }
}
