//! Resource properties whose shape depends on a `mode` discriminator.
//!
//! A messaging queue is either provisioned by a recipe or described by
//! explicit values. Decoding reads `mode` and dispatches to the matching
//! variant; a missing or unrecognized mode decodes as [`QueueProperties::Base`].
//! Encoding writes `mode` back for the recipe and values variants.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::api::ProvisioningState;

/// Discriminator field name.
pub const MODE_FIELD: &str = "mode";

/// Properties shared by every queue variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicProperties {
    /// Environment the resource is deployed to.
    pub environment: String,
    /// Owning application, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    /// Provisioning state of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
}

/// A recipe reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Recipe name.
    pub name: String,
    /// Parameters passed to the recipe.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
}

/// Connection secrets of a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSecrets {
    /// Connection string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
}

/// Queue properties when no mode is given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseQueueProperties {
    /// Shared properties.
    #[serde(flatten)]
    pub basic: BasicProperties,
}

/// Queue properties provisioned by a recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeQueueProperties {
    /// Shared properties.
    #[serde(flatten)]
    pub basic: BasicProperties,
    /// Recipe that provisions the queue.
    pub recipe: Recipe,
    /// Queue name, when the recipe does not choose one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
}

/// Queue properties given as explicit values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuesQueueProperties {
    /// Shared properties.
    #[serde(flatten)]
    pub basic: BasicProperties,
    /// Queue name.
    pub queue: String,
    /// Connection secrets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<QueueSecrets>,
}

/// Messaging queue properties, discriminated by `mode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueProperties {
    /// No or unknown mode.
    Base(BaseQueueProperties),
    /// `mode: "recipe"`.
    Recipe(RecipeQueueProperties),
    /// `mode: "values"`.
    Values(ValuesQueueProperties),
}

impl Default for QueueProperties {
    fn default() -> Self {
        Self::Base(BaseQueueProperties::default())
    }
}

impl QueueProperties {
    /// The discriminator written for this variant.
    #[must_use]
    pub const fn mode(&self) -> Option<&'static str> {
        match self {
            Self::Base(_) => None,
            Self::Recipe(_) => Some("recipe"),
            Self::Values(_) => Some("values"),
        }
    }

    /// Shared properties of any variant.
    #[must_use]
    pub const fn basic(&self) -> &BasicProperties {
        match self {
            Self::Base(p) => &p.basic,
            Self::Recipe(p) => &p.basic,
            Self::Values(p) => &p.basic,
        }
    }
}

type Decoder = fn(Value) -> serde_json::Result<QueueProperties>;

fn decode_recipe(value: Value) -> serde_json::Result<QueueProperties> {
    serde_json::from_value(value).map(QueueProperties::Recipe)
}

fn decode_values(value: Value) -> serde_json::Result<QueueProperties> {
    serde_json::from_value(value).map(QueueProperties::Values)
}

const DECODERS: &[(&str, Decoder)] = &[("recipe", decode_recipe), ("values", decode_values)];

fn decode(mut value: Value) -> serde_json::Result<QueueProperties> {
    let mode = match value.as_object_mut() {
        Some(map) => map.remove(MODE_FIELD),
        None => None,
    };
    let decoder = mode
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|mode| DECODERS.iter().find(|(name, _)| *name == mode))
        .map(|(_, decoder)| *decoder);

    match decoder {
        Some(decoder) => decoder(value),
        None => serde_json::from_value(value).map(QueueProperties::Base),
    }
}

impl<'de> Deserialize<'de> for QueueProperties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Err(D::Error::custom("queue properties must be an object"));
        }
        decode(value).map_err(D::Error::custom)
    }
}

impl Serialize for QueueProperties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as _;

        let value = match self {
            Self::Base(p) => serde_json::to_value(p),
            Self::Recipe(p) => serde_json::to_value(p),
            Self::Values(p) => serde_json::to_value(p),
        }
        .map_err(S::Error::custom)?;

        let mut map = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Some(mode) = self.mode() {
            map.insert(MODE_FIELD.to_string(), Value::String(mode.to_string()));
        }
        map.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn recipe_mode() {
        let props: QueueProperties = serde_json::from_value(json!({
            "mode": "recipe",
            "environment": "env0",
            "recipe": {"name": "rabbitmq", "parameters": {"size": 1}}
        }))
        .unwrap();

        let QueueProperties::Recipe(recipe) = &props else {
            panic!("expected recipe variant, got {props:?}");
        };
        assert_eq!(recipe.recipe.name, "rabbitmq");
        assert_eq!(recipe.recipe.parameters["size"], json!(1));
        assert_eq!(props.basic().environment, "env0");
    }

    #[test]
    fn values_mode() {
        let props: QueueProperties = serde_json::from_value(json!({
            "mode": "values",
            "environment": "env0",
            "queue": "orders",
            "secrets": {"connectionString": "amqp://host"}
        }))
        .unwrap();

        assert_eq!(props.mode(), Some("values"));
        let QueueProperties::Values(values) = props else {
            panic!("expected values variant");
        };
        assert_eq!(values.queue, "orders");
        assert_eq!(
            values.secrets.and_then(|s| s.connection_string).as_deref(),
            Some("amqp://host")
        );
    }

    #[test]
    fn missing_or_unknown_mode_is_base() {
        for raw in [
            json!({"environment": "env0"}),
            json!({"environment": "env0", "mode": "manual"}),
            json!({"environment": "env0", "mode": 3}),
        ] {
            let props: QueueProperties = serde_json::from_value(raw).unwrap();
            assert!(matches!(props, QueueProperties::Base(_)), "{props:?}");
            assert_eq!(props.basic().environment, "env0");
        }
    }

    #[test]
    fn values_mode_requires_queue() {
        let result = serde_json::from_value::<QueueProperties>(json!({
            "mode": "values",
            "environment": "env0"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn serialization_writes_mode() {
        let props = QueueProperties::Values(ValuesQueueProperties {
            basic: BasicProperties {
                environment: "env0".into(),
                application: Some("app0".into()),
                provisioning_state: Some(ProvisioningState::Succeeded),
            },
            queue: "orders".into(),
            secrets: None,
        });
        let value = serde_json::to_value(&props).unwrap();
        assert_eq!(value["mode"], "values");
        assert_eq!(value["provisioningState"], "Succeeded");
        assert_eq!(serde_json::from_value::<QueueProperties>(value).unwrap(), props);

        let base = serde_json::to_value(QueueProperties::default()).unwrap();
        assert!(base.get("mode").is_none());
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(serde_json::from_value::<QueueProperties>(json!("recipe")).is_err());
    }
}
