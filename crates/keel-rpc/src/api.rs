//! Async-operation API types.
//!
//! These are the shapes exchanged with clients polling an operation and the
//! request metadata carried from the frontend into the status manager.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use keel_core::ResourceId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Lifecycle state of an async operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProvisioningState {
    /// Accepted but not started.
    #[default]
    Accepted,
    /// Work in progress.
    Updating,
    /// Completed successfully.
    Succeeded,
    /// Completed with an error.
    Failed,
    /// Cancelled before completion.
    Canceled,
}

impl ProvisioningState {
    /// Returns true for `Succeeded`, `Failed` and `Canceled`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    /// The state name as serialized.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::Updating => "Updating",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error information attached to a failed operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// The target of the error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Nested details.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetails>,
}

impl ErrorDetails {
    /// Creates error details with a code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            target: None,
            details: Vec::new(),
        }
    }
}

/// The client-visible status of an async operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncOperationStatus {
    /// Identifier of the operation-status record.
    pub id: String,
    /// Operation ID.
    pub name: String,
    /// Current state.
    pub status: ProvisioningState,
    /// When the operation started.
    pub start_time: DateTime<Utc>,
    /// When the operation reached a terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Progress, 0 to 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent_complete: Option<f64>,
    /// Failure details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// HTTP-style method of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationMethod {
    /// Create or replace.
    Put,
    /// Partial update.
    Patch,
    /// Delete.
    Delete,
    /// Read one.
    Get,
    /// Read many.
    List,
    /// Custom action.
    Post,
}

impl OperationMethod {
    /// The method name, upper-cased.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::List => "LIST",
            Self::Post => "POST",
        }
    }
}

impl FromStr for OperationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "GET" => Ok(Self::Get),
            "LIST" => Ok(Self::List),
            "POST" => Ok(Self::Post),
            _ => Err(Error::InvalidOperationType {
                value: s.to_string(),
                reason: "unknown method".into(),
            }),
        }
    }
}

impl fmt::Display for OperationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation on a resource type, written `TYPE|METHOD`.
///
/// ```rust
/// use keel_rpc::api::{OperationMethod, OperationType};
///
/// let op: OperationType = "Applications.Core/environments|put".parse().unwrap();
/// assert_eq!(op.method, OperationMethod::Put);
/// assert_eq!(op.to_string(), "APPLICATIONS.CORE/ENVIRONMENTS|PUT");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationType {
    /// Resource type, upper-cased.
    pub resource_type: String,
    /// Method.
    pub method: OperationMethod,
}

impl OperationType {
    /// Creates an operation type.
    #[must_use]
    pub fn new(resource_type: &str, method: OperationMethod) -> Self {
        Self {
            resource_type: resource_type.to_ascii_uppercase(),
            method,
        }
    }
}

impl FromStr for OperationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidOperationType {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let (resource_type, method) = s
            .split_once('|')
            .ok_or_else(|| invalid("expected TYPE|METHOD"))?;
        if resource_type.trim().is_empty() {
            return Err(invalid("resource type is empty"));
        }
        let method = method
            .trim()
            .parse::<OperationMethod>()
            .map_err(|_| invalid("unknown method"))?;
        Ok(Self::new(resource_type.trim(), method))
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.resource_type, self.method)
    }
}

impl Serialize for OperationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OperationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Request metadata captured by the frontend for an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Target resource.
    pub resource_id: ResourceId,
    /// Operation ID assigned to this request.
    pub operation_id: Uuid,
    /// Operation being performed.
    pub operation_type: OperationType,
    /// Tenant of the caller.
    pub home_tenant_id: String,
    /// Object ID of the caller.
    pub client_object_id: String,
    /// W3C trace context.
    pub traceparent: String,
    /// Caller's preferred language.
    pub accept_language: String,
    /// Correlation ID for logs.
    pub correlation_id: String,
}

impl RequestContext {
    /// Creates a context with a fresh operation ID and empty caller metadata.
    #[must_use]
    pub fn new(resource_id: ResourceId, operation_type: OperationType) -> Self {
        Self {
            resource_id,
            operation_id: Uuid::new_v4(),
            operation_type,
            home_tenant_id: String::new(),
            client_object_id: String::new(),
            traceparent: String::new(),
            accept_language: String::new(),
            correlation_id: String::new(),
        }
    }
}

/// Serde adapter writing a `Duration` as whole seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
