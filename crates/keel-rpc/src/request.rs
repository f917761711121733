//! Work payload carried by queued async operations.

use std::time::Duration;

use keel_core::ResourceId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{OperationType, RequestContext, duration_secs};

/// Everything a worker needs to resume an operation from the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    /// Operation ID.
    #[serde(rename = "operationID")]
    pub operation_id: Uuid,
    /// Operation being performed.
    pub operation_type: OperationType,
    /// Target resource.
    #[serde(rename = "resourceID")]
    pub resource_id: ResourceId,
    /// Correlation ID for logs.
    #[serde(rename = "correlationID", default)]
    pub correlation_id: String,
    /// W3C trace context.
    #[serde(default)]
    pub traceparent: String,
    /// Caller's preferred language.
    #[serde(default)]
    pub accept_language: String,
    /// Tenant of the caller.
    #[serde(rename = "homeTenantID", default)]
    pub home_tenant_id: String,
    /// Object ID of the caller.
    #[serde(rename = "clientObjectID", default)]
    pub client_object_id: String,
    /// How long the worker may spend before the operation is abandoned.
    #[serde(with = "duration_secs")]
    pub operation_timeout: Duration,
}

impl OperationRequest {
    /// Builds the payload for a request.
    #[must_use]
    pub fn from_context(ctx: &RequestContext, operation_timeout: Duration) -> Self {
        Self {
            operation_id: ctx.operation_id,
            operation_type: ctx.operation_type.clone(),
            resource_id: ctx.resource_id.clone(),
            correlation_id: ctx.correlation_id.clone(),
            traceparent: ctx.traceparent.clone(),
            accept_language: ctx.accept_language.clone(),
            home_tenant_id: ctx.home_tenant_id.clone(),
            client_object_id: ctx.client_object_id.clone(),
            operation_timeout,
        }
    }

    /// Rebuilds the request context on the worker side.
    #[must_use]
    pub fn to_context(&self) -> RequestContext {
        RequestContext {
            resource_id: self.resource_id.clone(),
            operation_id: self.operation_id,
            operation_type: self.operation_type.clone(),
            home_tenant_id: self.home_tenant_id.clone(),
            client_object_id: self.client_object_id.clone(),
            traceparent: self.traceparent.clone(),
            accept_language: self.accept_language.clone(),
            correlation_id: self.correlation_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::OperationMethod;

    fn context() -> RequestContext {
        let mut ctx = RequestContext::new(
            ResourceId::parse(
                "/planes/radius/local/resourceGroups/radius-test-rg/providers/Applications.Core/containers/container0",
            )
            .unwrap(),
            OperationType::new("Applications.Core/environments", OperationMethod::Put),
        );
        ctx.home_tenant_id = "home-tenant-id".into();
        ctx.client_object_id = "client-object-id".into();
        ctx.traceparent = "trace".into();
        ctx.accept_language = "lang".into();
        ctx
    }

    #[test]
    fn wire_field_names() {
        let request = OperationRequest::from_context(&context(), Duration::from_secs(7200));
        let value = serde_json::to_value(&request).unwrap();

        assert!(value.get("operationID").is_some());
        assert!(value.get("resourceID").is_some());
        assert_eq!(value["operationType"], "APPLICATIONS.CORE/ENVIRONMENTS|PUT");
        assert_eq!(value["homeTenantID"], "home-tenant-id");
        assert_eq!(value["clientObjectID"], "client-object-id");
        assert_eq!(value["acceptLanguage"], "lang");
        assert_eq!(value["operationTimeout"], 7200);
    }

    #[test]
    fn worker_recovers_context() {
        let ctx = context();
        let request = OperationRequest::from_context(&ctx, Duration::from_secs(60));
        let decoded: OperationRequest =
            serde_json::from_slice(&serde_json::to_vec(&request).unwrap()).unwrap();
        assert_eq!(decoded.to_context(), ctx);
        assert_eq!(decoded.operation_timeout, Duration::from_secs(60));
    }
}
