//! Operation status manager.
//!
//! Queueing an operation writes its status record and then enqueues the work
//! request. If the enqueue fails the record is deleted again, so callers never
//! see a status for work that will not run. When that delete also fails the
//! record is orphaned; this is logged with an `orphaned` marker, counted
//! separately and returned as [`Error::OrphanedStatus`].
//!
//! ```text
//! (none) ──queue──▶ Updating ──update──▶ Succeeded | Failed | Canceled
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keel_core::database::{DatabaseClient, Object, WritePrecondition};
use keel_core::observability::operation_span;
use keel_core::queue::{EnqueueOptions, Message, QueueClient};
use keel_core::ResourceId;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::api::{
    AsyncOperationStatus, ErrorDetails, ProvisioningState, RequestContext, duration_secs,
};
use crate::error::{Error, Result};
use crate::metrics::{OperationMetrics, compensation, queued};
use crate::request::OperationRequest;

/// Default time a worker may spend on an operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Default polling hint returned to clients.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(10);

/// The stored status record of an async operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    /// Client-visible status.
    #[serde(flatten)]
    pub operation: AsyncOperationStatus,
    /// The resource the operation acts on.
    #[serde(rename = "linkedResourceID")]
    pub linked_resource_id: ResourceId,
    /// Location that owns the record.
    pub location: String,
    /// Polling hint for clients.
    #[serde(with = "duration_secs")]
    pub retry_after: Duration,
    /// Tenant of the caller.
    #[serde(rename = "homeTenantID", default)]
    pub home_tenant_id: String,
    /// Object ID of the caller.
    #[serde(rename = "clientObjectID", default)]
    pub client_object_id: String,
}

/// Options for [`StatusManager::queue_async_operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOperationOptions {
    /// How long the worker may spend on the operation.
    pub operation_timeout: Duration,
    /// Polling hint stored on the status record.
    pub retry_after: Duration,
}

impl Default for QueueOperationOptions {
    fn default() -> Self {
        Self {
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            retry_after: DEFAULT_RETRY_AFTER,
        }
    }
}

/// Manages status records of async operations.
#[async_trait]
pub trait StatusManager: Send + Sync {
    /// Reads the status of an operation on `resource_id`.
    async fn get(&self, resource_id: &ResourceId, operation_id: Uuid) -> Result<Status>;

    /// Records a new operation and enqueues its work request.
    async fn queue_async_operation(
        &self,
        ctx: &RequestContext,
        options: QueueOperationOptions,
    ) -> Result<()>;

    /// Moves an operation to `state`, optionally setting its end time and error.
    async fn update(
        &self,
        resource_id: &ResourceId,
        operation_id: Uuid,
        state: ProvisioningState,
        end_time: Option<DateTime<Utc>>,
        error: Option<ErrorDetails>,
    ) -> Result<()>;

    /// Removes the status record of an operation.
    async fn delete(&self, resource_id: &ResourceId, operation_id: Uuid) -> Result<()>;
}

/// [`StatusManager`] backed by a versioned store and a queue.
#[derive(Clone)]
pub struct AsyncOperationStatusManager {
    database: Arc<dyn DatabaseClient>,
    queue: Arc<dyn QueueClient>,
    location: String,
    metrics: OperationMetrics,
}

impl std::fmt::Debug for AsyncOperationStatusManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncOperationStatusManager")
            .field("queue", &self.queue.queue_name())
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl AsyncOperationStatusManager {
    /// Creates a manager writing records for `location`.
    #[must_use]
    pub fn new(
        database: Arc<dyn DatabaseClient>,
        queue: Arc<dyn QueueClient>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            database,
            queue,
            location: location.into(),
            metrics: OperationMetrics::new(),
        }
    }

    /// The location records are written under.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Identifier of the status record for an operation on `resource_id`.
    ///
    /// # Errors
    ///
    /// Returns a malformed-identifier error if `resource_id` has no provider.
    pub fn status_id(&self, resource_id: &ResourceId, operation_id: Uuid) -> Result<ResourceId> {
        Ok(resource_id.operation_status_id(&self.location, &operation_id.to_string())?)
    }

    /// Deletes the record after a failed enqueue and classifies the outcome.
    async fn compensate(
        &self,
        status_id: &ResourceId,
        operation_id: Uuid,
        enqueue: keel_core::Error,
    ) -> Error {
        match self.database.delete(status_id, WritePrecondition::None).await {
            Ok(()) => {
                self.metrics.record_compensation(compensation::DELETED);
                tracing::warn!(
                    status_id = %status_id,
                    error = %enqueue,
                    "failed to enqueue async operation; removed its status record"
                );
                Error::Enqueue {
                    operation_id: operation_id.to_string(),
                    source: enqueue,
                }
            }
            Err(delete) => {
                self.metrics.record_compensation(compensation::ORPHANED);
                tracing::error!(
                    orphaned = true,
                    status_id = %status_id,
                    enqueue_error = %enqueue,
                    delete_error = %delete,
                    "failed to enqueue async operation and to remove its status record"
                );
                Error::OrphanedStatus {
                    operation_id: operation_id.to_string(),
                    enqueue,
                    delete,
                }
            }
        }
    }

    async fn queue_inner(&self, ctx: &RequestContext, options: QueueOperationOptions) -> Result<()> {
        let status_id = self.status_id(&ctx.resource_id, ctx.operation_id)?;
        let status = Status {
            operation: AsyncOperationStatus {
                id: status_id.to_string(),
                name: ctx.operation_id.to_string(),
                status: ProvisioningState::Updating,
                start_time: Utc::now(),
                end_time: None,
                percent_complete: None,
                error: None,
            },
            linked_resource_id: ctx.resource_id.clone(),
            location: self.location.clone(),
            retry_after: options.retry_after,
            home_tenant_id: ctx.home_tenant_id.clone(),
            client_object_id: ctx.client_object_id.clone(),
        };
        let mut object = Object::from_serializable(status_id.clone(), &status)?;
        let message = Message::from_json(&OperationRequest::from_context(
            ctx,
            options.operation_timeout,
        ))?;

        if let Err(err) = self.database.save(&mut object, WritePrecondition::None).await {
            self.metrics.record_queued(queued::SAVE_FAILED);
            tracing::error!(status_id = %status_id, error = %err, "failed to save async operation status");
            return Err(err.into());
        }

        if let Err(enqueue) = self.queue.enqueue(message, EnqueueOptions::new()).await {
            self.metrics.record_queued(queued::ENQUEUE_FAILED);
            return Err(self.compensate(&status_id, ctx.operation_id, enqueue).await);
        }

        self.metrics.record_queued(queued::QUEUED);
        tracing::info!(
            status_id = %status_id,
            operation_type = %ctx.operation_type,
            "queued async operation"
        );
        Ok(())
    }

    async fn get_inner(&self, resource_id: &ResourceId, operation_id: Uuid) -> Result<Status> {
        let status_id = self.status_id(resource_id, operation_id)?;
        let object = self.database.get(&status_id).await?;
        tracing::debug!(status_id = %status_id, etag = object.etag(), "read async operation status");
        Ok(object.as_type()?)
    }

    async fn delete_inner(&self, resource_id: &ResourceId, operation_id: Uuid) -> Result<()> {
        let status_id = self.status_id(resource_id, operation_id)?;
        self.database
            .delete(&status_id, WritePrecondition::None)
            .await?;
        tracing::debug!(status_id = %status_id, "deleted async operation status");
        Ok(())
    }

    async fn update_inner(
        &self,
        resource_id: &ResourceId,
        operation_id: Uuid,
        state: ProvisioningState,
        end_time: Option<DateTime<Utc>>,
        error: Option<ErrorDetails>,
    ) -> Result<()> {
        let status_id = self.status_id(resource_id, operation_id)?;
        let mut object = self.database.get(&status_id).await?;
        let mut status: Status = object.as_type()?;

        if status.operation.status.is_terminal() {
            tracing::warn!(
                from = %status.operation.status,
                to = %state,
                "updating an async operation that already finished"
            );
        }

        status.operation.status = state;
        if end_time.is_some() {
            status.operation.end_time = end_time;
        }
        if error.is_some() {
            status.operation.error = error;
        }
        object.data = serde_json::to_value(&status)?;

        self.database.save(&mut object, WritePrecondition::None).await?;
        self.metrics.record_update(state);
        tracing::debug!(state = %state, "updated async operation status");
        Ok(())
    }
}

#[async_trait]
impl StatusManager for AsyncOperationStatusManager {
    async fn get(&self, resource_id: &ResourceId, operation_id: Uuid) -> Result<Status> {
        let span = operation_span(
            "get_async_operation",
            &resource_id.to_string(),
            &operation_id.to_string(),
        );
        self.get_inner(resource_id, operation_id)
            .instrument(span)
            .await
    }

    async fn queue_async_operation(
        &self,
        ctx: &RequestContext,
        options: QueueOperationOptions,
    ) -> Result<()> {
        let span = operation_span(
            "queue_async_operation",
            &ctx.resource_id.to_string(),
            &ctx.operation_id.to_string(),
        );
        self.queue_inner(ctx, options).instrument(span).await
    }

    async fn update(
        &self,
        resource_id: &ResourceId,
        operation_id: Uuid,
        state: ProvisioningState,
        end_time: Option<DateTime<Utc>>,
        error: Option<ErrorDetails>,
    ) -> Result<()> {
        let span = operation_span(
            "update_async_operation",
            &resource_id.to_string(),
            &operation_id.to_string(),
        );
        self.update_inner(resource_id, operation_id, state, end_time, error)
            .instrument(span)
            .await
    }

    async fn delete(&self, resource_id: &ResourceId, operation_id: Uuid) -> Result<()> {
        let span = operation_span(
            "delete_async_operation",
            &resource_id.to_string(),
            &operation_id.to_string(),
        );
        self.delete_inner(resource_id, operation_id)
            .instrument(span)
            .await
    }
}
