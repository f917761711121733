//! Metrics for async-operation handling.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `keel_async_operations_queued_total` | Counter | `result` | Outcomes of queueing an operation |
//! | `keel_async_operation_compensations_total` | Counter | `result` | Outcomes of removing a status record after an enqueue failure |
//! | `keel_async_operation_updates_total` | Counter | `state` | Status updates by new state |
//!
//! The dequeue loop in `keel-core` records `keel_dequeue_polls_total`.
//! Metrics go through the `metrics` crate facade; installing an exporter is
//! up to the binary.

use metrics::counter;

use crate::api::ProvisioningState;

/// Metric names.
pub mod names {
    /// Counter: outcomes of queueing an operation.
    pub const OPERATIONS_QUEUED_TOTAL: &str = "keel_async_operations_queued_total";
    /// Counter: outcomes of compensating deletes.
    pub const COMPENSATIONS_TOTAL: &str = "keel_async_operation_compensations_total";
    /// Counter: status updates by state.
    pub const UPDATES_TOTAL: &str = "keel_async_operation_updates_total";
}

/// Label keys.
pub mod labels {
    /// Outcome of a call.
    pub const RESULT: &str = "result";
    /// Provisioning state.
    pub const STATE: &str = "state";
}

/// `result` values for [`names::OPERATIONS_QUEUED_TOTAL`].
pub mod queued {
    /// Saved and enqueued.
    pub const QUEUED: &str = "queued";
    /// The status record could not be saved.
    pub const SAVE_FAILED: &str = "save_failed";
    /// The work request could not be enqueued.
    pub const ENQUEUE_FAILED: &str = "enqueue_failed";
}

/// `result` values for [`names::COMPENSATIONS_TOTAL`].
pub mod compensation {
    /// The status record was removed.
    pub const DELETED: &str = "deleted";
    /// The status record could not be removed.
    pub const ORPHANED: &str = "orphaned";
}

/// Records async-operation metrics with consistent labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationMetrics;

impl OperationMetrics {
    /// Creates a recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Increments [`names::OPERATIONS_QUEUED_TOTAL`].
    pub fn record_queued(self, result: &'static str) {
        counter!(names::OPERATIONS_QUEUED_TOTAL, labels::RESULT => result).increment(1);
    }

    /// Increments [`names::COMPENSATIONS_TOTAL`].
    pub fn record_compensation(self, result: &'static str) {
        counter!(names::COMPENSATIONS_TOTAL, labels::RESULT => result).increment(1);
    }

    /// Increments [`names::UPDATES_TOTAL`].
    pub fn record_update(self, state: ProvisioningState) {
        counter!(names::UPDATES_TOTAL, labels::STATE => state.as_str()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        let metrics = OperationMetrics::new();
        metrics.record_queued(queued::QUEUED);
        metrics.record_compensation(compensation::ORPHANED);
        metrics.record_update(ProvisioningState::Succeeded);
    }

    #[test]
    fn names_share_prefix() {
        for name in [
            names::OPERATIONS_QUEUED_TOTAL,
            names::COMPENSATIONS_TOTAL,
            names::UPDATES_TOTAL,
        ] {
            assert!(name.starts_with("keel_"));
            assert!(name.ends_with("_total"));
        }
    }
}
