//! Error types for async-operation handling.

/// The result type used throughout keel-rpc.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing async operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The work request could not be enqueued. The status record was removed.
    #[error("failed to enqueue async operation '{operation_id}': {source}")]
    Enqueue {
        /// The operation that was not queued.
        operation_id: String,
        /// The enqueue failure.
        #[source]
        source: keel_core::Error,
    },

    /// The work request could not be enqueued and removing the status record
    /// also failed, leaving an orphaned record.
    #[error(
        "failed to enqueue async operation '{operation_id}': {enqueue}; \
         removing its status record also failed: {delete}"
    )]
    OrphanedStatus {
        /// The operation whose record was left behind.
        operation_id: String,
        /// The enqueue failure.
        enqueue: keel_core::Error,
        /// The compensating delete failure.
        delete: keel_core::Error,
    },

    /// An operation type string could not be parsed.
    #[error("invalid operation type '{value}': {reason}")]
    InvalidOperationType {
        /// The input that failed to parse.
        value: String,
        /// What made it invalid.
        reason: String,
    },

    /// A response header could not be built.
    #[error("invalid header value for '{name}': {reason}")]
    InvalidHeader {
        /// Header name.
        name: String,
        /// What made the value invalid.
        reason: String,
    },

    /// Configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An error from keel-core.
    #[error(transparent)]
    Core(#[from] keel_core::Error),
}

impl Error {
    /// Returns true if the underlying store or queue reported a missing object.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Core(err) if err.is_not_found())
    }

    /// Returns true if a status record may have been left without queued work.
    #[must_use]
    pub const fn is_orphaned(&self) -> bool {
        matches!(self, Self::OrphanedStatus { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Core(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn orphaned_status_renders_both_failures() {
        let err = Error::OrphanedStatus {
            operation_id: "op-1".into(),
            enqueue: keel_core::Error::queue_unavailable("queue down"),
            delete: keel_core::Error::store_unavailable("store down"),
        };
        let text = err.to_string();
        assert!(text.contains("queue down"));
        assert!(text.contains("store down"));
        assert!(err.is_orphaned());
    }

    #[test]
    fn enqueue_error_exposes_source() {
        let err = Error::Enqueue {
            operation_id: "op-1".into(),
            source: keel_core::Error::queue_unavailable("queue down"),
        };
        assert!(StdError::source(&err).is_some());
        assert!(!err.is_orphaned());
    }

    #[test]
    fn core_not_found_is_classified() {
        let err: Error = keel_core::Error::not_found("/planes/radius/local").into();
        assert!(err.is_not_found());
    }
}
