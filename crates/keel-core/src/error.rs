//! Error types and result aliases for keel.
//!
//! Every store and queue call either succeeds or returns one of these
//! classified errors. Nothing in this crate retries internally; callers decide.

/// The result type used throughout keel.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in store, queue and addressing operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A resource identifier could not be parsed.
    #[error("malformed resource identifier '{id}': {reason}")]
    MalformedIdentifier {
        /// The input that failed to parse.
        id: String,
        /// What made it malformed.
        reason: String,
    },

    /// No object exists at the given identifier.
    #[error("the resource with id '{id}' was not found")]
    NotFound {
        /// The identifier that was looked up.
        id: String,
    },

    /// An ETag precondition was not satisfied.
    ///
    /// Raised for a stale ETag and also when a specific ETag was demanded for
    /// an object that does not exist.
    #[error("the operation on '{id}' failed because of a concurrency conflict")]
    Concurrency {
        /// The identifier whose precondition failed.
        id: String,
    },

    /// The store could not be reached or failed at the transport level.
    #[error("store unavailable: {message}")]
    StoreUnavailable {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The queue could not be reached or failed at the transport level.
    #[error("queue unavailable: {message}")]
    QueueUnavailable {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A dequeue found nothing visible.
    #[error("no message available")]
    NoMessageAvailable,

    /// A dequeued or completed message was unusable.
    #[error("invalid message: {message}")]
    InvalidMessage {
        /// Description of what was wrong with the message.
        message: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a malformed identifier error.
    #[must_use]
    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a not-found error for the given identifier.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a concurrency error for the given identifier.
    #[must_use]
    pub fn concurrency(id: impl Into<String>) -> Self {
        Self::Concurrency { id: id.into() }
    }

    /// Creates a store transport error with the given message.
    #[must_use]
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a store transport error with a source cause.
    #[must_use]
    pub fn store_unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a queue transport error with the given message.
    #[must_use]
    pub fn queue_unavailable(message: impl Into<String>) -> Self {
        Self::QueueUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a queue transport error with a source cause.
    #[must_use]
    pub fn queue_unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::QueueUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an invalid message error.
    #[must_use]
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }

    /// Returns true if this is a [`Error::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is a [`Error::Concurrency`].
    #[must_use]
    pub const fn is_concurrency(&self) -> bool {
        matches!(self, Self::Concurrency { .. })
    }

    /// Returns true for the dequeue outcomes a poller treats as routine:
    /// an empty queue or an unusable message.
    #[must_use]
    pub const fn is_empty_dequeue(&self) -> bool {
        matches!(self, Self::NoMessageAvailable | Self::InvalidMessage { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn not_found_display_names_the_id() {
        let err = Error::not_found("/planes/radius/local");
        assert!(err.to_string().contains("/planes/radius/local"));
        assert!(err.is_not_found());
        assert!(!err.is_concurrency());
    }

    #[test]
    fn concurrency_is_classified() {
        let err = Error::concurrency("/subscriptions/abc");
        assert!(err.is_concurrency());
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn empty_dequeue_classification() {
        assert!(Error::NoMessageAvailable.is_empty_dequeue());
        assert!(Error::invalid_message("bad payload").is_empty_dequeue());
        assert!(!Error::queue_unavailable("down").is_empty_dequeue());
    }

    #[test]
    fn store_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::store_unavailable_with_source("failed to connect", source);
        assert!(err.to_string().contains("store unavailable"));
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn serde_errors_become_serialization() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization { .. }));
    }
}
