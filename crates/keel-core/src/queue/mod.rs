//! Durable queue contract.
//!
//! This module provides:
//!
//! - [`QueueClient`]: trait for at-least-once message queues
//! - [`Message`]: the envelope carried through the queue
//! - [`InMemoryQueue`]: in-memory queue for testing
//! - [`start_dequeuer`]: turns request/response dequeues into a stream
//!
//! ## Delivery model
//!
//! A dequeued message is hidden for a visibility window. If it is not
//! finished before the window passes it becomes visible again with its
//! dequeue count incremented. Messages past their expiry are dropped.

pub mod dequeuer;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use dequeuer::start_dequeuer;
pub use memory::InMemoryQueue;

/// Content type of JSON message bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Default interval between dequeue attempts.
pub const DEFAULT_DEQUEUE_INTERVAL: Duration = Duration::from_secs(1);

/// Delivery bookkeeping for a message. Set by the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Queue-assigned message ID.
    pub id: String,
    /// Number of times the message has been delivered.
    pub dequeue_count: u32,
    /// When the message was enqueued.
    pub enqueue_at: DateTime<Utc>,
    /// When the message expires and is dropped.
    pub expire_at: DateTime<Utc>,
    /// When the message becomes visible again.
    pub next_visible_at: DateTime<Utc>,
}

/// A queue message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Delivery bookkeeping.
    pub metadata: Metadata,
    /// MIME type of `data`.
    pub content_type: String,
    /// Message body.
    pub data: Bytes,
}

impl Message {
    /// Creates a message with the given content type and body.
    #[must_use]
    pub fn new(content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            metadata: Metadata::default(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Creates a JSON message from a serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if `value` cannot be encoded.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::new(JSON_CONTENT_TYPE, serde_json::to_vec(value)?))
    }

    /// Decodes a JSON message body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMessage`] if the content type is not JSON and
    /// [`Error::Serialization`] if the body does not match `T`.
    pub fn as_json<T: DeserializeOwned>(&self) -> Result<T> {
        if !self.content_type.eq_ignore_ascii_case(JSON_CONTENT_TYPE) {
            return Err(Error::invalid_message(format!(
                "unsupported content type '{}'",
                self.content_type
            )));
        }
        Ok(serde_json::from_slice(&self.data)?)
    }

    /// The queue-assigned message ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

/// Options for enqueueing.
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    /// Delay before the message becomes visible.
    pub delay: Option<Duration>,
}

impl EnqueueOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delay before the message becomes visible.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Client-side dequeue settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueClientConfig {
    /// Interval between dequeue attempts.
    pub dequeue_interval: Duration,
}

impl Default for QueueClientConfig {
    fn default() -> Self {
        Self {
            dequeue_interval: DEFAULT_DEQUEUE_INTERVAL,
        }
    }
}

/// At-least-once message queue.
///
/// ## Errors
///
/// - [`QueueClient::dequeue`] returns [`Error::NoMessageAvailable`] when nothing
///   is visible and [`Error::InvalidMessage`] for unusable messages.
/// - Transport failures are [`Error::QueueUnavailable`].
#[async_trait]
pub trait QueueClient: Send + Sync + 'static {
    /// Enqueues a message. Queue-owned metadata on `message` is ignored.
    async fn enqueue(&self, message: Message, options: EnqueueOptions) -> Result<()>;

    /// Takes the next visible message and hides it for the visibility window.
    async fn dequeue(&self, config: &QueueClientConfig) -> Result<Message>;

    /// Removes a delivered message from the queue.
    ///
    /// Fails with [`Error::InvalidMessage`] if the lease on the message was
    /// lost and [`Error::NotFound`] if the message no longer exists.
    async fn finish_message(&self, message: &Message) -> Result<()>;

    /// Renews the visibility window of a delivered message, updating
    /// `next_visible_at` in place.
    ///
    /// Fails like [`QueueClient::finish_message`].
    async fn extend_message(&self, message: &mut Message) -> Result<()>;

    /// Returns the queue's name.
    fn queue_name(&self) -> &str;
}
