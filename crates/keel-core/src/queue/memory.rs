//! In-memory queue implementation for testing.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: no persistence, no distribution
//! - **Single-process only**: messages are not visible across process boundaries
//!
//! The clock can be skewed with [`InMemoryQueue::advance_clock`] so visibility
//! and expiry can be tested without sleeping.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ulid::Ulid;

use super::{EnqueueOptions, Message, QueueClient, QueueClientConfig};
use crate::error::{Error, Result};

/// Default visibility window for a dequeued message.
pub const DEFAULT_MESSAGE_LOCK_DURATION: Duration = Duration::from_secs(5 * 60);

/// Default time-to-live for an enqueued message.
pub const DEFAULT_MESSAGE_TTL: Duration = Duration::from_secs(10 * 60 * 60);

#[derive(Debug, Default)]
struct QueueState {
    messages: Vec<Message>,
    clock_skew: Duration,
}

/// In-memory message queue.
///
/// ## Example
///
/// ```rust
/// use keel_core::queue::InMemoryQueue;
///
/// let queue = InMemoryQueue::new("operations");
/// assert_eq!(queue.len().unwrap(), 0);
/// ```
#[derive(Debug)]
pub struct InMemoryQueue {
    name: String,
    message_lock_duration: Duration,
    message_ttl: Duration,
    state: Mutex<QueueState>,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new("default")
    }
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::queue_unavailable("queue lock poisoned")
}

/// `at + by`, failing instead of panicking past chrono's range.
fn offset(at: DateTime<Utc>, by: Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|by| at.checked_add_signed(by))
        .ok_or_else(|| Error::InvalidInput(format!("duration {by:?} is out of range")))
}

impl InMemoryQueue {
    /// Creates a queue with the default lock duration and time-to-live.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_durations(name, DEFAULT_MESSAGE_LOCK_DURATION, DEFAULT_MESSAGE_TTL)
    }

    /// Creates a queue with custom durations.
    #[must_use]
    pub fn with_durations(
        name: impl Into<String>,
        message_lock_duration: Duration,
        message_ttl: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            message_lock_duration,
            message_ttl,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Moves the queue's clock forward.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned or the skew overflows.
    pub fn advance_clock(&self, by: Duration) -> Result<()> {
        let mut state = self.state.lock().map_err(poison_err)?;
        state.clock_skew = state
            .clock_skew
            .checked_add(by)
            .ok_or_else(|| Error::InvalidInput(format!("clock skew overflow adding {by:?}")))?;
        Ok(())
    }

    /// Number of messages held, visible or not. Expired messages are reaped first.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        let mut state = self.state.lock().map_err(poison_err)?;
        let now = Self::now(&state)?;
        Self::reap(&mut state, now);
        Ok(state.messages.len())
    }

    /// Returns true if the queue holds no messages.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn now(state: &QueueState) -> Result<DateTime<Utc>> {
        offset(Utc::now(), state.clock_skew)
    }

    fn reap(state: &mut QueueState, now: DateTime<Utc>) {
        let before = state.messages.len();
        state.messages.retain(|m| m.metadata.expire_at > now);
        let reaped = before - state.messages.len();
        if reaped > 0 {
            tracing::debug!(reaped, "dropped expired messages");
        }
    }

    /// Finds the stored copy of `message`, checking the caller still holds its lease.
    fn leased<'a>(
        state: &'a mut QueueState,
        message: &Message,
        now: DateTime<Utc>,
    ) -> Result<&'a mut Message> {
        let stored = state
            .messages
            .iter_mut()
            .find(|m| m.metadata.id == message.metadata.id)
            .ok_or_else(|| Error::not_found(message.metadata.id.clone()))?;

        if stored.metadata.dequeue_count != message.metadata.dequeue_count {
            return Err(Error::invalid_message(format!(
                "message '{}' was redelivered; lease lost",
                message.metadata.id
            )));
        }
        if stored.metadata.next_visible_at <= now {
            return Err(Error::invalid_message(format!(
                "lease on message '{}' expired",
                message.metadata.id
            )));
        }
        Ok(stored)
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn enqueue(&self, mut message: Message, options: EnqueueOptions) -> Result<()> {
        let mut state = self.state.lock().map_err(poison_err)?;
        let now = Self::now(&state)?;
        let expire_at = offset(now, self.message_ttl)?;
        let next_visible_at = offset(now, options.delay.unwrap_or_default())?;

        message.metadata.id = Ulid::new().to_string();
        message.metadata.dequeue_count = 0;
        message.metadata.enqueue_at = now;
        message.metadata.expire_at = expire_at;
        message.metadata.next_visible_at = next_visible_at;

        tracing::trace!(queue = %self.name, message_id = %message.metadata.id, "enqueued message");
        state.messages.push(message);
        Ok(())
    }

    async fn dequeue(&self, _config: &QueueClientConfig) -> Result<Message> {
        let mut state = self.state.lock().map_err(poison_err)?;
        let now = Self::now(&state)?;
        let locked_until = offset(now, self.message_lock_duration)?;
        Self::reap(&mut state, now);

        let message = state
            .messages
            .iter_mut()
            .find(|m| m.metadata.next_visible_at <= now)
            .ok_or(Error::NoMessageAvailable)?;

        message.metadata.dequeue_count += 1;
        message.metadata.next_visible_at = locked_until;
        Ok(message.clone())
    }

    async fn finish_message(&self, message: &Message) -> Result<()> {
        let mut state = self.state.lock().map_err(poison_err)?;
        let now = Self::now(&state)?;
        Self::reap(&mut state, now);

        Self::leased(&mut state, message, now)?;
        state.messages.retain(|m| m.metadata.id != message.metadata.id);
        Ok(())
    }

    async fn extend_message(&self, message: &mut Message) -> Result<()> {
        let mut state = self.state.lock().map_err(poison_err)?;
        let now = Self::now(&state)?;
        let locked_until = offset(now, self.message_lock_duration)?;
        Self::reap(&mut state, now);

        let stored = Self::leased(&mut state, message, now)?;
        stored.metadata.next_visible_at = locked_until;
        message.metadata.next_visible_at = stored.metadata.next_visible_at;
        Ok(())
    }

    fn queue_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::JSON_CONTENT_TYPE;

    fn msg(body: &str) -> Message {
        Message::new(JSON_CONTENT_TYPE, body.to_string())
    }

    fn config() -> QueueClientConfig {
        QueueClientConfig::default()
    }

    #[tokio::test]
    async fn empty_queue_has_no_message() {
        let queue = InMemoryQueue::new("test");
        let err = queue.dequeue(&config()).await.unwrap_err();
        assert!(matches!(err, Error::NoMessageAvailable));
    }

    #[tokio::test]
    async fn dequeue_hides_message_until_lock_passes() -> Result<()> {
        let queue = InMemoryQueue::new("test");
        queue.enqueue(msg("1"), EnqueueOptions::new()).await?;

        let first = queue.dequeue(&config()).await?;
        assert_eq!(first.metadata.dequeue_count, 1);
        assert!(first.metadata.next_visible_at > Utc::now());
        assert!(matches!(
            queue.dequeue(&config()).await,
            Err(Error::NoMessageAvailable)
        ));

        queue.advance_clock(DEFAULT_MESSAGE_LOCK_DURATION + Duration::from_secs(1))?;
        let second = queue.dequeue(&config()).await?;
        assert_eq!(second.metadata.id, first.metadata.id);
        assert_eq!(second.metadata.dequeue_count, 2);
        Ok(())
    }

    #[tokio::test]
    async fn finished_messages_never_reappear() -> Result<()> {
        let queue = InMemoryQueue::new("test");
        queue.enqueue(msg("1"), EnqueueOptions::new()).await?;

        let delivered = queue.dequeue(&config()).await?;
        queue.finish_message(&delivered).await?;
        assert!(queue.is_empty()?);

        queue.advance_clock(DEFAULT_MESSAGE_LOCK_DURATION * 2)?;
        assert!(matches!(
            queue.dequeue(&config()).await,
            Err(Error::NoMessageAvailable)
        ));

        let err = queue.finish_message(&delivered).await.unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn lost_lease_is_invalid() -> Result<()> {
        let queue = InMemoryQueue::new("test");
        queue.enqueue(msg("1"), EnqueueOptions::new()).await?;

        let stale = queue.dequeue(&config()).await?;
        queue.advance_clock(DEFAULT_MESSAGE_LOCK_DURATION + Duration::from_secs(1))?;
        let fresh = queue.dequeue(&config()).await?;

        let err = queue.finish_message(&stale).await.unwrap_err();
        assert!(matches!(err, Error::InvalidMessage { .. }));
        queue.finish_message(&fresh).await?;
        Ok(())
    }

    #[tokio::test]
    async fn extend_pushes_visibility_forward() -> Result<()> {
        let queue = InMemoryQueue::new("test");
        queue.enqueue(msg("1"), EnqueueOptions::new()).await?;

        let mut delivered = queue.dequeue(&config()).await?;
        let before = delivered.metadata.next_visible_at;

        queue.advance_clock(Duration::from_secs(60))?;
        queue.extend_message(&mut delivered).await?;
        assert!(delivered.metadata.next_visible_at > before);

        // Still hidden past the original window.
        queue.advance_clock(DEFAULT_MESSAGE_LOCK_DURATION - Duration::from_secs(30))?;
        assert!(matches!(
            queue.dequeue(&config()).await,
            Err(Error::NoMessageAvailable)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn expired_messages_are_never_delivered() -> Result<()> {
        let queue = InMemoryQueue::with_durations(
            "test",
            DEFAULT_MESSAGE_LOCK_DURATION,
            Duration::from_secs(60),
        );
        queue.enqueue(msg("1"), EnqueueOptions::new()).await?;
        queue.advance_clock(Duration::from_secs(61))?;

        assert!(matches!(
            queue.dequeue(&config()).await,
            Err(Error::NoMessageAvailable)
        ));
        assert!(queue.is_empty()?);
        Ok(())
    }

    #[tokio::test]
    async fn delayed_messages_wait() -> Result<()> {
        let queue = InMemoryQueue::new("test");
        queue
            .enqueue(msg("1"), EnqueueOptions::new().with_delay(Duration::from_secs(30)))
            .await?;
        assert!(matches!(
            queue.dequeue(&config()).await,
            Err(Error::NoMessageAvailable)
        ));

        queue.advance_clock(Duration::from_secs(31))?;
        let delivered = queue.dequeue(&config()).await?;
        assert_eq!(delivered.data, bytes::Bytes::from("1"));
        Ok(())
    }

    #[tokio::test]
    async fn delivers_in_enqueue_order() -> Result<()> {
        let queue = InMemoryQueue::new("test");
        queue.enqueue(msg("a"), EnqueueOptions::new()).await?;
        queue.enqueue(msg("b"), EnqueueOptions::new()).await?;

        let first = queue.dequeue(&config()).await?;
        let second = queue.dequeue(&config()).await?;
        assert_eq!(first.data, bytes::Bytes::from("a"));
        assert_eq!(second.data, bytes::Bytes::from("b"));
        assert_ne!(first.metadata.id, second.metadata.id);
        Ok(())
    }

    #[tokio::test]
    async fn out_of_range_ttl_is_rejected() {
        let queue = InMemoryQueue::with_durations(
            "test",
            DEFAULT_MESSAGE_LOCK_DURATION,
            Duration::from_secs(10_000_000_000_000),
        );
        let err = queue.enqueue(msg("1"), EnqueueOptions::new()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{err}");
        assert!(queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn out_of_range_delay_is_rejected() {
        let queue = InMemoryQueue::new("test");
        let options = EnqueueOptions::new().with_delay(Duration::MAX);
        let err = queue.enqueue(msg("1"), options).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{err}");
    }

    #[tokio::test]
    async fn out_of_range_lock_is_rejected() -> Result<()> {
        let queue = InMemoryQueue::with_durations(
            "test",
            Duration::from_secs(10_000_000_000_000),
            DEFAULT_MESSAGE_TTL,
        );
        queue.enqueue(msg("1"), EnqueueOptions::new()).await?;

        let err = queue.dequeue(&config()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{err}");

        // The failed dequeue left the message untouched.
        assert_eq!(queue.len()?, 1);
        Ok(())
    }
}
