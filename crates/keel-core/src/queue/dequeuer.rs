//! Background dequeue loop.
//!
//! [`start_dequeuer`] polls a [`QueueClient`] on a fixed interval and streams
//! the messages it receives. Empty polls and unusable messages are routine and
//! only logged; transport errors are logged at error level and polling goes on.

use std::sync::Arc;

use metrics::counter;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{Message, QueueClient, QueueClientConfig};
use crate::error::Error;
use crate::observability::dequeue_span;
use crate::poller::spawn_poller;

/// Counter: dequeue attempts by outcome.
pub const DEQUEUE_POLLS_TOTAL: &str = "keel_dequeue_polls_total";

/// Outcome label values for [`DEQUEUE_POLLS_TOTAL`].
pub mod outcome {
    /// A message was received.
    pub const MESSAGE: &str = "message";
    /// The queue had nothing visible.
    pub const EMPTY: &str = "empty";
    /// The received message was unusable.
    pub const INVALID: &str = "invalid";
    /// The dequeue call failed.
    pub const ERROR: &str = "error";
}

/// Starts dequeueing from `client` until `token` is cancelled.
///
/// The returned stream closes once the background task exits. A dequeue
/// interval below [`MIN_POLL_INTERVAL`](crate::poller::MIN_POLL_INTERVAL) is
/// raised to it.
pub fn start_dequeuer(
    token: CancellationToken,
    client: Arc<dyn QueueClient>,
    config: QueueClientConfig,
) -> mpsc::Receiver<Message> {
    let span = dequeue_span(client.queue_name());
    let _entered = span.enter();

    let every = config.dequeue_interval;
    let (rx, _task) = spawn_poller(token, every, 1, move || {
        let client = Arc::clone(&client);
        let config = config.clone();
        async move { poll_once(client.as_ref(), &config).await }
    });
    rx
}

async fn poll_once(client: &dyn QueueClient, config: &QueueClientConfig) -> Option<Message> {
    let queue = client.queue_name().to_string();
    match client.dequeue(config).await {
        Ok(message) => {
            counter!(DEQUEUE_POLLS_TOTAL, "queue" => queue, "outcome" => outcome::MESSAGE)
                .increment(1);
            tracing::debug!(
                message_id = %message.metadata.id,
                dequeue_count = message.metadata.dequeue_count,
                "dequeued message"
            );
            Some(message)
        }
        Err(Error::NoMessageAvailable) => {
            counter!(DEQUEUE_POLLS_TOTAL, "queue" => queue, "outcome" => outcome::EMPTY)
                .increment(1);
            tracing::trace!("no message available");
            None
        }
        Err(err @ Error::InvalidMessage { .. }) => {
            counter!(DEQUEUE_POLLS_TOTAL, "queue" => queue, "outcome" => outcome::INVALID)
                .increment(1);
            tracing::warn!(error = %err, "skipping invalid message");
            None
        }
        Err(err) => {
            counter!(DEQUEUE_POLLS_TOTAL, "queue" => queue, "outcome" => outcome::ERROR)
                .increment(1);
            tracing::error!(error = %err, "failed to dequeue message");
            None
        }
    }
}
