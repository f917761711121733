//! Cancellable interval polling into a bounded channel.
//!
//! [`spawn_poller`] runs a poll function on a fixed interval in a single
//! background task and forwards every `Some` result to a bounded channel.
//!
//! ## Shutdown
//!
//! - After cancellation no new poll is started.
//! - A poll already in flight is awaited. Its result is delivered if the
//!   channel has room, otherwise it is dropped.
//! - Dropping the receiver also stops the task.
//!
//! The channel closes when the task exits.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Shortest interval between polls. Shorter intervals, including zero, are
/// raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Spawns a polling task.
///
/// `buffer` is the channel capacity; zero is treated as one. `every` is at
/// least [`MIN_POLL_INTERVAL`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use keel_core::poller::spawn_poller;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let token = CancellationToken::new();
/// let mut n = 0;
/// let (mut rx, _task) = spawn_poller(token.clone(), Duration::from_millis(1), 1, move || {
///     n += 1;
///     let value = n;
///     async move { Some(value) }
/// });
/// assert_eq!(rx.recv().await, Some(1));
/// token.cancel();
/// # }
/// ```
pub fn spawn_poller<T, F, Fut>(
    token: CancellationToken,
    every: Duration,
    buffer: usize,
    mut poll: F,
) -> (mpsc::Receiver<T>, JoinHandle<()>)
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Option<T>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));

    let task = async move {
        let mut ticker = interval(every.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                () = tx.closed() => break,
                _ = ticker.tick() => {}
            }

            let Some(item) = poll().await else {
                continue;
            };

            tokio::select! {
                biased;
                sent = tx.send(item) => {
                    if sent.is_err() {
                        break;
                    }
                }
                () = token.cancelled() => {
                    tracing::debug!("poller cancelled with a result pending; dropping it");
                    break;
                }
            }
        }
        tracing::debug!("poller stopped");
    };

    let handle = tokio::spawn(task.in_current_span());
    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn forwards_results_and_skips_none() {
        let token = CancellationToken::new();
        let mut n = 0u32;
        let (mut rx, _task) = spawn_poller(token.clone(), Duration::from_millis(1), 4, move || {
            n += 1;
            let value = n;
            async move { (value % 2 == 0).then_some(value) }
        });

        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(rx.recv().await, Some(4));
        token.cancel();
    }

    #[tokio::test]
    async fn cancellation_stops_polling_and_closes_channel() {
        let token = CancellationToken::new();
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        let (mut rx, task) = spawn_poller(token.clone(), Duration::from_millis(1), 1, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { None::<()> }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
        task.await.unwrap();

        let after_cancel = polls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(polls.load(Ordering::SeqCst), after_cancel);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn full_channel_result_is_dropped_on_cancel() {
        let token = CancellationToken::new();
        let (mut rx, task) = spawn_poller(token.clone(), Duration::from_millis(1), 1, || async {
            Some(7)
        });

        // Let the channel fill and the task block on the next send.
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        task.await.unwrap();

        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn dropped_receiver_stops_task() {
        let token = CancellationToken::new();
        let (rx, task) = spawn_poller(token, Duration::from_millis(1), 1, || async { Some(1) });
        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("task should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn zero_interval_still_polls() {
        let token = CancellationToken::new();
        let (mut rx, task) = spawn_poller(token.clone(), Duration::ZERO, 1, || async { Some(3) });

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("result within timeout");
        assert_eq!(first, Some(3));

        token.cancel();
        task.await.expect("task must not panic");
    }
}
