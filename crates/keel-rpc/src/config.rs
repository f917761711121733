//! Control-plane configuration.
//!
//! Values come from `KEEL_*` environment variables; anything unset keeps its
//! default. [`Config::validate`] is called by [`Config::from_env`].

use std::time::Duration;

use keel_core::LogFormat;
use keel_core::queue::{InMemoryQueue, QueueClientConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::statusmanager::QueueOperationOptions;

/// Upper bound for `KEEL_MESSAGE_LOCK_SECS` (one day).
pub const MAX_MESSAGE_LOCK_SECS: u64 = 24 * 60 * 60;

/// Upper bound for `KEEL_MESSAGE_TTL_SECS` (thirty days).
pub const MAX_MESSAGE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Control-plane configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Location written into operation-status identifiers.
    pub location: String,
    /// Time a worker may spend on an operation, in seconds.
    pub operation_timeout_secs: u64,
    /// Polling hint returned to clients, in seconds.
    pub retry_after_secs: u64,
    /// Interval between dequeue attempts, in milliseconds.
    pub dequeue_interval_ms: u64,
    /// Name of the operations queue.
    pub queue_name: String,
    /// How long a dequeued message stays invisible, in seconds.
    pub message_lock_secs: u64,
    /// How long a message lives before it expires, in seconds.
    pub message_ttl_secs: u64,
    /// Log output format: `json` or `pretty`.
    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            location: "global".to_string(),
            operation_timeout_secs: 2 * 60 * 60,
            retry_after_secs: 10,
            dequeue_interval_ms: 1000,
            queue_name: "keel-operations".to_string(),
            message_lock_secs: 5 * 60,
            message_ttl_secs: 10 * 60 * 60,
            log_format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable cannot be parsed or the result
    /// fails [`Config::validate`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = Env { lookup };
        let mut config = Self::default();

        if let Some(v) = env.string("KEEL_LOCATION") {
            config.location = v;
        }
        if let Some(v) = env.u64("KEEL_OPERATION_TIMEOUT_SECS")? {
            config.operation_timeout_secs = v;
        }
        if let Some(v) = env.u64("KEEL_RETRY_AFTER_SECS")? {
            config.retry_after_secs = v;
        }
        if let Some(v) = env.u64("KEEL_DEQUEUE_INTERVAL_MS")? {
            config.dequeue_interval_ms = v;
        }
        if let Some(v) = env.string("KEEL_QUEUE_NAME") {
            config.queue_name = v;
        }
        if let Some(v) = env.u64("KEEL_MESSAGE_LOCK_SECS")? {
            config.message_lock_secs = v;
        }
        if let Some(v) = env.u64("KEEL_MESSAGE_TTL_SECS")? {
            config.message_ttl_secs = v;
        }
        if let Some(v) = env.string("KEEL_LOG_FORMAT") {
            config.log_format = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty location or queue name, a zero
    /// duration, a message lock or TTL above its maximum, a retry-after longer
    /// than the operation timeout, or an unknown log format.
    pub fn validate(&self) -> Result<()> {
        if self.location.trim().is_empty() {
            return Err(Error::Config("KEEL_LOCATION must not be empty".into()));
        }
        if self.queue_name.trim().is_empty() {
            return Err(Error::Config("KEEL_QUEUE_NAME must not be empty".into()));
        }
        for (name, value) in [
            ("KEEL_OPERATION_TIMEOUT_SECS", self.operation_timeout_secs),
            ("KEEL_RETRY_AFTER_SECS", self.retry_after_secs),
            ("KEEL_DEQUEUE_INTERVAL_MS", self.dequeue_interval_ms),
            ("KEEL_MESSAGE_LOCK_SECS", self.message_lock_secs),
            ("KEEL_MESSAGE_TTL_SECS", self.message_ttl_secs),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }
        for (name, value, max) in [
            ("KEEL_MESSAGE_LOCK_SECS", self.message_lock_secs, MAX_MESSAGE_LOCK_SECS),
            ("KEEL_MESSAGE_TTL_SECS", self.message_ttl_secs, MAX_MESSAGE_TTL_SECS),
        ] {
            if value > max {
                return Err(Error::Config(format!("{name} must be at most {max} (got {value})")));
            }
        }
        if self.retry_after_secs > self.operation_timeout_secs {
            return Err(Error::Config(format!(
                "KEEL_RETRY_AFTER_SECS ({}) must not exceed KEEL_OPERATION_TIMEOUT_SECS ({})",
                self.retry_after_secs, self.operation_timeout_secs
            )));
        }
        self.log_format()?;
        Ok(())
    }

    /// Parsed log format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the format is unknown.
    pub fn log_format(&self) -> Result<LogFormat> {
        self.log_format
            .parse()
            .map_err(|e: keel_core::Error| Error::Config(e.to_string()))
    }

    /// Options for queueing operations.
    #[must_use]
    pub const fn queue_operation_options(&self) -> QueueOperationOptions {
        QueueOperationOptions {
            operation_timeout: Duration::from_secs(self.operation_timeout_secs),
            retry_after: Duration::from_secs(self.retry_after_secs),
        }
    }

    /// Dequeue settings for the operations queue.
    #[must_use]
    pub const fn queue_client_config(&self) -> QueueClientConfig {
        QueueClientConfig {
            dequeue_interval: Duration::from_millis(self.dequeue_interval_ms),
        }
    }

    /// An in-process operations queue with the configured lock and TTL.
    #[must_use]
    pub fn in_memory_queue(&self) -> InMemoryQueue {
        InMemoryQueue::with_durations(
            self.queue_name.clone(),
            Duration::from_secs(self.message_lock_secs),
            Duration::from_secs(self.message_ttl_secs),
        )
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn u64(&self, name: &str) -> Result<Option<u64>> {
        let Some(v) = self.string(name) else {
            return Ok(None);
        };
        v.parse::<u64>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name} must be a u64: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::queue::QueueClient;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.location, "global");

        let options = config.queue_operation_options();
        assert_eq!(options.operation_timeout, Duration::from_secs(7200));
        assert_eq!(options.retry_after, Duration::from_secs(10));
        assert_eq!(
            config.queue_client_config().dequeue_interval,
            Duration::from_secs(1)
        );
        assert_eq!(config.log_format().unwrap(), LogFormat::Pretty);
    }

    #[test]
    fn reads_variables() {
        let config = Config::from_lookup(lookup(&[
            ("KEEL_LOCATION", " westus "),
            ("KEEL_OPERATION_TIMEOUT_SECS", "600"),
            ("KEEL_RETRY_AFTER_SECS", "5"),
            ("KEEL_DEQUEUE_INTERVAL_MS", "250"),
            ("KEEL_QUEUE_NAME", "ops"),
            ("KEEL_MESSAGE_LOCK_SECS", "30"),
            ("KEEL_MESSAGE_TTL_SECS", "3600"),
            ("KEEL_LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.location, "westus");
        assert_eq!(config.queue_operation_options().operation_timeout, Duration::from_secs(600));
        assert_eq!(
            config.queue_client_config().dequeue_interval,
            Duration::from_millis(250)
        );
        assert_eq!(config.log_format().unwrap(), LogFormat::Json);
        assert_eq!(config.in_memory_queue().queue_name(), "ops");
    }

    #[test]
    fn empty_values_keep_defaults() {
        let config = Config::from_lookup(lookup(&[("KEEL_LOCATION", "  ")])).unwrap();
        assert_eq!(config.location, "global");
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = Config::from_lookup(lookup(&[("KEEL_RETRY_AFTER_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("KEEL_RETRY_AFTER_SECS")));
    }

    #[test]
    fn rejects_zero_durations() {
        let err = Config::from_lookup(lookup(&[("KEEL_MESSAGE_LOCK_SECS", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("KEEL_MESSAGE_LOCK_SECS")));
    }

    #[test]
    fn rejects_message_durations_above_maximum() {
        for (name, value) in [
            ("KEEL_MESSAGE_TTL_SECS", "10000000000000"),
            ("KEEL_MESSAGE_LOCK_SECS", "86401"),
        ] {
            let err = Config::from_lookup(lookup(&[(name, value)])).unwrap_err();
            assert!(matches!(&err, Error::Config(msg) if msg.contains(name)), "{err}");
        }

        let at_limit = Config::from_lookup(lookup(&[
            ("KEEL_MESSAGE_TTL_SECS", "2592000"),
            ("KEEL_MESSAGE_LOCK_SECS", "86400"),
        ]))
        .unwrap();
        assert_eq!(at_limit.message_ttl_secs, MAX_MESSAGE_TTL_SECS);
    }

    #[tokio::test]
    async fn largest_valid_durations_enqueue_and_dequeue() {
        let mut config = Config::default();
        config.message_ttl_secs = MAX_MESSAGE_TTL_SECS;
        config.message_lock_secs = MAX_MESSAGE_LOCK_SECS;
        config.validate().unwrap();

        let queue = config.in_memory_queue();
        queue
            .enqueue(
                keel_core::queue::Message::new("application/json", "{}"),
                keel_core::queue::EnqueueOptions::new(),
            )
            .await
            .unwrap();
        let message = queue.dequeue(&config.queue_client_config()).await.unwrap();
        assert_eq!(message.metadata.dequeue_count, 1);
    }

    #[test]
    fn rejects_retry_after_beyond_timeout() {
        let err = Config::from_lookup(lookup(&[
            ("KEEL_OPERATION_TIMEOUT_SECS", "10"),
            ("KEEL_RETRY_AFTER_SECS", "11"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_unknown_log_format() {
        let err = Config::from_lookup(lookup(&[("KEEL_LOG_FORMAT", "xml")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn deserializes_partial_documents() {
        let config: Config = serde_json::from_str(r#"{"location":"eastus"}"#).unwrap();
        assert_eq!(config.location, "eastus");
        assert_eq!(config.retry_after_secs, 10);
        config.validate().unwrap();
    }
}
