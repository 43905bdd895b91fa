//! Batching configuration.
//!
//! Supports:
//! - CLI arguments via clap (flatten [`BatchConfig`] into a host's parser)
//! - Environment variable overrides
//! - Defaults matching a typical persistence front-end (500 per batch, 8 shards)

use clap::Args;

use crate::error::CoordinatorError;

/// Configuration for a [`BatchCoordinator`](crate::BatchCoordinator).
#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum number of tickets handed to the sink in one call
    #[arg(long, env = "BATCHLINE_BATCH_SIZE", default_value_t = 500)]
    pub batch_size: usize,

    /// Number of shards, each with its own queue and worker thread
    #[arg(long = "workers", env = "BATCHLINE_WORKERS", default_value_t = 8)]
    pub worker_count: usize,

    /// Per-shard queue capacity; unbounded when unset
    #[arg(long, env = "BATCHLINE_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            worker_count: 8,
            queue_capacity: None,
        }
    }
}

impl BatchConfig {
    /// Create a config with unbounded queues.
    pub fn new(batch_size: usize, worker_count: usize) -> Self {
        Self {
            batch_size,
            worker_count,
            queue_capacity: None,
        }
    }

    /// Bound every shard's queue to `capacity` tickets.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Check that every setting is at least 1.
    pub fn validate(&self) -> Result<(), CoordinatorError> {
        if self.batch_size == 0 {
            return Err(CoordinatorError::InvalidConfig(
                "batch size must be at least 1".into(),
            ));
        }
        if self.worker_count == 0 {
            return Err(CoordinatorError::InvalidConfig(
                "worker count must be at least 1".into(),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(CoordinatorError::InvalidConfig(
                "queue capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Create a small config for tests.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            batch_size: 3,
            worker_count: 2,
            queue_capacity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct Cli {
        #[command(flatten)]
        batch: BatchConfig,
    }

    #[test]
    fn test_default_config() {
        let config = BatchConfig::default();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.queue_capacity, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(BatchConfig::new(0, 1).validate().is_err());
        assert!(BatchConfig::new(1, 0).validate().is_err());
        assert!(BatchConfig::new(1, 1)
            .with_queue_capacity(0)
            .validate()
            .is_err());
        assert!(BatchConfig::test_config().validate().is_ok());
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "test",
            "--batch-size",
            "64",
            "--workers",
            "4",
            "--queue-capacity",
            "1024",
        ]);
        assert_eq!(
            cli.batch,
            BatchConfig::new(64, 4).with_queue_capacity(1024)
        );
    }
}
