//! Engine runtime configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the worker pool and validator execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of background workers consuming the job queue
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Maximum number of queued jobs before `enqueue` starts waiting
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Upper bound for a single validator call. `None` disables the timeout.
    #[serde(default)]
    pub validator_timeout_ms: Option<u64>,
}

fn default_worker_count() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
            validator_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `VALIDATION_WORKERS` (default: 2)
    /// - `VALIDATION_QUEUE_CAPACITY` (default: 256)
    /// - `VALIDATOR_TIMEOUT_MS` (default: unset, no timeout)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let parse = |key: &str| std::env::var(key).ok().and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            worker_count: parse("VALIDATION_WORKERS")
                .map(|v| v.max(1) as usize)
                .unwrap_or(defaults.worker_count),
            queue_capacity: parse("VALIDATION_QUEUE_CAPACITY")
                .map(|v| v.max(1) as usize)
                .unwrap_or(defaults.queue_capacity),
            validator_timeout_ms: parse("VALIDATOR_TIMEOUT_MS").filter(|v| *v > 0),
        }
    }

    pub fn validator_timeout(&self) -> Option<Duration> {
        self.validator_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.queue_capacity, 256);
        assert_eq!(config.validator_timeout(), None);
    }

    #[test]
    fn test_timeout_conversion() {
        let config = EngineConfig {
            validator_timeout_ms: Some(250),
            ..Default::default()
        };
        assert_eq!(config.validator_timeout(), Some(Duration::from_millis(250)));
    }
}
