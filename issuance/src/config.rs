//! Batch orchestration settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::IssuanceError;

/// Floor for the delay between two ledger submissions.
pub const MIN_PACING_DELAY: Duration = Duration::from_secs(2);

/// How a production batch is paced and retried.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Certificates per submission group.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Wait before every submission except the first of a batch.
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Submissions per certificate, first attempt included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base of the exponential backoff used after an unreachable endpoint.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_batch_size() -> usize {
    5
}

fn default_pacing_delay_ms() -> u64 {
    MIN_PACING_DELAY.as_millis() as u64
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

// ── Impl ───────────────────────────────────────────────────────────────

impl BatchConfig {
    pub fn validate(&self) -> Result<(), IssuanceError> {
        if self.batch_size == 0 {
            return Err(IssuanceError::Config("batch_size must be non-zero".into()));
        }
        if self.pacing_delay() < MIN_PACING_DELAY {
            return Err(IssuanceError::Config(format!(
                "pacing_delay_ms must be at least {}, got {}",
                MIN_PACING_DELAY.as_millis(),
                self.pacing_delay_ms
            )));
        }
        if self.max_attempts == 0 {
            return Err(IssuanceError::Config("max_attempts must be non-zero".into()));
        }
        Ok(())
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    /// Backoff after the `failed_attempt`-th consecutive unreachable
    /// failure: `retry_backoff × 2^(failed_attempt - 1)`, never below the
    /// pacing delay.
    pub fn unreachable_backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(16);
        let backoff = Duration::from_millis(self.retry_backoff_ms.saturating_mul(1u64 << exponent));
        backoff.max(self.pacing_delay())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            pacing_delay_ms: default_pacing_delay_ms(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.pacing_delay(), Duration::from_secs(2));
    }

    #[test]
    fn rejects_fast_pacing() {
        let config = BatchConfig {
            pacing_delay_ms: 1999,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(IssuanceError::Config(_))));
    }

    #[test]
    fn rejects_empty_groups() {
        let config = BatchConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn backoff_doubles() {
        let config = BatchConfig::default();
        assert_eq!(config.unreachable_backoff(1), Duration::from_secs(2));
        assert_eq!(config.unreachable_backoff(2), Duration::from_secs(4));
        assert_eq!(config.unreachable_backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_never_undercuts_pacing() {
        let config = BatchConfig {
            retry_backoff_ms: 100,
            ..Default::default()
        };
        assert_eq!(config.unreachable_backoff(1), MIN_PACING_DELAY);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: BatchConfig = serde_json::from_str(r#"{"batch_size": 10}"#).unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_attempts, 3);
    }
}
