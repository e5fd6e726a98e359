// src/fetch/policy.rs

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

use super::query::QueryKey;

/// Why a single (period, code, direction) query produced no rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("HTTP status {status}")]
    Status { status: u16 },
    #[error("malformed JSON: {0}")]
    Decode(String),
    #[error("unexpected response shape: {0}")]
    Shape(String),
}

impl FetchFailure {
    /// Failures worth another attempt: network errors, throttling and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchFailure::Transport(_) => true,
            FetchFailure::Status { status } => *status == 429 || (500..=599).contains(status),
            FetchFailure::Decode(_) | FetchFailure::Shape(_) => false,
        }
    }
}

/// What happens to a query once retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// Log, record and carry on with the next query.
    #[default]
    Skip,
    /// Stop the run.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePolicy {
    #[serde(default)]
    pub on_failure: OnFailure,
    /// Extra attempts for transient failures; 0 means a single attempt.
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backoff_ms() -> u64 {
    500
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            on_failure: OnFailure::Skip,
            retries: 0,
            backoff_ms: default_backoff_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { delay: Duration },
    Skip,
    Abort,
}

impl FailurePolicy {
    /// Decide the fate of a query whose `attempt`-th try (1-based) failed.
    pub fn decide(&self, failure: &FetchFailure, attempt: u32) -> Decision {
        if failure.is_transient() && attempt <= self.retries {
            return Decision::Retry {
                delay: self.backoff(attempt),
            };
        }
        match self.on_failure {
            OnFailure::Skip => Decision::Skip,
            OnFailure::Abort => Decision::Abort,
        }
    }

    /// Exponential backoff: `backoff_ms * 2^(attempt - 1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Emit the log line for a decision; every skipped or aborted query is reported
/// with its period, code and direction.
pub fn log_decision(key: &QueryKey, failure: &FetchFailure, attempt: u32, decision: &Decision) {
    match decision {
        Decision::Retry { delay } => warn!(
            period = %key.period,
            code = %key.code,
            direction = %key.direction,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %failure,
            "retrying"
        ),
        Decision::Skip => warn!(
            period = %key.period,
            code = %key.code,
            direction = %key.direction,
            attempt,
            error = %failure,
            "skipping query"
        ),
        Decision::Abort => error!(
            period = %key.period,
            code = %key.code,
            direction = %key.direction,
            attempt,
            error = %failure,
            "aborting run"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_skips_without_retry() {
        let policy = FailurePolicy::default();
        let failure = FetchFailure::Status { status: 503 };
        assert_eq!(policy.decide(&failure, 1), Decision::Skip);
    }

    #[test]
    fn transient_failures_retry_with_backoff() {
        let policy = FailurePolicy {
            retries: 2,
            backoff_ms: 100,
            ..FailurePolicy::default()
        };
        let failure = FetchFailure::Transport("connection reset".into());
        assert_eq!(
            policy.decide(&failure, 1),
            Decision::Retry { delay: Duration::from_millis(100) }
        );
        assert_eq!(
            policy.decide(&failure, 2),
            Decision::Retry { delay: Duration::from_millis(200) }
        );
        assert_eq!(policy.decide(&failure, 3), Decision::Skip);
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let policy = FailurePolicy {
            retries: 5,
            ..FailurePolicy::default()
        };
        for failure in [
            FetchFailure::Status { status: 400 },
            FetchFailure::Decode("expected value".into()),
            FetchFailure::Shape("row has 4 cells".into()),
        ] {
            assert_eq!(policy.decide(&failure, 1), Decision::Skip);
        }
    }

    #[test]
    fn abort_policy_stops_after_retries() {
        let policy = FailurePolicy {
            on_failure: OnFailure::Abort,
            retries: 1,
            ..FailurePolicy::default()
        };
        let throttled = FetchFailure::Status { status: 429 };
        assert!(matches!(policy.decide(&throttled, 1), Decision::Retry { .. }));
        assert_eq!(policy.decide(&throttled, 2), Decision::Abort);
    }
}
