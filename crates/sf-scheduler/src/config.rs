//! Scheduler configuration. Kept as an enumerated set of fixed-shape knobs
//! rather than a free-form map — every field here has a declared effect.

use std::time::Duration;

/// Which failure classes the scheduler retries by default. `InvalidInput`
/// and `ParseError` are never retryable: both are deterministic given the
/// same input, so a retry can only reproduce the same failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Timeout,
    ExecutionFailed { exit_code: Option<i32> },
    InvalidInput,
    ParseError,
    Canceled,
}

impl FailureClass {
    #[must_use]
    pub fn is_retryable_by_default(&self, retryable_exit_codes: &[i32]) -> bool {
        match self {
            Self::Timeout => true,
            Self::ExecutionFailed { exit_code } => exit_code
                .map(|code| retryable_exit_codes.contains(&code))
                .unwrap_or(false),
            Self::InvalidInput | Self::ParseError | Self::Canceled => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub backoff_factor: u32,
    pub max_backoff: Duration,
    /// Exit codes `ExecutionFailed` is retried for; ignored for other
    /// failure classes.
    pub retryable_exit_codes: Vec<i32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(500),
            backoff_factor: 2,
            max_backoff: Duration::from_secs(30),
            retryable_exit_codes: Vec::new(),
        }
    }
}

impl RetryPolicy {
    /// `min(max_backoff, base_backoff * backoff_factor^attempt)`.
    #[must_use]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.saturating_pow(attempt);
        let scaled = self.base_backoff.saturating_mul(factor);
        scaled.min(self.max_backoff)
    }

    #[must_use]
    pub fn should_retry(&self, class: FailureClass) -> bool {
        class.is_retryable_by_default(&self.retryable_exit_codes)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_parallel: usize,
    pub per_task_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            per_task_timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_then_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_backoff: Duration::from_millis(100),
            backoff_factor: 2,
            max_backoff: Duration::from_secs(1),
            retryable_exit_codes: Vec::new(),
        };
        assert_eq!(policy.backoff_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_for_attempt(10), Duration::from_secs(1));
    }

    #[test]
    fn invalid_input_and_parse_error_are_never_retryable() {
        assert!(!FailureClass::InvalidInput.is_retryable_by_default(&[1, 2]));
        assert!(!FailureClass::ParseError.is_retryable_by_default(&[1, 2]));
    }

    #[test]
    fn execution_failed_retries_only_whitelisted_exit_codes() {
        let class = FailureClass::ExecutionFailed { exit_code: Some(2) };
        assert!(class.is_retryable_by_default(&[2, 3]));
        assert!(!class.is_retryable_by_default(&[3]));
    }
}
