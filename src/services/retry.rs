//! Retry Policy
//!
//! Classifies provider errors as rate-limit-shaped from their message text
//! (no structured error code is guaranteed to exist) and decides whether an
//! attempt should be retried, with exponential backoff. The same policy is
//! consulted by the synchronous and deferred execution paths.

use std::sync::OnceLock;
use std::time::Duration;

use content_review_core::ExecutionSettings;
use regex::Regex;

/// Substrings whose presence marks an error message as rate limiting.
const RATE_LIMIT_MARKERS: [&str; 5] = [
    "rate limit",
    "too many requests",
    "429",
    "quota exceeded",
    "throttle",
];

fn exceeded_limit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"exceeded.*limit").expect("valid regex"))
}

/// Whether an error message looks like a transient rate-limit error.
pub fn is_rate_limit_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) || exceeded_limit_regex().is_match(&lower)
}

/// Decision for one failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given backoff delay
    Retry { delay: Duration },
    /// Surface the failure
    GiveUp,
}

/// Exponential-backoff retry policy for transient provider errors.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Whether retrying is enabled at all
    pub enabled: bool,
    /// Maximum retries after the initial attempt
    pub max_retries: u32,
    /// Base backoff in seconds
    pub base_backoff_secs: u64,
    /// Backoff multiplier per attempt
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Build the policy from a profile's execution settings.
    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        Self {
            enabled: settings.retry_enabled,
            max_retries: settings.max_retries,
            base_backoff_secs: settings.retry_base_secs,
            multiplier: settings.retry_multiplier,
        }
    }

    /// Backoff delay for a given zero-based attempt: `base × multiplier^attempt`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let secs = self.base_backoff_secs as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(secs)
    }

    /// Decide whether the failed `attempt` (zero-based) should be retried.
    ///
    /// Only rate-limit-shaped errors are retried; everything else is a
    /// permanent failure. An always-failing provider therefore terminates
    /// after exactly `max_retries + 1` attempts.
    pub fn evaluate(&self, error_message: &str, attempt: u32) -> RetryDecision {
        if !self.enabled || attempt >= self.max_retries || !is_rate_limit_error(error_message) {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay: self.backoff_delay(attempt),
        }
    }
}
