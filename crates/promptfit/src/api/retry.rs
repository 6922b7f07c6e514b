//! Failure classification and backoff for the HTTP client.
//!
//! Provider errors arrive as strings (`"OpenRouter API HTTP 429 ...: body"`).
//! [`classify_failure`] sorts them into three kinds: context overflow (handled
//! by the budget manager, never retried here), transient (retried with
//! exponential backoff), and permanent.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff settings for transient failures.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 disables retrying.
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Shorten each delay by a fixed per-attempt factor so parallel clients
    /// spread out.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay_ms as f64);
        let factor = if self.jitter {
            [0.75, 0.9, 0.6, 0.85][(attempt % 4) as usize]
        } else {
            1.0
        };
        Duration::from_millis((capped * factor) as u64)
    }

    /// Whether a failure on retry number `attempt` should be retried.
    pub fn should_retry(&self, attempt: u32, error: &str) -> bool {
        attempt < self.max_retries && classify_failure(error) == FailureKind::Transient
    }
}

/// How a client error string should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The prompt exceeds the model's input window.
    ContextTooLarge,
    /// Rate limits, 5xx responses, dropped connections.
    Transient,
    Permanent,
}

const TRANSIENT_STATUSES: [&str; 5] = ["429", "500", "502", "503", "504"];

const TRANSIENT_PHRASES: [&str; 7] = [
    "request failed:",
    "connection reset",
    "connection refused",
    "timed out",
    "timeout",
    "broken pipe",
    "network",
];

const OVERFLOW_PHRASES: [&str; 9] = [
    "context length",
    "context_length_exceeded",
    "context window",
    "maximum context",
    "prompt is too long",
    "too many tokens",
    "reduce the length",
    "token limit",
    "input is too long",
];

pub fn classify_failure(error: &str) -> FailureKind {
    if error.contains("HTTP 413") {
        return FailureKind::ContextTooLarge;
    }
    let transient_status = TRANSIENT_STATUSES
        .iter()
        .any(|s| error.contains(&format!("HTTP {s}")));
    if transient_status {
        return FailureKind::Transient;
    }

    let lower = error.to_lowercase();
    if OVERFLOW_PHRASES.iter().any(|p| lower.contains(p)) {
        return FailureKind::ContextTooLarge;
    }
    let client_status = ["HTTP 400", "HTTP 401", "HTTP 403", "HTTP 404", "HTTP 422"]
        .iter()
        .any(|s| error.contains(s));
    if !client_status && TRANSIENT_PHRASES.iter().any(|p| lower.contains(p)) {
        return FailureKind::Transient;
    }
    FailureKind::Permanent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_disabled_by_default() {
        let config = RetryConfig::default();
        assert!(!config.should_retry(0, "OpenRouter API HTTP 503 Service Unavailable: busy"));
    }

    #[test]
    fn delay_grows_until_capped() {
        let config = RetryConfig {
            jitter: false,
            max_delay_ms: 2_000,
            ..RetryConfig::with_retries(10)
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1_000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2_000));
        assert_eq!(config.delay_for_attempt(9), Duration::from_millis(2_000));
    }

    #[test]
    fn jitter_never_lengthens_delay() {
        let plain = RetryConfig {
            jitter: false,
            ..RetryConfig::with_retries(3)
        };
        let jittered = RetryConfig::with_retries(3);
        for attempt in 0..8 {
            assert!(jittered.delay_for_attempt(attempt) <= plain.delay_for_attempt(attempt));
        }
    }

    #[test]
    fn overflow_responses() {
        assert_eq!(
            classify_failure("OpenRouter API HTTP 413 Payload Too Large: {}"),
            FailureKind::ContextTooLarge
        );
        assert_eq!(
            classify_failure(
                "OpenRouter API HTTP 400 Bad Request: This model's maximum context length is 8192 tokens"
            ),
            FailureKind::ContextTooLarge
        );
        assert_eq!(
            classify_failure("OpenRouter API error: prompt is too long: 250000 tokens > 200000"),
            FailureKind::ContextTooLarge
        );
    }

    #[test]
    fn transient_responses() {
        assert_eq!(
            classify_failure("OpenRouter API HTTP 429 Too Many Requests: slow down"),
            FailureKind::Transient
        );
        assert_eq!(
            classify_failure("request failed: connection reset by peer"),
            FailureKind::Transient
        );
        assert!(RetryConfig::with_retries(2).should_retry(1, "request failed: timed out"));
        assert!(!RetryConfig::with_retries(2).should_retry(2, "request failed: timed out"));
    }

    #[test]
    fn permanent_responses() {
        assert_eq!(
            classify_failure("OpenRouter API HTTP 401 Unauthorized: no key"),
            FailureKind::Permanent
        );
        assert_eq!(
            classify_failure("OpenRouter API HTTP 400 Bad Request: network field invalid"),
            FailureKind::Permanent
        );
        assert_eq!(classify_failure("empty response"), FailureKind::Permanent);
    }

    #[test]
    fn config_from_toml() {
        let config: RetryConfig = toml::from_str("max_retries = 4\njitter = false").unwrap();
        assert_eq!(config.max_retries, 4);
        assert!(!config.jitter);
        assert_eq!(config.initial_delay_ms, 500);
    }
}
