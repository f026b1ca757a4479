//! Retry policy for the execution core.
//!
//! Two adapters share the mechanics here: Data API retries are bounded and
//! apply only to operations the caller marked safely retryable; DevOps
//! retries handle transient 5xx and connection resets. Both wait out a
//! jittered, capped exponential backoff between attempts, respect the
//! server's `Retry-After` hint, and stop once the remaining operation budget
//! no longer covers the next wait.

use std::time::{Duration, SystemTime};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A configuration that never re-attempts.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Whether an HTTP status signals a fault that a later attempt could clear:
/// 408/429 (overload signals outside the 5xx range) and the server-error
/// range, except 501 and 505 which report a permanent capability gap.
#[must_use]
pub const fn status_is_transient(status: u16) -> bool {
    if status == 408 || status == 429 {
        return true;
    }
    matches!(status, 500..=599) && status != 501 && status != 505
}

/// Connection-level failures (refused, reset, DNS) are transient; anything
/// that reached the server and came back typed is not.
#[must_use]
pub fn is_transient_transport_error(error: &crate::error::Error) -> bool {
    match error {
        crate::error::Error::Network(e) => e.is_connect() || e.is_request(),
        _ => false,
    }
}

/// Reads a `Retry-After` header value as a wait hint.
///
/// RFC 7231 allows either a delay in seconds or an HTTP-date; a date already
/// in the past carries no hint, and neither does a malformed value.
#[must_use]
pub fn server_retry_hint(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    httpdate::parse_http_date(value)
        .ok()
        .and_then(|at| at.duration_since(SystemTime::now()).ok())
}

/// The wait before attempt `attempt + 1`.
///
/// Grows the base interval geometrically up to `max_delay_ms`, then widens it
/// by up to a quarter when jitter is on (so synchronized clients fan out). A
/// server hint extends the wait — it never shortens it — and is itself held
/// to the cap.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn next_delay(
    config: &RetryConfig,
    attempt: usize,
    server_hint: Option<Duration>,
) -> Duration {
    let cap = Duration::from_millis(config.max_delay_ms);

    let mut interval_ms = config.initial_delay_ms as f64;
    for _ in 0..attempt.min(32) {
        if interval_ms >= config.max_delay_ms as f64 {
            break;
        }
        interval_ms *= config.backoff_multiplier;
    }
    let mut wait = Duration::from_millis(interval_ms as u64).min(cap);
    if config.jitter {
        wait += wait.mul_f64(fastrand::f64() / 4.0);
    }

    match server_hint {
        Some(hint) if hint > wait => hint.min(cap),
        _ => wait,
    }
}

/// Whether another attempt fits: false once attempts are exhausted or the
/// remaining operation budget is below the delay itself.
#[must_use]
pub fn should_attempt_again(
    config: &RetryConfig,
    attempt: usize,
    delay: Duration,
    budget_remaining: Option<Duration>,
) -> bool {
    if attempt + 1 >= config.max_attempts {
        return false;
    }
    budget_remaining.is_none_or(|remaining| remaining > delay)
}
