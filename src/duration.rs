//! Duration parsing utilities for configuration values.
//!
//! Supports human-readable duration formats like "500ms", "10s", "1m" in
//! places that accept a poll interval or timeout override.

use crate::error::Error;
use std::time::Duration;

/// Parses a human-readable duration string into a `Duration`.
///
/// Supported formats:
/// - Milliseconds: "100ms", "500ms"
/// - Seconds: "1s", "30s", "120s"
/// - Minutes: "1m", "5m"
/// - Plain number (treated as milliseconds): "500"
///
/// # Errors
///
/// Returns a configuration error naming `field` if the format is invalid.
pub fn parse_duration(field: &'static str, s: &str) -> Result<Duration, Error> {
    let s = s.trim();

    if s.is_empty() {
        return Err(Error::invalid_config(field, "duration cannot be empty"));
    }

    if let Some(ms_str) = s.strip_suffix("ms") {
        let ms: u64 = ms_str.trim().parse().map_err(|_| {
            Error::invalid_config(field, format!("invalid milliseconds value: {ms_str}"))
        })?;
        return Ok(Duration::from_millis(ms));
    }

    // "m" must come after "ms" so "100ms" is not read as minutes.
    if let Some(m_str) = s.strip_suffix('m') {
        let minutes: u64 = m_str.trim().parse().map_err(|_| {
            Error::invalid_config(field, format!("invalid minutes value: {m_str}"))
        })?;
        return Ok(Duration::from_secs(minutes * 60));
    }

    if let Some(s_str) = s.strip_suffix('s') {
        let secs: u64 = s_str.trim().parse().map_err(|_| {
            Error::invalid_config(field, format!("invalid seconds value: {s_str}"))
        })?;
        return Ok(Duration::from_secs(secs));
    }

    let ms: u64 = s.parse().map_err(|_| {
        Error::invalid_config(
            field,
            format!("invalid duration format: {s}. Use format like '500ms', '10s', or '1m'"),
        )
    })?;
    Ok(Duration::from_millis(ms))
}
