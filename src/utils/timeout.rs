//! Timeout validation for configured browser waits

use std::time::Duration;

use crate::utils::errors::ScrapeError;

/// Maximum timeout for browser navigation operations (5 minutes)
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000;

/// Maximum for any fixed settle, retry or pacing delay (2 minutes)
pub const MAX_FIXED_DELAY_MS: u64 = 120_000;

/// Validate the navigation timeout
///
/// # Returns
/// * `Ok(Duration)` - Validated Duration object
/// * `Err(ScrapeError::InvalidConfig)` - If timeout is zero or exceeds MAX_NAVIGATION_TIMEOUT_MS
pub fn validate_navigation_timeout(timeout_ms: u64) -> Result<Duration, ScrapeError> {
    if timeout_ms == 0 {
        return Err(ScrapeError::InvalidConfig(
            "navigation_timeout_ms must be greater than zero".to_string(),
        ));
    }

    if timeout_ms > MAX_NAVIGATION_TIMEOUT_MS {
        return Err(ScrapeError::InvalidConfig(format!(
            "navigation_timeout_ms cannot exceed {}ms ({} minutes). Received: {}ms ({:.1} minutes)",
            MAX_NAVIGATION_TIMEOUT_MS,
            MAX_NAVIGATION_TIMEOUT_MS / 60_000,
            timeout_ms,
            timeout_ms as f64 / 60_000.0
        )));
    }

    Ok(Duration::from_millis(timeout_ms))
}

/// Validate a fixed delay. Zero is allowed and disables the wait.
pub fn validate_fixed_delay(name: &str, delay_ms: u64) -> Result<Duration, ScrapeError> {
    if delay_ms > MAX_FIXED_DELAY_MS {
        return Err(ScrapeError::InvalidConfig(format!(
            "{} cannot exceed {}ms. Received: {}ms",
            name, MAX_FIXED_DELAY_MS, delay_ms
        )));
    }

    Ok(Duration::from_millis(delay_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_timeout_bounds() {
        assert_eq!(
            validate_navigation_timeout(30_000).unwrap(),
            Duration::from_secs(30)
        );
        assert!(validate_navigation_timeout(0).is_err());
        assert!(validate_navigation_timeout(MAX_NAVIGATION_TIMEOUT_MS + 1).is_err());
    }

    #[test]
    fn zero_fixed_delay_is_allowed() {
        assert_eq!(validate_fixed_delay("pacing_delay_ms", 0).unwrap(), Duration::ZERO);
        let err = validate_fixed_delay("pacing_delay_ms", MAX_FIXED_DELAY_MS + 1).unwrap_err();
        assert!(err.to_string().contains("pacing_delay_ms"));
    }
}
