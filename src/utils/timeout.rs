//! Timeout validation for scrape requests and page interactions

use std::time::Duration;

use super::ScrapeError;

/// Maximum timeout for navigation (5 minutes)
/// Covers slow-loading sites, heavy SPAs, and network delays
pub const MAX_NAVIGATION_TIMEOUT_MS: u64 = 300_000;

/// Maximum timeout for element interaction (30 seconds)
pub const MAX_INTERACTION_TIMEOUT_MS: u64 = 30_000;

/// Validate timeout for navigation and wait-for-selector
///
/// # Arguments
/// * `timeout_ms` - Optional timeout in milliseconds
/// * `default_ms` - Default timeout if None provided
///
/// # Returns
/// * `Ok(Duration)` - Validated Duration object
/// * `Err(ScrapeError::InvalidRequest)` - If timeout is zero or exceeds MAX_NAVIGATION_TIMEOUT_MS
pub fn validate_navigation_timeout(
    timeout_ms: Option<u64>,
    default_ms: u64,
) -> Result<Duration, ScrapeError> {
    let ms = timeout_ms.unwrap_or(default_ms);

    if ms == 0 {
        return Err(ScrapeError::InvalidRequest(
            "Navigation timeout must be greater than 0ms".to_string(),
        ));
    }

    if ms > MAX_NAVIGATION_TIMEOUT_MS {
        return Err(ScrapeError::InvalidRequest(format!(
            "Timeout cannot exceed {}ms ({} minutes). Received: {}ms ({:.1} minutes)",
            MAX_NAVIGATION_TIMEOUT_MS,
            MAX_NAVIGATION_TIMEOUT_MS / 60_000,
            ms,
            ms as f64 / 60_000.0
        )));
    }

    Ok(Duration::from_millis(ms))
}

/// Validate timeout for element interaction (click)
pub fn validate_interaction_timeout(
    timeout_ms: Option<u64>,
    default_ms: u64,
) -> Result<Duration, ScrapeError> {
    let ms = timeout_ms.unwrap_or(default_ms);

    if ms > MAX_INTERACTION_TIMEOUT_MS {
        return Err(ScrapeError::InvalidRequest(format!(
            "Timeout cannot exceed {}ms ({} seconds). Received: {}ms ({} seconds)",
            MAX_INTERACTION_TIMEOUT_MS,
            MAX_INTERACTION_TIMEOUT_MS / 1000,
            ms,
            ms / 1000
        )));
    }

    Ok(Duration::from_millis(ms))
}
