use thiserror::Error;

use crate::browser::BrowserError;

/// Failures that can end a scrape
///
/// Every variant that reaches the orchestrator boundary is rendered into
/// `ScrapeResult.error`; none of them escape `scrape()` as an `Err`.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Timed out after {timeout_ms}ms waiting for selector '{selector}'")]
    SelectorTimeout { selector: String, timeout_ms: u64 },

    #[error("Action '{action}' failed: {reason}")]
    Action { action: &'static str, reason: String },

    #[error("Content extraction failed: {0}")]
    Extraction(String),

    #[error("The json format requires an extraction prompt")]
    ExtractionPromptMissing,

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),
}

impl ScrapeError {
    pub(crate) fn action(action: &'static str, err: impl std::fmt::Display) -> Self {
        ScrapeError::Action {
            action,
            reason: err.to_string(),
        }
    }

    pub(crate) fn extraction(err: impl std::fmt::Display) -> Self {
        ScrapeError::Extraction(err.to_string())
    }
}
