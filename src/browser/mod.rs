//! Browser infrastructure: launching Chrome and the per-scrape session contract
//!
//! The orchestrator never touches chromiumoxide directly. It talks to a
//! [`BrowserSession`] handed out by a [`SessionProvider`], which keeps the
//! scrape logic testable without a real browser.

mod session;
mod wrapper;

pub use crate::browser_setup::{download_managed_browser, find_browser_executable};
pub use session::ChromiumSession;
pub use wrapper::{BrowserWrapper, launch_browser};

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to find browser executable: {0}")]
    NotFound(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Element not found (timeout after {timeout_ms}ms): '{selector}'")]
    ElementNotFound { selector: String, timeout_ms: u64 },

    #[error("Script evaluation failed: {0}")]
    Evaluation(String),

    #[error("Page interaction failed: {0}")]
    Interaction(String),

    #[error("IO error: {0}")]
    IoError(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

/// One isolated browsing context, owned by exactly one scrape call
///
/// Implementations must make `close` idempotent. Callers close the session
/// explicitly on every exit path; a dropped session that was never closed is
/// torn down in the background.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate and wait for the document to load
    async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()>;

    /// Wait until no new network requests have started for a short quiet window
    async fn wait_for_network_idle(&self, timeout: Duration) -> BrowserResult<()>;

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<()>;

    /// Evaluate a JavaScript expression, awaiting promises, and return its JSON value
    async fn evaluate(&self, expression: &str) -> BrowserResult<Value>;

    /// Serialized outer HTML of the current document
    async fn content(&self) -> BrowserResult<String>;

    async fn current_url(&self) -> BrowserResult<String>;

    async fn click(&self, selector: &str, timeout: Duration) -> BrowserResult<()>;

    /// Focus the element matching `selector` and type `text` into it
    ///
    /// Typing appends to whatever the element already holds.
    async fn fill(&self, selector: &str, text: &str) -> BrowserResult<()>;

    /// Type into whatever element currently has focus
    async fn type_text(&self, text: &str) -> BrowserResult<()>;

    async fn press(&self, key: &str) -> BrowserResult<()>;

    /// PNG bytes of the viewport, or of the whole page when `full_page`
    async fn screenshot(&self, full_page: bool) -> BrowserResult<Vec<u8>>;

    async fn close(&mut self) -> BrowserResult<()>;
}

/// Hands out fresh, unshared sessions
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open_session(&self) -> BrowserResult<Box<dyn BrowserSession>>;
}
