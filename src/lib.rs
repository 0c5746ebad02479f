//! Local web page to LLM-ready markdown scraper
//!
//! Drives a shared headless Chrome through isolated sessions, turns pages
//! into markdown, HTML, links, screenshots or extracted JSON, caches results
//! on disk, and exposes all of it as stdio tools for agent hosts.

pub mod actions;
mod browser;
pub mod browser_setup;
pub mod cache;
pub mod content;
mod manager;
pub mod mcp;
pub mod page_extractor;
pub mod scrape;
pub mod utils;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::utils::constants::{DEFAULT_MAX_CACHE_AGE_SECS, VIEWPORT_HEIGHT, VIEWPORT_WIDTH};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Browser security and launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features (Same-Origin Policy, etc.)
    /// WARNING: Only enable for trusted content
    #[serde(default)]
    pub disable_security: bool,

    #[serde(default)]
    pub window: WindowConfig,

    /// Explicit Chrome/Chromium binary; otherwise `$CHROMIUM_PATH` and well-known locations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Staleness accepted when a caller does not opt out of the cache
    #[serde(default = "default_max_age_secs")]
    pub default_max_age_secs: u64,
}

/// Timeouts and limits for the scrape pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,

    /// Upper bound on the best-effort wait for network quiescence
    #[serde(default = "default_network_idle_timeout_ms")]
    pub network_idle_timeout_ms: u64,

    #[serde(default = "default_selector_timeout_ms")]
    pub selector_timeout_ms: u64,

    #[serde(default = "default_click_timeout_ms")]
    pub click_timeout_ms: u64,

    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

/// HTTP API the proxy server forwards to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_headless() -> bool {
    true
}

fn default_window_width() -> u32 {
    VIEWPORT_WIDTH
}

fn default_window_height() -> u32 {
    VIEWPORT_HEIGHT
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| std::env::temp_dir().join(".cache"))
        .join("firescrape")
}

fn default_max_age_secs() -> u64 {
    DEFAULT_MAX_CACHE_AGE_SECS
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

fn default_network_idle_timeout_ms() -> u64 {
    5_000
}

fn default_selector_timeout_ms() -> u64 {
    10_000
}

fn default_click_timeout_ms() -> u64 {
    5_000
}

fn default_batch_concurrency() -> usize {
    8
}

fn default_api_base() -> String {
    std::env::var("FIRESCRAPE_API").unwrap_or_else(|_| "http://localhost:5003".to_string())
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: false,
            window: WindowConfig::default(),
            executable: None,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            default_max_age_secs: default_max_age_secs(),
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: default_navigation_timeout_ms(),
            network_idle_timeout_ms: default_network_idle_timeout_ms(),
            selector_timeout_ms: default_selector_timeout_ms(),
            click_timeout_ms: default_click_timeout_ms(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Path of the YAML config: `$FIRESCRAPE_CONFIG`, else `./firescrape.yaml`
pub fn config_path() -> PathBuf {
    std::env::var_os("FIRESCRAPE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("firescrape.yaml"))
}

/// Load the YAML config, falling back to defaults when no file exists
pub fn load_yaml_config() -> anyhow::Result<Config> {
    let path = config_path();

    if path.exists() {
        let contents = fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    } else {
        Ok(Config::default())
    }
}

/// Scraper backed by the global browser manager and the configured cache
pub fn local_scraper(config: &Config) -> scrape::Scraper {
    let manager = BrowserManager::install_global(config.browser.clone());
    scrape::Scraper::new(
        manager,
        cache::CacheStore::new(config.cache.dir.clone()),
        config.scrape.clone(),
    )
}

pub use browser::{
    BrowserError, BrowserResult, BrowserSession, BrowserWrapper, ChromiumSession, SessionProvider,
    download_managed_browser, find_browser_executable, launch_browser,
};
pub use manager::BrowserManager;
pub use scrape::{Format, ScrapeRequest, ScrapeResult, Scraper};
pub use utils::ScrapeError;
