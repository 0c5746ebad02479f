//! Process-wide browser manager
//!
//! Exactly one Chrome process serves every scrape. It is launched lazily on
//! the first session request, health-checked on every acquisition, relaunched
//! after a crash, and closed explicitly through [`BrowserManager::shutdown`].
//!
//! # Async Lock Requirements
//!
//! Must use `tokio::sync::Mutex`: browser operations are async and the guard
//! is held across `.await` points during launch and recovery.

use anyhow::Result;
use async_trait::async_trait;
use chromiumoxide_cdp::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::BrowserConfig;
use crate::browser::{
    BrowserError, BrowserResult, BrowserSession, BrowserWrapper, ChromiumSession, SessionProvider,
    launch_browser,
};

static GLOBAL_MANAGER: OnceLock<Arc<BrowserManager>> = OnceLock::new();

/// Owner of the shared browser process
///
/// Sessions are handed out through [`BrowserManager::open_chromium_session`]; each one
/// lives in its own browser context and is never reused.
pub struct BrowserManager {
    browser: Arc<Mutex<Option<BrowserWrapper>>>,
    config: BrowserConfig,
}

impl BrowserManager {
    /// Get the global manager, configured from the YAML config file on first use
    #[must_use]
    pub fn global() -> Arc<BrowserManager> {
        GLOBAL_MANAGER
            .get_or_init(|| {
                let config = crate::load_yaml_config().unwrap_or_default();
                Arc::new(BrowserManager::new(config.browser))
            })
            .clone()
    }

    /// Install the global manager with an explicit configuration
    ///
    /// The first caller wins; later calls return the already installed manager.
    pub fn install_global(config: BrowserConfig) -> Arc<BrowserManager> {
        GLOBAL_MANAGER
            .get_or_init(|| Arc::new(BrowserManager::new(config)))
            .clone()
    }

    fn new(config: BrowserConfig) -> Self {
        Self {
            browser: Arc::new(Mutex::new(None)),
            config,
        }
    }

    /// Get or launch the shared browser with health checking and auto-recovery
    ///
    /// 1. Lock the browser mutex
    /// 2. If a browser exists, probe it with the `version()` CDP command
    /// 3. If the probe fails, close the crashed browser and drop it
    /// 4. Launch a new instance when none is running
    pub async fn get_or_launch(&self) -> Result<Arc<Mutex<Option<BrowserWrapper>>>> {
        let mut guard = self.browser.lock().await;

        if let Some(wrapper) = guard.as_ref() {
            match wrapper.browser().version().await {
                Ok(_) => {
                    debug!("Browser health check passed, reusing existing browser");
                    drop(guard);
                    return Ok(self.browser.clone());
                }
                Err(e) => {
                    warn!("Browser health check failed: {}. Triggering recovery...", e);
                    if let Some(mut crashed) = guard.take() {
                        let _ = crashed.browser_mut().close().await;
                        let _ = crashed.browser_mut().wait().await;
                        crashed.cleanup_temp_dir();
                    }
                }
            }
        }

        info!("Launching browser (first use or after recovery)");
        let (browser, handler, user_data_dir) = launch_browser(&self.config).await?;
        *guard = Some(BrowserWrapper::new(browser, handler, user_data_dir));
        drop(guard);

        Ok(self.browser.clone())
    }

    /// Open a fresh page inside a brand-new browser context
    pub async fn open_chromium_session(&self) -> BrowserResult<ChromiumSession> {
        let browser_arc = self
            .get_or_launch()
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let guard = browser_arc.lock().await;
        let wrapper = guard
            .as_ref()
            .ok_or_else(|| BrowserError::PageCreationFailed("Browser not available".into()))?;

        let context_id = wrapper
            .browser()
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| BrowserError::PageCreationFailed(format!("browser context: {e}")))?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(BrowserError::PageCreationFailed)?;

        let page = match wrapper.browser().new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                let _ = wrapper
                    .browser()
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await;
                return Err(BrowserError::PageCreationFailed(e.to_string()));
            }
        };
        drop(guard);

        debug!("Opened isolated browser session");
        ChromiumSession::prepare(page, context_id, browser_arc).await
    }

    /// Close the browser process if running
    ///
    /// Both `close()` and `wait()` are required: dropping the wrapper only
    /// aborts the handler task and would leave a zombie Chrome behind.
    /// Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;

        if let Some(mut wrapper) = guard.take() {
            info!("Shutting down browser");

            if let Err(e) = wrapper.browser_mut().close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }
            if let Err(e) = wrapper.browser_mut().wait().await {
                warn!("Failed to wait for browser exit: {}", e);
            }
            wrapper.cleanup_temp_dir();
        }

        Ok(())
    }

    /// Non-blocking check whether a browser process has been launched
    pub async fn is_browser_running(&self) -> bool {
        self.browser.lock().await.is_some()
    }
}

#[async_trait]
impl SessionProvider for BrowserManager {
    async fn open_session(&self) -> BrowserResult<Box<dyn BrowserSession>> {
        let session = self.open_chromium_session().await?;
        Ok(Box::new(session))
    }
}
