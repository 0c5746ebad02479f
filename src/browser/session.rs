//! chromiumoxide-backed [`BrowserSession`]
//!
//! Each session owns a page inside its own browser context, so cookies,
//! storage and cache never leak between scrapes. Closing the session closes
//! the page and disposes the context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide_cdp::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide_cdp::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide_cdp::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide_cdp::cdp::browser_protocol::target::DisposeBrowserContextParams;
use chromiumoxide_cdp::cdp::js_protocol::runtime::EvaluateParams;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{BrowserError, BrowserResult, BrowserSession, BrowserWrapper};
use crate::utils::constants::{VIEWPORT_HEIGHT, VIEWPORT_WIDTH};
use crate::utils::wait_for_element;

/// Quiet window after which the network counts as idle
const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);
const NETWORK_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct ChromiumSession {
    page: Page,
    context_id: Option<BrowserContextId>,
    browser: Arc<Mutex<Option<BrowserWrapper>>>,
    closed: bool,
}

impl ChromiumSession {
    /// Wrap a freshly created page and apply the session viewport
    pub(crate) async fn prepare(
        page: Page,
        context_id: BrowserContextId,
        browser: Arc<Mutex<Option<BrowserWrapper>>>,
    ) -> BrowserResult<Self> {
        let mut session = Self {
            page,
            context_id: Some(context_id),
            browser,
            closed: false,
        };

        let viewport = SetDeviceMetricsOverrideParams::builder()
            .width(VIEWPORT_WIDTH as i64)
            .height(VIEWPORT_HEIGHT as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(BrowserError::PageCreationFailed);

        let applied = match viewport {
            Ok(params) => session
                .page
                .execute(params)
                .await
                .map(|_| ())
                .map_err(|e| BrowserError::PageCreationFailed(e.to_string())),
            Err(e) => Err(e),
        };

        if let Err(e) = applied {
            let _ = session.close().await;
            return Err(e);
        }

        Ok(session)
    }

    async fn find(&self, selector: &str) -> BrowserResult<chromiumoxide::element::Element> {
        self.page
            .find_element(selector)
            .await
            .map_err(|e| BrowserError::Interaction(format!("no element matches '{selector}': {e}")))
    }
}

async fn teardown(
    page: Page,
    context_id: Option<BrowserContextId>,
    browser: Arc<Mutex<Option<BrowserWrapper>>>,
) -> BrowserResult<()> {
    let page_result = page.close().await;

    if let Some(id) = context_id {
        let guard = browser.lock().await;
        if let Some(wrapper) = guard.as_ref()
            && let Err(e) = wrapper
                .browser()
                .execute(DisposeBrowserContextParams::new(id))
                .await
        {
            warn!("Failed to dispose browser context: {}", e);
        }
    }

    page_result.map_err(|e| BrowserError::Interaction(format!("failed to close page: {e}")))
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&self, url: &str, timeout: Duration) -> BrowserResult<()> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| BrowserError::Timeout(timeout.as_millis() as u64))?
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> BrowserResult<()> {
        let deadline = Instant::now() + timeout;
        let mut last_count = None;
        let mut quiet_since = Instant::now();

        loop {
            let count = self
                .evaluate("performance.getEntriesByType('resource').length")
                .await?
                .as_u64();

            if count != last_count {
                last_count = count;
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= NETWORK_QUIET_WINDOW {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(timeout.as_millis() as u64));
            }
            tokio::time::sleep(NETWORK_POLL_INTERVAL).await;
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        wait_for_element(&self.page, selector, timeout).await.map(|_| ())
    }

    async fn evaluate(&self, expression: &str) -> BrowserResult<Value> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(BrowserError::Evaluation)?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn content(&self) -> BrowserResult<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::Evaluation(format!("failed to read document: {e}")))
    }

    async fn current_url(&self) -> BrowserResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| BrowserError::Evaluation(format!("failed to read URL: {e}")))?;
        Ok(url.unwrap_or_default())
    }

    async fn click(&self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        let element = wait_for_element(&self.page, selector, timeout).await?;

        element
            .scroll_into_view()
            .await
            .map_err(|e| BrowserError::Interaction(format!("scroll to '{selector}' failed: {e}")))?;

        let point = element
            .clickable_point()
            .await
            .map_err(|e| BrowserError::Interaction(format!("'{selector}' is not clickable: {e}")))?;

        self.page
            .click(point)
            .await
            .map_err(|e| BrowserError::Interaction(format!("click on '{selector}' failed: {e}")))?;

        debug!("Clicked '{}'", selector);
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> BrowserResult<()> {
        let element = self.find(selector).await?;

        element
            .focus()
            .await
            .map_err(|e| BrowserError::Interaction(format!("focus on '{selector}' failed: {e}")))?;

        element
            .type_str(text)
            .await
            .map_err(|e| BrowserError::Interaction(format!("typing into '{selector}' failed: {e}")))?;

        Ok(())
    }

    async fn type_text(&self, text: &str) -> BrowserResult<()> {
        self.find("body")
            .await?
            .type_str(text)
            .await
            .map_err(|e| BrowserError::Interaction(format!("typing failed: {e}")))?;
        Ok(())
    }

    async fn press(&self, key: &str) -> BrowserResult<()> {
        self.find("body")
            .await?
            .press_key(key)
            .await
            .map_err(|e| BrowserError::Interaction(format!("key press '{key}' failed: {e}")))?;
        Ok(())
    }

    async fn screenshot(&self, full_page: bool) -> BrowserResult<Vec<u8>> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(full_page)
                    .build(),
            )
            .await
            .map_err(|e| BrowserError::Interaction(format!("screenshot failed: {e}")))
    }

    async fn close(&mut self) -> BrowserResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        teardown(self.page.clone(), self.context_id.take(), self.browser.clone()).await
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Reached when the owning future was cancelled mid-scrape
        let page = self.page.clone();
        let context_id = self.context_id.take();
        let browser = self.browser.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = teardown(page, context_id, browser).await {
                    debug!("Background session teardown failed: {}", e);
                }
            });
        }
    }
}
