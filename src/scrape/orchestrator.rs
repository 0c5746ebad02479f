//! One scrape, end to end
//!
//! `Scraper::scrape` never returns an error: every failure ends up in
//! `ScrapeResult.error`. Each live scrape gets its own browser session, which
//! is closed on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{
    ExtractionInput, Format, NoopExtractor, ScrapeRequest, ScrapeResult, StructuredExtractor,
    assemble_extraction_prompt,
};
use crate::ScrapeConfig;
use crate::actions::{ActionInterpreter, write_artifact};
use crate::browser::{BrowserError, BrowserSession, SessionProvider};
use crate::cache::CacheStore;
use crate::content::to_markdown;
use crate::page_extractor::{SYNC_FORM_STATE_SCRIPT, extract_links, extract_page_metadata};
use crate::utils::{ScrapeError, validate_interaction_timeout, validate_navigation_timeout};

/// Entry point for single and batch scrapes
///
/// Cheap to clone; clones share the session provider, cache and extractor.
#[derive(Clone)]
pub struct Scraper {
    sessions: Arc<dyn SessionProvider>,
    cache: CacheStore,
    extractor: Arc<dyn StructuredExtractor>,
    settings: ScrapeConfig,
}

impl Scraper {
    pub fn new(sessions: Arc<dyn SessionProvider>, cache: CacheStore, settings: ScrapeConfig) -> Self {
        Self {
            sessions,
            cache,
            extractor: Arc::new(NoopExtractor),
            settings,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn StructuredExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn settings(&self) -> &ScrapeConfig {
        &self.settings
    }

    pub async fn scrape(&self, request: ScrapeRequest) -> ScrapeResult {
        let started = Instant::now();
        let url = request.url.clone();

        if let Err(e) = request.validate() {
            warn!("Rejected scrape of {}: {}", url, e);
            return ScrapeResult::failed(&url, &e, None);
        }

        if request.cache_readable()
            && let Some(mut hit) = self.cache.get(&url, request.max_cache_age()).await
        {
            let formats = request.requested_formats();
            if formats.iter().all(|format| hit.has_format(*format)) {
                hit.retain_formats(&formats);
                info!("Cache hit for {}", url);
                return hit;
            }
            debug!("Cache entry for {} lacks a requested format, scraping live", url);
        }

        let mut session = match self.sessions.open_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Could not open a browser session for {}: {}", url, e);
                return ScrapeResult::failed(&url, &ScrapeError::Browser(e), None);
            }
        };

        let mut status_code = None;
        let outcome = self.drive(session.as_ref(), &request, &mut status_code).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session for {}: {}", url, e);
        }

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!("Scrape of {} failed: {}", url, e);
                return ScrapeResult::failed(&url, &e, status_code);
            }
        };

        if request.cache_eligible()
            && let Err(e) = self.cache.put(&url, &result).await
        {
            warn!("Failed to cache {}: {}", url, e);
        }

        info!(
            "Scraped {} in {:.2}s (status {})",
            url,
            started.elapsed().as_secs_f64(),
            result.metadata.status_code.unwrap_or(0)
        );
        result
    }

    async fn drive(
        &self,
        session: &dyn BrowserSession,
        request: &ScrapeRequest,
        status_code: &mut Option<u16>,
    ) -> Result<ScrapeResult, ScrapeError> {
        let url = request.url.as_str();
        let navigation_timeout =
            validate_navigation_timeout(request.timeout, self.settings.navigation_timeout_ms)?;

        session
            .goto(url, navigation_timeout)
            .await
            .map_err(|e| ScrapeError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let idle_timeout = Duration::from_millis(self.settings.network_idle_timeout_ms);
        if let Err(e) = session.wait_for_network_idle(idle_timeout).await {
            debug!("Network did not settle for {}: {}", url, e);
        }

        if let Some(selector) = &request.wait_for_selector {
            let timeout = Duration::from_millis(self.settings.selector_timeout_ms);
            session
                .wait_for_selector(selector, timeout)
                .await
                .map_err(|e| match e {
                    BrowserError::ElementNotFound { .. } | BrowserError::Timeout(_) => {
                        ScrapeError::SelectorTimeout {
                            selector: selector.clone(),
                            timeout_ms: self.settings.selector_timeout_ms,
                        }
                    }
                    other => ScrapeError::Browser(other),
                })?;
        }

        let metadata = extract_page_metadata(session, url)
            .await
            .map_err(ScrapeError::extraction)?;
        *status_code = metadata.status_code;

        let mut result = ScrapeResult::succeeded(url, metadata);

        if !request.actions.is_empty() {
            let click_timeout = validate_interaction_timeout(
                Some(self.settings.click_timeout_ms),
                self.settings.click_timeout_ms,
            )?;
            let artifacts_dir = self.cache.artifacts_dir();
            let interpreter = ActionInterpreter::new(session, &artifacts_dir, click_timeout);
            result.action_outcomes = Some(interpreter.run(&request.actions).await?);

            if let Err(e) = session.evaluate(SYNC_FORM_STATE_SCRIPT).await {
                debug!("Could not sync form state for {}: {}", url, e);
            }
        }

        let html = session.content().await.map_err(ScrapeError::extraction)?;

        for format in request.requested_formats() {
            match format {
                Format::Markdown => {
                    result.markdown = Some(to_markdown(&html, request.only_main_content)?);
                }
                Format::Html => result.html = Some(html.clone()),
                Format::RawHtml => result.raw_html = Some(html.clone()),
                Format::Links => {
                    result.links = Some(extract_links(session).await.map_err(ScrapeError::extraction)?);
                }
                Format::Screenshot => {
                    let bytes = session
                        .screenshot(true)
                        .await
                        .map_err(ScrapeError::extraction)?;
                    let path = self.cache.screenshot_path(url);
                    write_artifact(&path, &bytes)
                        .await
                        .map_err(ScrapeError::extraction)?;
                    result.screenshot_path = Some(path.display().to_string());
                }
                Format::Json => {
                    result.json = Some(self.extract_json(url, request, &html).await?);
                }
            }
        }

        Ok(result)
    }

    async fn extract_json(
        &self,
        url: &str,
        request: &ScrapeRequest,
        html: &str,
    ) -> Result<serde_json::Value, ScrapeError> {
        let prompt = request
            .extraction_prompt
            .clone()
            .ok_or(ScrapeError::ExtractionPromptMissing)?;

        let page_markdown = to_markdown(html, false)?;
        let input = ExtractionInput {
            url: url.to_string(),
            instruction: assemble_extraction_prompt(&prompt, &page_markdown),
            prompt,
        };

        self.extractor
            .extract(&input)
            .await
            .map_err(ScrapeError::extraction)
    }
}
