//! Scrape requests, results and the orchestrator that turns one into the other

mod batch;
mod extract;
mod orchestrator;

pub use extract::{ExtractionInput, NoopExtractor, StructuredExtractor, assemble_extraction_prompt};
pub use orchestrator::Scraper;

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::{Action, ActionOutcomes, validate_actions};
use crate::page_extractor::{Link, PageMetadata};
use crate::utils::constants::DEFAULT_MAX_CACHE_AGE_SECS;
use crate::utils::{ScrapeError, bounded_error};

/// Output formats a scrape can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Format {
    Markdown,
    Html,
    RawHtml,
    Links,
    Screenshot,
    Json,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Markdown => "markdown",
            Format::Html => "html",
            Format::RawHtml => "rawHtml",
            Format::Links => "links",
            Format::Screenshot => "screenshot",
            Format::Json => "json",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "markdown" => Ok(Format::Markdown),
            "html" => Ok(Format::Html),
            "rawHtml" => Ok(Format::RawHtml),
            "links" => Ok(Format::Links),
            "screenshot" => Ok(Format::Screenshot),
            "json" => Ok(Format::Json),
            other => Err(ScrapeError::InvalidRequest(format!("unknown format '{other}'"))),
        }
    }
}

pub(crate) fn default_formats() -> Vec<Format> {
    vec![Format::Markdown]
}

fn default_true() -> bool {
    true
}

fn default_max_cache_age_ms() -> u64 {
    DEFAULT_MAX_CACHE_AGE_SECS * 1000
}

/// What to scrape and how
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub url: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<Format>,
    #[serde(default = "default_true")]
    pub only_main_content: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<String>,
    /// Milliseconds of staleness accepted from the cache; 0 bypasses it
    #[serde(default = "default_max_cache_age_ms")]
    pub max_cache_age: u64,
    /// Navigation timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_prompt: Option<String>,
}

impl ScrapeRequest {
    /// Markdown of the main content, cached for two days
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            formats: default_formats(),
            only_main_content: true,
            actions: Vec::new(),
            wait_for_selector: None,
            max_cache_age: default_max_cache_age_ms(),
            timeout: None,
            extraction_prompt: None,
        }
    }

    pub fn with_formats(mut self, formats: impl IntoIterator<Item = Format>) -> Self {
        self.formats = formats.into_iter().collect();
        self
    }

    pub fn with_only_main_content(mut self, only_main_content: bool) -> Self {
        self.only_main_content = only_main_content;
        self
    }

    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_wait_for_selector(mut self, selector: impl Into<String>) -> Self {
        self.wait_for_selector = Some(selector.into());
        self
    }

    pub fn with_max_cache_age(mut self, max_age: Duration) -> Self {
        self.max_cache_age = max_age.as_millis() as u64;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the extraction prompt and make sure `json` is among the formats
    pub fn with_extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.extraction_prompt = Some(prompt.into());
        if !self.formats.contains(&Format::Json) {
            self.formats.push(Format::Json);
        }
        self
    }

    /// Same options, different URL
    pub fn for_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..self.clone()
        }
    }

    pub fn max_cache_age(&self) -> Duration {
        Duration::from_millis(self.max_cache_age)
    }

    /// Actions force a live page, so they also bypass the cache
    pub fn cache_eligible(&self) -> bool {
        self.actions.is_empty() && self.max_cache_age > 0
    }

    /// Whether a cached result may answer this request
    ///
    /// Screenshots are never persisted and json depends on the prompt, so
    /// either format forces a live scrape.
    pub fn cache_readable(&self) -> bool {
        self.cache_eligible() && !self.wants(Format::Screenshot) && !self.wants(Format::Json)
    }

    pub fn wants(&self, format: Format) -> bool {
        self.formats.contains(&format)
    }

    /// Requested formats without duplicates, in request order
    pub fn requested_formats(&self) -> Vec<Format> {
        let mut seen = Vec::with_capacity(self.formats.len());
        for format in &self.formats {
            if !seen.contains(format) {
                seen.push(*format);
            }
        }
        seen
    }

    /// Checks that need no browser
    pub fn validate(&self) -> Result<(), ScrapeError> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| ScrapeError::InvalidRequest(format!("invalid URL '{}': {e}", self.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ScrapeError::InvalidRequest(format!(
                "URL must start with http:// or https://, got '{}'",
                self.url
            )));
        }

        if self.formats.is_empty() {
            return Err(ScrapeError::InvalidRequest(
                "at least one output format is required".to_string(),
            ));
        }

        let has_prompt = self
            .extraction_prompt
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        if self.wants(Format::Json) && !has_prompt {
            return Err(ScrapeError::ExtractionPromptMissing);
        }

        if let Some(selector) = &self.wait_for_selector
            && selector.trim().is_empty()
        {
            return Err(ScrapeError::InvalidRequest(
                "waitForSelector must not be empty".to_string(),
            ));
        }

        validate_actions(&self.actions)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Outcome of one scrape
///
/// On failure only `url`, `error` and `metadata.statusCode` are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub success: bool,
    pub url: String,
    #[serde(default)]
    pub metadata: PageMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_outcomes: Option<ActionOutcomes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the result was served from the cache
    #[serde(default, skip_serializing_if = "is_false")]
    pub from_cache: bool,
}

impl ScrapeResult {
    pub(crate) fn succeeded(url: impl Into<String>, metadata: PageMetadata) -> Self {
        Self {
            success: true,
            url: url.into(),
            metadata,
            ..Self::default()
        }
    }

    /// A failed result carrying a bounded error message
    pub fn failed(url: impl Into<String>, error: &dyn std::fmt::Display, status_code: Option<u16>) -> Self {
        Self {
            success: false,
            url: url.into(),
            metadata: PageMetadata {
                status_code,
                ..PageMetadata::default()
            },
            error: Some(bounded_error(error)),
            ..Self::default()
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.title.as_deref().filter(|t| !t.is_empty())
    }

    pub fn has_format(&self, format: Format) -> bool {
        match format {
            Format::Markdown => self.markdown.is_some(),
            Format::Html => self.html.is_some(),
            Format::RawHtml => self.raw_html.is_some(),
            Format::Links => self.links.is_some(),
            Format::Screenshot => self.screenshot_path.is_some(),
            Format::Json => self.json.is_some(),
        }
    }

    /// Clear every output whose format is not in `formats`
    pub(crate) fn retain_formats(&mut self, formats: &[Format]) {
        let keep = |format: Format| formats.contains(&format);
        if !keep(Format::Markdown) {
            self.markdown = None;
        }
        if !keep(Format::Html) {
            self.html = None;
        }
        if !keep(Format::RawHtml) {
            self.raw_html = None;
        }
        if !keep(Format::Links) {
            self.links = None;
        }
        if !keep(Format::Screenshot) {
            self.screenshot_path = None;
        }
        if !keep(Format::Json) {
            self.json = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_from_minimal_json() {
        let req: ScrapeRequest = serde_json::from_str(r#"{"url": "https://example.com"}"#).unwrap();
        assert_eq!(req, ScrapeRequest::new("https://example.com"));
        assert!(req.cache_eligible());
    }

    #[test]
    fn actions_force_cache_bypass() {
        let req = ScrapeRequest::new("https://example.com").with_actions(vec![Action::Wait { milliseconds: 10 }]);
        assert!(!req.cache_eligible());

        let req = ScrapeRequest::new("https://example.com").with_max_cache_age(Duration::ZERO);
        assert!(!req.cache_eligible());
    }

    #[test]
    fn screenshot_and_json_requests_skip_cache_reads() {
        let plain = ScrapeRequest::new("https://example.com");
        assert!(plain.cache_readable());

        let shot = plain.clone().with_formats([Format::Markdown, Format::Screenshot]);
        assert!(shot.cache_eligible());
        assert!(!shot.cache_readable());

        let json = plain.with_extraction_prompt("prices");
        assert!(!json.cache_readable());
    }

    #[test]
    fn retain_formats_clears_unrequested_outputs() {
        let mut result = ScrapeResult::succeeded("https://example.com", PageMetadata::default());
        result.markdown = Some("# x".into());
        result.links = Some(Vec::new());
        result.html = Some("<p>x</p>".into());

        result.retain_formats(&[Format::Links, Format::Markdown]);

        assert!(result.has_format(Format::Markdown));
        assert!(result.has_format(Format::Links));
        assert!(!result.has_format(Format::Html));
    }

    #[test]
    fn json_without_prompt_is_rejected_up_front() {
        let req = ScrapeRequest::new("https://example.com").with_formats([Format::Json]);
        assert!(matches!(req.validate(), Err(ScrapeError::ExtractionPromptMissing)));

        let req = ScrapeRequest::new("https://example.com").with_extraction_prompt("prices");
        assert!(req.validate().is_ok());
        assert!(req.wants(Format::Json));
    }

    #[test]
    fn malformed_and_non_http_urls_are_invalid() {
        for url in ["not a url", "ftp://example.com/file", "file:///etc/passwd"] {
            assert!(matches!(
                ScrapeRequest::new(url).validate(),
                Err(ScrapeError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn empty_formats_are_invalid() {
        let req = ScrapeRequest::new("https://example.com").with_formats([]);
        assert!(req.validate().is_err());
    }

    #[test]
    fn duplicate_formats_collapse_in_order() {
        let req = ScrapeRequest::new("https://example.com")
            .with_formats([Format::Links, Format::Markdown, Format::Links]);
        assert_eq!(req.requested_formats(), vec![Format::Links, Format::Markdown]);
    }

    #[test]
    fn failed_result_carries_only_error_and_status() {
        let result = ScrapeResult::failed("https://example.com", &"boom", Some(502));
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.metadata.status_code, Some(502));
        assert!(result.markdown.is_none() && result.links.is_none() && result.json.is_none());
    }

    #[test]
    fn result_serializes_with_wire_names() {
        let mut result = ScrapeResult::succeeded("https://example.com", PageMetadata::default());
        result.raw_html = Some("<p>x</p>".into());
        result.metadata.source_url = Some("https://example.com".into());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["rawHtml"], "<p>x</p>");
        assert_eq!(json["metadata"]["sourceURL"], "https://example.com");
        assert!(json.get("fromCache").is_none());
    }
}
