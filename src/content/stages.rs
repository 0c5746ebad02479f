//! Main-content extraction stages
//!
//! Each stage either produces accepted markdown or declines, leaving the
//! next stage to try. Stages may record a page title on the shared context
//! even when they decline.

use std::io::Cursor;

use scraper::{Html, Selector};
use url::Url;

use super::{MIN_READABILITY_MARKDOWN_CHARS, convert, strip_boilerplate};
use crate::utils::ScrapeError;

/// Base readability resolves hrefs against; resolved links are mapped back
/// to the document's own values afterwards
const PLACEHOLDER_BASE_URL: &str = "http://firescrape.invalid/";

#[derive(Debug, Default)]
pub struct StageContext {
    pub title: Option<String>,
}

pub trait ExtractionStage: Sync {
    fn name(&self) -> &'static str;

    /// `Ok(Some(markdown))` accepts, `Ok(None)` hands over to the next stage
    fn extract(&self, html: &str, ctx: &mut StageContext) -> Result<Option<String>, ScrapeError>;
}

/// Readability scoring; accepted only when the result is substantial
pub struct ReadabilityStage;

impl ExtractionStage for ReadabilityStage {
    fn name(&self) -> &'static str {
        "readability"
    }

    fn extract(&self, html: &str, ctx: &mut StageContext) -> Result<Option<String>, ScrapeError> {
        let Ok(base) = Url::parse(PLACEHOLDER_BASE_URL) else {
            return Ok(None);
        };

        let mut cursor = Cursor::new(html.as_bytes());
        let product = match readability::extractor::extract(&mut cursor, &base) {
            Ok(product) => product,
            Err(e) => {
                tracing::debug!("Readability declined: {}", e);
                return Ok(None);
            }
        };

        let title = product.title.trim();
        if !title.is_empty() {
            ctx.title = Some(title.to_string());
        }

        let content = restore_hrefs(&product.content, &href_restorations(html, &base));
        let markdown = convert(&content)?;
        if markdown.trim().chars().count() > MIN_READABILITY_MARKDOWN_CHARS {
            Ok(Some(markdown))
        } else {
            Ok(None)
        }
    }
}

/// `(resolved, original)` pairs for every href that joining against `base` changes
fn href_restorations(html: &str, base: &Url) -> Vec<(String, String)> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let mut pairs: Vec<(String, String)> = Vec::new();
    for href in document.select(&selector).filter_map(|a| a.value().attr("href")) {
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let resolved = resolved.to_string();
        if resolved != href && !pairs.iter().any(|(seen, _)| *seen == resolved) {
            pairs.push((resolved, href.to_string()));
        }
    }
    pairs
}

/// Put the document's href values back into serialized readability output
fn restore_hrefs(content: &str, pairs: &[(String, String)]) -> String {
    let mut restored = content.to_string();
    for (resolved, original) in pairs {
        restored = restored.replace(
            &format!("href=\"{}\"", escape_attribute(resolved)),
            &format!("href=\"{}\"", escape_attribute(original)),
        );
    }
    restored
}

/// Attribute escaping as html5ever serializes it
fn escape_attribute(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('\u{a0}', "&nbsp;")
        .replace('"', "&quot;")
}

/// Rule-based removal of navigation, chrome and ads; always accepts
pub struct BoilerplateStage;

impl ExtractionStage for BoilerplateStage {
    fn name(&self) -> &'static str {
        "boilerplate"
    }

    fn extract(&self, html: &str, _ctx: &mut StageContext) -> Result<Option<String>, ScrapeError> {
        convert(&strip_boilerplate(html)).map(Some)
    }
}
