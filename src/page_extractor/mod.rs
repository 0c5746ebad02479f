//! Page metadata and link extraction
//!
//! Everything here runs as JavaScript inside the live page; the Rust side
//! only shapes and filters what comes back.

mod js_scripts;
mod schema;

pub(crate) use js_scripts::{SYNC_FORM_STATE_SCRIPT, clear_field_script};
pub use schema::{Link, PageMetadata};

use serde::Deserialize;
use serde_json::Value;

use crate::browser::{BrowserError, BrowserResult, BrowserSession};
use crate::utils::constants::MAX_LINK_TEXT_CHARS;
use crate::utils::truncate_chars;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawMetadata {
    title: Option<String>,
    description: Option<String>,
    language: Option<String>,
    og_title: Option<String>,
    og_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    #[serde(default)]
    text: String,
    #[serde(default)]
    url: String,
}

/// Read title, meta tags and the navigation status code in parallel
///
/// `source_url` is recorded as the URL the caller asked for, not the final
/// URL after redirects.
pub async fn extract_page_metadata(
    session: &dyn BrowserSession,
    source_url: &str,
) -> BrowserResult<PageMetadata> {
    let (raw, status) = tokio::try_join!(
        session.evaluate(js_scripts::METADATA_SCRIPT),
        session.evaluate(js_scripts::STATUS_CODE_SCRIPT),
    )?;

    let raw: RawMetadata = serde_json::from_value(raw)
        .map_err(|e| BrowserError::Evaluation(format!("unexpected metadata shape: {e}")))?;

    Ok(PageMetadata {
        title: raw.title,
        description: raw.description.filter(|d| !d.is_empty()),
        language: raw.language,
        status_code: Some(status_code(&status)),
        source_url: Some(source_url.to_string()),
        og_title: raw.og_title.filter(|t| !t.is_empty()),
        og_image: raw.og_image.filter(|i| !i.is_empty()),
    })
}

/// Anchors in document order, restricted to absolute http(s) targets
pub async fn extract_links(session: &dyn BrowserSession) -> BrowserResult<Vec<Link>> {
    let raw = session.evaluate(js_scripts::LINKS_SCRIPT).await?;
    let raw: Vec<RawLink> = serde_json::from_value(raw)
        .map_err(|e| BrowserError::Evaluation(format!("unexpected links shape: {e}")))?;
    Ok(normalize_links(raw))
}

/// 0 when the navigation entry carries no status, as with `file:` or `about:` pages
fn status_code(value: &Value) -> u16 {
    value
        .as_u64()
        .and_then(|code| u16::try_from(code).ok())
        .unwrap_or(0)
}

fn normalize_links(raw: Vec<RawLink>) -> Vec<Link> {
    raw.into_iter()
        .filter_map(|link| {
            let parsed = url::Url::parse(&link.url).ok()?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return None;
            }
            let text = link.text.split_whitespace().collect::<Vec<_>>().join(" ");
            Some(Link {
                text: truncate_chars(&text, MAX_LINK_TEXT_CHARS).to_string(),
                url: link.url,
            })
        })
        .collect()
}
