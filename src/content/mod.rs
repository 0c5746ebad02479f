//! HTML to LLM-ready markdown
//!
//! [`to_markdown`] is pure: the same input always yields the same output.
//! With `only_main_content` the document runs through an ordered chain of
//! [`ExtractionStage`]s and the first accepted candidate wins.

mod boilerplate;
mod stages;

pub use boilerplate::strip_boilerplate;
pub use stages::{BoilerplateStage, ExtractionStage, ReadabilityStage, StageContext};

use htmd::HtmlToMarkdown;

use crate::utils::ScrapeError;

/// Readability output shorter than this (in markdown characters) is treated as noise
pub const MIN_READABILITY_MARKDOWN_CHARS: usize = 500;

/// A main-content container must carry more than this much stripped text
pub const MIN_MAIN_CONTAINER_TEXT_CHARS: usize = 200;

fn converter() -> HtmlToMarkdown {
    HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "img", "noscript", "head", "template"])
        .build()
}

/// Convert an HTML fragment or document to raw markdown, images and scripts dropped
pub fn convert(html: &str) -> Result<String, ScrapeError> {
    converter().convert(html).map_err(ScrapeError::extraction)
}

fn main_content_chain() -> [&'static dyn ExtractionStage; 2] {
    [&ReadabilityStage, &BoilerplateStage]
}

/// Turn a page into clean markdown
///
/// With `only_main_content` the readability candidate is used when it is long
/// enough, otherwise boilerplate regions are stripped from the full document.
/// A title found along the way is prepended as a level-one heading.
pub fn to_markdown(html: &str, only_main_content: bool) -> Result<String, ScrapeError> {
    let mut ctx = StageContext::default();

    let markdown = if only_main_content {
        let mut accepted = None;
        for stage in main_content_chain() {
            if let Some(markdown) = stage.extract(html, &mut ctx)? {
                tracing::debug!("Main content taken from {} stage", stage.name());
                accepted = Some(markdown);
                break;
            }
        }
        match accepted {
            Some(markdown) => markdown,
            None => convert(html)?,
        }
    } else {
        convert(html)?
    };

    let title = match ctx.title {
        Some(title) => Some(title),
        None if only_main_content => document_title(html),
        None => None,
    };

    let cleaned = normalize_whitespace(&markdown);
    Ok(prepend_title(cleaned, title.as_deref()))
}

/// Text of the first `<title>`, when readability did not report one
fn document_title(html: &str) -> Option<String> {
    let selector = scraper::Selector::parse("title").ok()?;
    let document = scraper::Html::parse_document(html);
    let title: String = document.select(&selector).next()?.text().collect();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Trim trailing whitespace per line and collapse runs of blank lines to one
fn normalize_whitespace(markdown: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut prev_blank = false;

    for line in markdown.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if !prev_blank {
                lines.push("");
            }
            prev_blank = true;
        } else {
            lines.push(line);
            prev_blank = false;
        }
    }

    lines.join("\n").trim().to_string()
}

fn prepend_title(markdown: String, title: Option<&str>) -> String {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) if !markdown.starts_with(&format!("# {title}")) => {
            format!("# {title}\n\n{markdown}")
        }
        _ => markdown,
    }
}
