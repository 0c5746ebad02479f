//! Tool surface: argument types, schemas and text rendering
//!
//! Rendering caps apply here only; the `ScrapeResult`s behind them keep
//! their full content.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::protocol::{McpToolDefinition, McpToolResult};
use crate::actions::Action;
use crate::scrape::{Format, ScrapeRequest, ScrapeResult, default_formats};
use crate::utils::truncate_chars;

pub const SCRAPE_TOOL: &str = "firescrape_scrape";
pub const BATCH_TOOL: &str = "firescrape_batch";
pub const EXTRACT_TOOL: &str = "firescrape_extract";

const MAX_MARKDOWN_CHARS: usize = 50_000;
const MAX_JSON_CHARS: usize = 5_000;
const MAX_RENDERED_LINKS: usize = 30;
const MAX_RENDERED_LINK_TEXT_CHARS: usize = 60;
const MAX_BATCH_ENTRY_CHARS: usize = 10_000;
const MAX_EXTRACT_CHARS: usize = 10_000;

fn default_true() -> bool {
    true
}

/// Arguments of `firescrape_scrape`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeToolArgs {
    /// URL to scrape
    pub url: String,
    /// Output formats (default: ["markdown"])
    #[serde(default = "default_formats")]
    pub formats: Vec<Format>,
    /// Extract main content only (default: true)
    #[serde(default = "default_true")]
    pub only_main_content: bool,
    /// AI extraction prompt; implies the json format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Page interactions run before content is captured: wait, click, write, press, scroll, screenshot, scrape
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    /// CSS selector to wait for before scraping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<String>,
    /// Skip the cache (default: false)
    #[serde(default)]
    pub no_cache: bool,
}

impl ScrapeToolArgs {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            formats: default_formats(),
            only_main_content: true,
            prompt: None,
            actions: Vec::new(),
            wait_for: None,
            no_cache: false,
        }
    }

    /// Translate into a scrape request; `default_max_age` applies unless `noCache`
    pub fn to_request(&self, default_max_age: Duration) -> ScrapeRequest {
        let mut request = ScrapeRequest::new(self.url.clone())
            .with_formats(self.formats.iter().copied())
            .with_only_main_content(self.only_main_content)
            .with_actions(self.actions.clone())
            .with_max_cache_age(if self.no_cache {
                Duration::ZERO
            } else {
                default_max_age
            });

        if let Some(selector) = &self.wait_for {
            request = request.with_wait_for_selector(selector.clone());
        }
        if let Some(prompt) = &self.prompt {
            request = request.with_extraction_prompt(prompt.clone());
        }
        request
    }
}

/// Arguments of `firescrape_batch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchToolArgs {
    /// List of URLs to scrape
    pub urls: Vec<String>,
    /// Output formats (default: ["markdown"])
    #[serde(default = "default_formats")]
    pub formats: Vec<Format>,
    /// Extract main content only (default: true)
    #[serde(default = "default_true")]
    pub only_main_content: bool,
}

impl BatchToolArgs {
    /// Options shared by every URL; batches never use the cache
    pub fn template(&self) -> ScrapeRequest {
        ScrapeRequest::new(String::new())
            .with_formats(self.formats.iter().copied())
            .with_only_main_content(self.only_main_content)
            .with_max_cache_age(Duration::ZERO)
    }
}

/// Arguments of `firescrape_extract`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractToolArgs {
    /// URL to extract data from
    pub url: String,
    /// What data to extract (e.g. "Extract all product names and prices")
    pub prompt: String,
}

impl ExtractToolArgs {
    /// Full document, json only, never cached
    pub fn to_scrape_args(&self) -> ScrapeToolArgs {
        ScrapeToolArgs {
            formats: vec![Format::Json],
            only_main_content: false,
            prompt: Some(self.prompt.clone()),
            no_cache: true,
            ..ScrapeToolArgs::new(self.url.clone())
        }
    }
}

fn input_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| serde_json::json!({ "type": "object" }))
}

/// Definitions returned by `tools/list`
pub fn tool_definitions() -> Vec<McpToolDefinition> {
    vec![
        McpToolDefinition {
            name: SCRAPE_TOOL.to_string(),
            description: "Scrape a URL with a real browser and return markdown, HTML, links, a \
                          screenshot path, or structured JSON. Supports scripted page actions."
                .to_string(),
            input_schema: input_schema::<ScrapeToolArgs>(),
        },
        McpToolDefinition {
            name: BATCH_TOOL.to_string(),
            description: "Scrape multiple URLs in parallel. Returns one section per URL, in order."
                .to_string(),
            input_schema: input_schema::<BatchToolArgs>(),
        },
        McpToolDefinition {
            name: EXTRACT_TOOL.to_string(),
            description: "Extract structured data from a URL using AI. Returns JSON.".to_string(),
            input_schema: input_schema::<ExtractToolArgs>(),
        },
    ]
}

fn capped(text: &str, max: usize) -> String {
    let total = text.chars().count();
    if total > max {
        format!(
            "{}\n\n... (truncated, {} total chars)",
            truncate_chars(text, max),
            total
        )
    } else {
        text.to_string()
    }
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Text for one scrape; failures become an error result
pub fn render_scrape(result: &ScrapeResult) -> McpToolResult {
    if !result.success {
        return McpToolResult::error(format!(
            "Error scraping {}: {}",
            result.url,
            result.error.as_deref().unwrap_or("unknown error")
        ));
    }

    let mut parts = Vec::new();

    if let Some(title) = result.title() {
        parts.push(format!("**{title}**\n"));
    }

    if let Some(markdown) = &result.markdown {
        parts.push(capped(markdown, MAX_MARKDOWN_CHARS));
    }

    if let Some(json) = &result.json {
        parts.push(format!(
            "\n**Extracted JSON:**\n```json\n{}\n```",
            truncate_chars(&pretty_json(json), MAX_JSON_CHARS)
        ));
    }

    if let Some(links) = &result.links {
        let listed = links
            .iter()
            .take(MAX_RENDERED_LINKS)
            .map(|l| {
                format!(
                    "- [{}]({})",
                    truncate_chars(&l.text, MAX_RENDERED_LINK_TEXT_CHARS),
                    l.url
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        parts.push(format!("\n**Links ({} total):**\n{listed}", links.len()));
    }

    if let Some(path) = &result.screenshot_path {
        parts.push(format!("\n**Screenshot:** {path}"));
    }

    if result.from_cache {
        parts.push("\n*(from cache)*".to_string());
    }

    McpToolResult::text(parts.join("\n"))
}

/// One section per URL, in input order; failed URLs never fail the batch
pub fn render_batch(urls: &[String], results: &[ScrapeResult]) -> McpToolResult {
    let sections: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let url = urls.get(i).map(String::as_str).unwrap_or(result.url.as_str());
            if result.success {
                let title = result.title().unwrap_or(url);
                let markdown = result.markdown.as_deref().unwrap_or_default();
                format!(
                    "## {}. {}\n{}\n",
                    i + 1,
                    title,
                    truncate_chars(markdown, MAX_BATCH_ENTRY_CHARS)
                )
            } else {
                format!(
                    "## {}. FAILED: {}\n{}\n",
                    i + 1,
                    url,
                    result.error.as_deref().unwrap_or("unknown error")
                )
            }
        })
        .collect();

    McpToolResult::text(sections.join("\n---\n"))
}

/// Pretty JSON from an extraction, or an error result
pub fn render_extract(result: &ScrapeResult) -> McpToolResult {
    match (&result.json, result.success) {
        (Some(json), true) => {
            McpToolResult::text(truncate_chars(&pretty_json(json), MAX_EXTRACT_CHARS))
        }
        _ => McpToolResult::error(format!(
            "Error: {}",
            result.error.as_deref().unwrap_or("extraction failed")
        )),
    }
}
