//! Structured (JSON) extraction collaborator

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::utils::constants::EXTRACTION_CONTEXT_CHARS;
use crate::utils::truncate_chars;

/// What a structured extractor is asked to do
#[derive(Debug, Clone)]
pub struct ExtractionInput {
    pub url: String,
    /// The caller's prompt, verbatim
    pub prompt: String,
    /// Prompt plus response instructions plus page markdown, ready for a model
    pub instruction: String,
}

/// Turns page content into JSON, usually by asking a language model
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(&self, input: &ExtractionInput) -> anyhow::Result<Value>;
}

/// Placeholder used until a model-backed extractor is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExtractor;

#[async_trait]
impl StructuredExtractor for NoopExtractor {
    async fn extract(&self, input: &ExtractionInput) -> anyhow::Result<Value> {
        Ok(json!({
            "note": "No structured extractor configured; plug in an LLM-backed StructuredExtractor",
            "prompt": input.prompt,
        }))
    }
}

/// Build the model instruction from a prompt and full-document markdown
pub fn assemble_extraction_prompt(prompt: &str, page_markdown: &str) -> String {
    format!(
        "{prompt}\n\nRespond ONLY with valid JSON, no markdown formatting.\n\nPage content:\n{}",
        truncate_chars(page_markdown, EXTRACTION_CONTEXT_CHARS)
    )
}
