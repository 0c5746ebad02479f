//! Where tool calls are executed: in this process, or on a remote scrape API

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::tools::{BatchToolArgs, ScrapeToolArgs};
use super::{REMOTE_SERVER_NAME, SERVER_NAME};
use crate::scrape::{ScrapeResult, Scraper};
use crate::utils::constants::MAX_ERROR_CHARS;
use crate::utils::truncate_chars;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Request to scrape API failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Scrape API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Scrape API returned an unreadable response: {0}")]
    InvalidResponse(String),
}

/// The two operations every tool is built from
#[async_trait]
pub trait ScrapeBackend: Send + Sync {
    /// Name reported in `serverInfo`
    fn server_name(&self) -> &'static str {
        SERVER_NAME
    }

    async fn scrape(&self, args: ScrapeToolArgs) -> Result<ScrapeResult, BackendError>;

    /// One result per URL, in input order
    async fn batch(&self, args: BatchToolArgs) -> Result<Vec<ScrapeResult>, BackendError>;
}

/// Runs scrapes with the in-process browser
pub struct LocalBackend {
    scraper: Scraper,
    default_max_age: Duration,
}

impl LocalBackend {
    pub fn new(scraper: Scraper, default_max_age: Duration) -> Self {
        Self {
            scraper,
            default_max_age,
        }
    }
}

#[async_trait]
impl ScrapeBackend for LocalBackend {
    async fn scrape(&self, args: ScrapeToolArgs) -> Result<ScrapeResult, BackendError> {
        Ok(self.scraper.scrape(args.to_request(self.default_max_age)).await)
    }

    async fn batch(&self, args: BatchToolArgs) -> Result<Vec<ScrapeResult>, BackendError> {
        let template = args.template();
        Ok(self.scraper.scrape_many(args.urls, &template).await)
    }
}

#[derive(Deserialize)]
struct BatchResponse {
    results: Vec<ScrapeResult>,
}

/// Forwards every call to a scrape API over HTTP
pub struct RemoteBackend {
    client: reqwest::Client,
    api_base: String,
}

impl RemoteBackend {
    pub fn new(api_base: impl Into<String>, request_timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: serde::Serialize + Sync,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.api_base, path);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::Status {
                status,
                body: truncate_chars(&body, MAX_ERROR_CHARS).to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ScrapeBackend for RemoteBackend {
    fn server_name(&self) -> &'static str {
        REMOTE_SERVER_NAME
    }

    async fn scrape(&self, args: ScrapeToolArgs) -> Result<ScrapeResult, BackendError> {
        self.post("/scrape", &args).await
    }

    async fn batch(&self, args: BatchToolArgs) -> Result<Vec<ScrapeResult>, BackendError> {
        let BatchResponse { mut results } = self.post("/batch", &args).await?;

        if results.len() != args.urls.len() {
            warn!(
                "Scrape API returned {} results for {} URLs",
                results.len(),
                args.urls.len()
            );
        }
        results.truncate(args.urls.len());
        for url in &args.urls[results.len()..] {
            results.push(ScrapeResult::failed(url, &"no result returned by scrape API", None));
        }
        Ok(results)
    }
}
