//! TTL-gated file cache of scrape results
//!
//! One JSON file per URL, named by the SHA-256 of the exact URL string.
//! Entries expire lazily against the caller's max age, unreadable entries
//! count as misses, and writes go through a temp file plus rename so a
//! reader never sees half a record.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::scrape::ScrapeResult;
use crate::utils::constants::{MAX_CACHED_FIELD_CHARS, MAX_CACHED_LINKS};
use crate::utils::truncate_chars;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    #[serde(rename = "cachedAt")]
    cached_at: DateTime<Utc>,
    #[serde(flatten)]
    result: ScrapeResult,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable hex key for a URL
    pub fn key(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    fn record_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::key(url)))
    }

    /// Where full-page screenshots of `url` are written
    pub fn screenshot_path(&self, url: &str) -> PathBuf {
        self.artifacts_dir().join(format!("ss_{}.png", Self::key(url)))
    }

    /// Directory for screenshots and other binary artifacts
    pub fn artifacts_dir(&self) -> PathBuf {
        self.dir.join("screenshots")
    }

    /// Cached result for `url` if it is younger than `max_age`
    pub async fn get(&self, url: &str, max_age: Duration) -> Option<ScrapeResult> {
        if max_age.is_zero() {
            return None;
        }

        let record = match self.read_record(url).await {
            Ok(record) => record,
            Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                debug!("Treating cache entry for {} as a miss: {}", url, e);
                return None;
            }
        };

        let age = Utc::now().signed_duration_since(record.cached_at);
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        if age >= max_age {
            debug!("Cache entry for {} expired ({}s old)", url, age.num_seconds());
            return None;
        }

        let mut result = record.result;
        result.from_cache = true;
        Some(result)
    }

    async fn read_record(&self, url: &str) -> Result<CacheRecord, CacheError> {
        let bytes = tokio::fs::read(self.record_path(url)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Store `result` for `url`, replacing any previous entry
    pub async fn put(&self, url: &str, result: &ScrapeResult) -> Result<(), CacheError> {
        self.put_at(url, result, Utc::now()).await
    }

    pub(crate) async fn put_at(
        &self,
        url: &str,
        result: &ScrapeResult,
        cached_at: DateTime<Utc>,
    ) -> Result<(), CacheError> {
        let record = CacheRecord {
            cached_at,
            result: persistable(result),
        };
        let body = serde_json::to_vec(&record)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.record_path(url);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", Self::key(url), Uuid::new_v4().simple()));

        tokio::fs::write(&tmp, &body).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!("Cached {} ({} bytes)", url, body.len());
        Ok(())
    }
}

fn cap(field: &Option<String>) -> Option<String> {
    field
        .as_deref()
        .map(|s| truncate_chars(s, MAX_CACHED_FIELD_CHARS).to_string())
}

/// Json whose serialized form exceeds the field cap is not persisted
fn cap_json(json: &Option<serde_json::Value>) -> Option<serde_json::Value> {
    let json = json.as_ref()?;
    let size = serde_json::to_string(json).map(|s| s.chars().count()).ok()?;
    (size <= MAX_CACHED_FIELD_CHARS).then(|| json.clone())
}

/// Copy of `result` with payloads capped and screenshot data dropped
fn persistable(result: &ScrapeResult) -> ScrapeResult {
    ScrapeResult {
        markdown: cap(&result.markdown),
        html: cap(&result.html),
        raw_html: cap(&result.raw_html),
        links: result
            .links
            .as_ref()
            .map(|links| links.iter().take(MAX_CACHED_LINKS).cloned().collect()),
        json: cap_json(&result.json),
        screenshot_path: None,
        action_outcomes: None,
        from_cache: false,
        ..result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_extractor::{Link, PageMetadata};

    fn sample(url: &str) -> ScrapeResult {
        let mut result = ScrapeResult::succeeded(
            url,
            PageMetadata {
                title: Some("Example".into()),
                ..PageMetadata::default()
            },
        );
        result.markdown = Some("# Example\n\nBody".into());
        result
    }

    #[tokio::test]
    async fn hit_within_ttl_is_marked_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path());
        let url = "https://example.com/a";

        cache.put(url, &sample(url)).await.unwrap();
        let hit = cache.get(url, Duration::from_secs(60)).await.unwrap();

        assert!(hit.from_cache);
        assert_eq!(hit.markdown, sample(url).markdown);
        assert_eq!(hit.title(), Some("Example"));
    }

    #[tokio::test]
    async fn entry_older_than_max_age_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path());
        let url = "https://example.com/old";

        let an_hour_ago = Utc::now() - chrono::Duration::hours(1);
        cache.put_at(url, &sample(url), an_hour_ago).await.unwrap();

        assert!(cache.get(url, Duration::from_secs(60)).await.is_none());
        assert!(cache.get(url, Duration::from_secs(7200)).await.is_some());
    }

    #[tokio::test]
    async fn zero_max_age_never_hits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path());
        let url = "https://example.com/z";
        cache.put(url, &sample(url)).await.unwrap();
        assert!(cache.get(url, Duration::ZERO).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path());
        let url = "https://example.com/broken";

        std::fs::write(cache.record_path(url), b"{ not json").unwrap();
        assert!(cache.get(url, Duration::from_secs(60)).await.is_none());
    }

    #[tokio::test]
    async fn persisted_record_drops_screenshots_and_caps_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path());
        let url = "https://example.com/big";

        let mut result = sample(url);
        result.raw_html = Some("x".repeat(MAX_CACHED_FIELD_CHARS + 10));
        result.screenshot_path = Some("/tmp/shot.png".into());
        result.links = Some(
            (0..MAX_CACHED_LINKS + 25)
                .map(|i| Link {
                    text: format!("link {i}"),
                    url: format!("https://example.com/{i}"),
                })
                .collect(),
        );
        result.json = Some(serde_json::json!({ "blob": "y".repeat(MAX_CACHED_FIELD_CHARS) }));
        cache.put(url, &result).await.unwrap();

        let raw = std::fs::read_to_string(cache.record_path(url)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.get("cachedAt").is_some());
        assert!(value.get("screenshotPath").is_none());
        assert!(value.get("json").is_none());

        let hit = cache.get(url, Duration::from_secs(60)).await.unwrap();
        assert_eq!(hit.raw_html.unwrap().len(), MAX_CACHED_FIELD_CHARS);
        let links = hit.links.unwrap();
        assert_eq!(links.len(), MAX_CACHED_LINKS);
        assert_eq!(links[0].url, "https://example.com/0");
    }

    #[tokio::test]
    async fn small_json_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path());
        let url = "https://example.com/json";

        let mut result = sample(url);
        result.json = Some(serde_json::json!({ "price": 12 }));
        cache.put(url, &result).await.unwrap();

        let hit = cache.get(url, Duration::from_secs(60)).await.unwrap();
        assert_eq!(hit.json, Some(serde_json::json!({ "price": 12 })));
    }

    #[tokio::test]
    async fn last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStore::new(dir.path());
        let url = "https://example.com/lww";

        cache.put(url, &sample(url)).await.unwrap();
        let mut newer = sample(url);
        newer.markdown = Some("newer".into());
        cache.put(url, &newer).await.unwrap();

        let hit = cache.get(url, Duration::from_secs(60)).await.unwrap();
        assert_eq!(hit.markdown.as_deref(), Some("newer"));
    }

    #[test]
    fn keys_are_stable_and_distinct() {
        assert_eq!(CacheStore::key("https://a"), CacheStore::key("https://a"));
        assert_ne!(CacheStore::key("https://a"), CacheStore::key("https://a/"));
        assert_eq!(CacheStore::key("https://a").len(), 64);
    }
}
