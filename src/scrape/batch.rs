//! Concurrent fan-out of one request template over many URLs

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::{ScrapeRequest, ScrapeResult, Scraper};

impl Scraper {
    /// Scrape every URL with the options from `template`
    ///
    /// Returns one result per input URL in input order. URLs run concurrently,
    /// bounded by `batch_concurrency`; a failure or panic in one task only
    /// affects its own slot. Dropping the returned future aborts every
    /// scrape still in flight.
    pub async fn scrape_many(&self, urls: Vec<String>, template: &ScrapeRequest) -> Vec<ScrapeResult> {
        let total = urls.len();
        let concurrency = self.settings().batch_concurrency.max(1);
        let limit = Arc::new(Semaphore::new(concurrency));
        info!("Batch scrape of {} URLs (concurrency {})", total, concurrency);

        let mut join_set = JoinSet::new();
        for (index, url) in urls.iter().enumerate() {
            let scraper = self.clone();
            let limit = limit.clone();
            let request = template.for_url(url.clone());
            join_set.spawn(async move {
                let _permit = limit.acquire_owned().await.ok();
                (index, scraper.scrape(request).await)
            });
        }

        let mut results: Vec<Option<ScrapeResult>> = vec![None; total];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => warn!("Batch scrape task did not complete: {}", e),
            }
        }

        let results: Vec<ScrapeResult> = results
            .into_iter()
            .zip(&urls)
            .map(|(result, url)| {
                result.unwrap_or_else(|| ScrapeResult::failed(url, &"scrape task failed", None))
            })
            .collect();

        let succeeded = results.iter().filter(|r| r.success).count();
        info!("Batch finished: {}/{} succeeded", succeeded, total);
        results
    }
}
