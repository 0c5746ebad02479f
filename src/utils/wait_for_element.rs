//! Selector polling for pages that render after load

use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::element::Element;
use tokio::time::Instant;

use crate::browser::BrowserError;

const FIRST_POLL: Duration = Duration::from_millis(100);
const MAX_POLL: Duration = Duration::from_secs(1);

/// Poll for `selector` until it matches or `timeout` runs out
///
/// Client-rendered pages often add elements well after the load event, so
/// one `find_element` right after navigation is not enough. The poll
/// interval doubles from 100ms up to 1s; the last sleep is clipped to the
/// deadline.
pub async fn wait_for_element(
    page: &Page,
    selector: &str,
    timeout: Duration,
) -> Result<Element, BrowserError> {
    let deadline = Instant::now() + timeout;
    let mut interval = FIRST_POLL;

    loop {
        if let Ok(element) = page.find_element(selector).await {
            return Ok(element);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        tokio::time::sleep(interval.min(deadline - now)).await;
        interval = (interval * 2).min(MAX_POLL);
    }
}
