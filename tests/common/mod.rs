//! In-memory browser used by the integration tests
//!
//! Pages are static HTML strings keyed by URL. Scripts are recognized by the
//! APIs they touch, which is enough to answer metadata, status, links and
//! form-state requests without a real browser.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use firescrape::cache::CacheStore;
use firescrape::{BrowserError, BrowserResult, BrowserSession, ScrapeConfig, Scraper, SessionProvider};

#[derive(Debug, Clone)]
pub struct FakePage {
    pub title: String,
    pub body: String,
    pub status: u16,
    pub links: Vec<(String, String)>,
}

impl FakePage {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            status: 200,
            links: Vec::new(),
        }
    }

    pub fn with_links(mut self, links: &[(&str, &str)]) -> Self {
        self.links = links
            .iter()
            .map(|(text, url)| (text.to_string(), url.to_string()))
            .collect();
        self
    }

    /// Value attribute the page ships for input `id`
    fn initial_value(&self, id: &str) -> String {
        let marker = format!("<input id=\"{id}\" value=\"");
        self.body
            .find(&marker)
            .map(|start| &self.body[start + marker.len()..])
            .and_then(|rest| rest.split('"').next())
            .unwrap_or_default()
            .to_string()
    }

    fn has_element(&self, selector: &str) -> bool {
        match selector.strip_prefix('#') {
            Some(id) => self.body.contains(&format!("id=\"{id}\"")),
            None => self.body.contains(&format!("<{selector}")),
        }
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    /// Sessions torn down by `Drop` instead of an explicit close
    pub dropped: AtomicUsize,
}

impl Counters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeProvider {
    pages: HashMap<String, FakePage>,
    pub counters: Arc<Counters>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    async fn open_session(&self) -> BrowserResult<Box<dyn BrowserSession>> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            pages: self.pages.clone(),
            current: Mutex::new(None),
            values: Mutex::new(BTreeMap::new()),
            synced: Mutex::new(BTreeMap::new()),
            counters: self.counters.clone(),
            closed: false,
        }))
    }
}

pub struct FakeSession {
    pages: HashMap<String, FakePage>,
    current: Mutex<Option<(String, FakePage)>>,
    /// Live input values, by element id
    values: Mutex<BTreeMap<String, String>>,
    /// Values mirrored into attributes by the form-state script
    synced: Mutex<BTreeMap<String, String>>,
    counters: Arc<Counters>,
    closed: bool,
}

impl FakeSession {
    fn page(&self) -> BrowserResult<(String, FakePage)> {
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BrowserError::Evaluation("no page loaded".into()))
    }

    fn render(&self, page: &FakePage) -> String {
        let mut body = page.body.clone();
        for (id, value) in self.synced.lock().unwrap().iter() {
            let open = format!("<input id=\"{id}\"");
            if let Some(start) = body.find(&open)
                && let Some(len) = body[start..].find('>')
            {
                body.replace_range(start..=start + len, &format!("{open} value=\"{value}\">"));
            }
        }
        format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            page.title, body
        )
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&self, url: &str, _timeout: Duration) -> BrowserResult<()> {
        let page = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| BrowserError::NavigationFailed(format!("net::ERR_NAME_NOT_RESOLVED at {url}")))?;
        *self.current.lock().unwrap() = Some((url.to_string(), page));
        Ok(())
    }

    async fn wait_for_network_idle(&self, _timeout: Duration) -> BrowserResult<()> {
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        let (_, page) = self.page()?;
        if page.has_element(selector) {
            Ok(())
        } else {
            Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }

    async fn evaluate(&self, expression: &str) -> BrowserResult<Value> {
        let (_, page) = self.page()?;

        if expression.contains("getEntriesByType('navigation')") {
            Ok(json!(page.status))
        } else if expression.contains("querySelectorAll('meta')") {
            Ok(json!({
                "title": page.title,
                "description": "",
                "language": "en",
                "ogTitle": "",
                "ogImage": "",
            }))
        } else if expression.contains("a[href]") {
            Ok(Value::Array(
                page.links
                    .iter()
                    .map(|(text, url)| json!({ "text": text, "url": url }))
                    .collect(),
            ))
        } else if expression.contains("dispatchEvent(new Event('input'") {
            let Some(id) = queried_id(expression) else {
                return Ok(json!(false));
            };
            if !page.has_element(&format!("#{id}")) {
                return Ok(json!(false));
            }
            self.values.lock().unwrap().insert(id, String::new());
            Ok(json!(true))
        } else if expression.contains("setAttribute('value'") {
            let values = self.values.lock().unwrap().clone();
            *self.synced.lock().unwrap() = values;
            Ok(json!(true))
        } else {
            Ok(Value::Null)
        }
    }

    async fn content(&self) -> BrowserResult<String> {
        let (_, page) = self.page()?;
        Ok(self.render(&page))
    }

    async fn current_url(&self) -> BrowserResult<String> {
        Ok(self.page()?.0)
    }

    async fn click(&self, selector: &str, timeout: Duration) -> BrowserResult<()> {
        self.wait_for_selector(selector, timeout).await
    }

    async fn fill(&self, selector: &str, text: &str) -> BrowserResult<()> {
        let (_, page) = self.page()?;
        if !page.has_element(selector) {
            return Err(BrowserError::ElementNotFound {
                selector: selector.to_string(),
                timeout_ms: 0,
            });
        }
        let id = selector.trim_start_matches('#').to_string();
        let mut values = self.values.lock().unwrap();
        let current = values.entry(id.clone()).or_insert_with(|| page.initial_value(&id));
        current.push_str(text);
        Ok(())
    }

    async fn type_text(&self, _text: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn press(&self, _key: &str) -> BrowserResult<()> {
        Ok(())
    }

    async fn screenshot(&self, _full_page: bool) -> BrowserResult<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn close(&mut self) -> BrowserResult<()> {
        if !self.closed {
            self.closed = true;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Element id from the first `querySelector("#id")` in a script
fn queried_id(expression: &str) -> Option<String> {
    let rest = &expression[expression.find("querySelector(")? + "querySelector(".len()..];
    let selector = serde_json::Deserializer::from_str(rest)
        .into_iter::<String>()
        .next()?
        .ok()?;
    selector.strip_prefix('#').map(str::to_string)
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub const ARTICLE_URL: &str = "https://example.com/article";
pub const FORM_URL: &str = "https://example.com/form";
pub const HELLO_URL: &str = "https://example.com/hello";
pub const PREFILLED_URL: &str = "https://example.com/prefilled";

pub fn sample_provider() -> FakeProvider {
    FakeProvider::new()
        .with_page(
            ARTICLE_URL,
            FakePage::new(
                "Ownership Guide",
                "<nav>NAVIGATION-ONLY-TEXT</nav>\
                 <main><h1>Ownership Guide</h1>\
                 <p>Rust manages memory through ownership, a set of rules the compiler checks. \
                 There is no garbage collector, and no manual allocation either. \
                 Every value has a single owner and is dropped when the owner goes out of scope.</p></main>\
                 <footer>FOOTER-ONLY-TEXT</footer>",
            )
            .with_links(&[
                ("Docs", "https://example.com/docs"),
                ("Mail", "mailto:team@example.com"),
            ]),
        )
        .with_page(
            FORM_URL,
            FakePage::new("Search", "<form><input id=\"q\"><button id=\"go\">Go</button></form>"),
        )
        .with_page(HELLO_URL, FakePage::new("Hello Page", "<p>Just one short paragraph.</p>"))
        .with_page(
            PREFILLED_URL,
            FakePage::new("Search", "<form><input id=\"q\" value=\"default\"></form>"),
        )
}

/// Scraper over `provider` with its cache in `cache_dir`
pub fn scraper(provider: FakeProvider, cache_dir: &std::path::Path) -> (Scraper, Arc<Counters>) {
    let counters = provider.counters.clone();
    let scraper = Scraper::new(
        Arc::new(provider),
        CacheStore::new(cache_dir),
        ScrapeConfig::default(),
    );
    (scraper, counters)
}
