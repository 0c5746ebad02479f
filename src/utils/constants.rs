//! Shared configuration constants for the scraper
//!
//! Default values and output caps used throughout the codebase so the
//! orchestrator, the cache and the tool renderer agree on the same limits.

/// Chrome user agent string presented by every session
///
/// Update alongside the Chrome stable channel.
///
/// Reference: https://chromiumdash.appspot.com/schedule
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Session viewport
pub const VIEWPORT_WIDTH: u32 = 1280;
pub const VIEWPORT_HEIGHT: u32 = 720;

/// Anchor text is cut to this many characters in `links` output
pub const MAX_LINK_TEXT_CHARS: usize = 100;

/// HTML captured by a snapshot action is cut to this many characters
pub const MAX_SNAPSHOT_HTML_CHARS: usize = 10_000;

/// Upper bound on `ScrapeResult.error`
pub const MAX_ERROR_CHARS: usize = 500;

/// Each string payload is capped at this size before it is written to the cache
pub const MAX_CACHED_FIELD_CHARS: usize = 500_000;

/// Links beyond this count are not written to the cache
pub const MAX_CACHED_LINKS: usize = 5_000;

/// Markdown handed to the structured extractor is cut to this many characters
pub const EXTRACTION_CONTEXT_CHARS: usize = 8_000;

/// Two days, the default staleness accepted from the cache
pub const DEFAULT_MAX_CACHE_AGE_SECS: u64 = 172_800;
