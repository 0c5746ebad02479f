use super::constants::MAX_ERROR_CHARS;

/// Cut `s` to at most `max` characters without splitting a UTF-8 sequence
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Render an error for `ScrapeResult.error`, bounded in length
pub fn bounded_error(err: &dyn std::fmt::Display) -> String {
    truncate_chars(&err.to_string(), MAX_ERROR_CHARS).to_string()
}
