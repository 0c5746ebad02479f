//! Scripts evaluated inside the page

/// Title, description, language and OpenGraph tags
///
/// Description falls back to `og:description`, language to `<html lang>`
/// and finally to `en`.
pub(super) const METADATA_SCRIPT: &str = r#"(() => {
    const metas = {};
    document.querySelectorAll('meta').forEach((el) => {
        const name = el.getAttribute('name') || el.getAttribute('property') || '';
        const content = el.getAttribute('content') || '';
        if (name && content) metas[name] = content;
    });
    return {
        title: document.title || '',
        description: metas['description'] || metas['og:description'] || '',
        language: metas['language'] || document.documentElement.lang || 'en',
        ogTitle: metas['og:title'] || '',
        ogImage: metas['og:image'] || '',
    };
})()"#;

/// HTTP status of the top-level navigation, null when unavailable
pub(super) const STATUS_CODE_SCRIPT: &str = r#"(() => {
    const entry = performance.getEntriesByType('navigation')[0];
    return entry && entry.responseStatus ? entry.responseStatus : null;
})()"#;

/// Every anchor with an href, resolved to an absolute URL by the browser
pub(super) const LINKS_SCRIPT: &str = r#"[...document.querySelectorAll('a[href]')].map((a) => ({
    text: (a.textContent || '').trim(),
    url: a.href,
}))"#;

/// Mirror live form state into attributes so serialized HTML shows typed values
pub(crate) const SYNC_FORM_STATE_SCRIPT: &str = r#"(() => {
    document.querySelectorAll('input, textarea, select').forEach((el) => {
        if (el.tagName === 'TEXTAREA') {
            el.textContent = el.value;
        } else if (el.type === 'checkbox' || el.type === 'radio') {
            if (el.checked) el.setAttribute('checked', ''); else el.removeAttribute('checked');
        } else if (el.tagName !== 'SELECT') {
            el.setAttribute('value', el.value);
        }
    });
    return true;
})()"#;

/// Empty the field matching `selector` so typing replaces its value
///
/// Evaluates to false when nothing matches.
pub(crate) fn clear_field_script(selector: &str) -> String {
    let selector = serde_json::Value::String(selector.to_string());
    format!(
        r#"(() => {{
    const el = document.querySelector({selector});
    if (!el) return false;
    if ('value' in el) el.value = ''; else el.textContent = '';
    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
    return true;
}})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_script_quotes_the_selector() {
        let script = clear_field_script(r#"input[name="q"]"#);
        assert!(script.contains(r#"document.querySelector("input[name=\"q\"]")"#), "{script}");
    }
}
