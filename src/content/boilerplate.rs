use scraper::{ElementRef, Html};

use super::MIN_MAIN_CONTAINER_TEXT_CHARS;

/// Elements removed outright
const NOISE_TAGS: &[&str] = &["nav", "footer", "header", "aside", "noscript", "script", "style"];

/// Case-insensitive substrings that mark an element as page chrome by class or id
const NOISE_MARKERS: &[&str] = &[
    "nav", "footer", "sidebar", "cookie", "banner", "menu", "popup", "modal", "ad-", "advert",
];

fn is_noise(element: &scraper::node::Element) -> bool {
    let name = element.name();
    // page-wide classes such as `has-menu` must not erase the document
    if name == "html" || name == "body" {
        return false;
    }
    if NOISE_TAGS.contains(&name) {
        return true;
    }
    ["class", "id"].iter().any(|attr| {
        element.attr(attr).is_some_and(|value| {
            let value = value.to_ascii_lowercase();
            NOISE_MARKERS.iter().any(|marker| value.contains(marker))
        })
    })
}

fn stripped_text_len(element: ElementRef<'_>) -> usize {
    element.text().map(|t| t.trim().chars().count()).sum()
}

/// First match for each preference, in order: `<main>`, `[role=main]`, `#content`, `.content`
fn main_container(document: &Html) -> Option<ElementRef<'_>> {
    let elements: Vec<ElementRef<'_>> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect();

    let preferences: [&dyn Fn(&ElementRef<'_>) -> bool; 4] = [
        &|el| el.value().name() == "main",
        &|el| el.value().attr("role") == Some("main"),
        &|el| el.value().id() == Some("content"),
        &|el| el.value().classes().any(|c| c == "content"),
    ];

    preferences
        .iter()
        .find_map(|matches| elements.iter().copied().find(|el| matches(el)))
}

/// Remove page chrome and return the main container, or the whole cleaned document
pub fn strip_boilerplate(html: &str) -> String {
    let mut document = Html::parse_document(html);

    let noise: Vec<_> = document
        .tree
        .nodes()
        .filter(|node| node.value().as_element().is_some_and(is_noise))
        .map(|node| node.id())
        .collect();

    for id in noise {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    match main_container(&document) {
        Some(main) if stripped_text_len(main) > MIN_MAIN_CONTAINER_TEXT_CHARS => main.html(),
        _ => document.html(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filler(n: usize) -> String {
        "word ".repeat(n)
    }

    #[test]
    fn removes_denylisted_classes_and_ids() {
        let html = r#"<body><div class="Cookie-Banner">accept cookies</div><div id="main-menu">links</div><p>kept</p></body>"#;
        let out = strip_boilerplate(html);
        assert!(out.contains("kept"));
        assert!(!out.contains("accept cookies"));
        assert!(!out.contains("links"));
    }

    #[test]
    fn body_with_noisy_class_survives() {
        let html = r#"<html class="has-menu"><body class="nav-open"><p>the article</p></body></html>"#;
        assert!(strip_boilerplate(html).contains("the article"));
    }

    #[test]
    fn prefers_main_when_it_has_enough_text() {
        let html = format!(
            r#"<body><div>outside text</div><main>{}</main></body>"#,
            filler(60)
        );
        let out = strip_boilerplate(&html);
        assert!(out.starts_with("<main>"));
        assert!(!out.contains("outside text"));
    }

    #[test]
    fn thin_main_falls_back_to_whole_document() {
        let html = r#"<body><div>outside text</div><main>tiny</main></body>"#;
        let out = strip_boilerplate(html);
        assert!(out.contains("outside text"));
        assert!(out.contains("tiny"));
    }

    #[test]
    fn content_class_matches_whole_token_only() {
        let html = format!(
            r#"<body><div class="content-wrapper">wrapper</div><div class="post content">{}</div></body>"#,
            filler(60)
        );
        let out = strip_boilerplate(&html);
        assert!(out.starts_with(r#"<div class="post content">"#));
    }
}
