//! Text helpers shared by every extractor.

use scraper::ElementRef;

/// Collapse every whitespace run (including non-breaking spaces) into a
/// single ASCII space and trim both ends.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Concatenated text content of an element, whitespace-normalized.
pub fn element_text(el: ElementRef<'_>) -> String {
    let raw: String = el.text().collect();
    normalize_ws(&raw)
}
