//! Snippet discovery on the schedule landing page.
//!
//! The landing page carries no agenda itself; each day's table is loaded
//! from the URL in a `<div class="post-load" source="...">` marker.

use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::markup::resolve;

lazy_static! {
    static ref POST_LOAD: Selector =
        Selector::parse("div.post-load[source]").expect("valid post-load selector");
}

/// Absolute snippet URLs in document order. No dedup, no reachability check.
pub fn parse_snippet_links(doc: &Html, base: &Url) -> Vec<String> {
    let links: Vec<String> = doc
        .select(&POST_LOAD)
        .filter_map(|div| div.value().attr("source"))
        .filter(|src| !src.trim().is_empty())
        .filter_map(|src| resolve(base, src))
        .map(String::from)
        .collect();

    debug!(count = links.len(), "Snippet links located");
    links
}
