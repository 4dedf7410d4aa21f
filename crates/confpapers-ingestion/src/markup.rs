//! Small DOM helpers over `scraper`.

use scraper::ElementRef;
use tracing::warn;
use url::Url;

/// Markup class wrapping fast-forward preview slots.
pub const FAST_FORWARD_PRESENTER_CLASS: &str = "technical-papers-fast-forward-presenter";

/// True when any ancestor of `el` carries `class`.
pub fn has_ancestor_with_class(el: ElementRef<'_>, class: &str) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|anc| anc.value().classes().any(|c| c == class))
}

/// Resolve a possibly relative reference against the site base.
pub fn resolve(base: &Url, reference: &str) -> Option<Url> {
    match base.join(reference.trim()) {
        Ok(u) => Some(u),
        Err(e) => {
            warn!(reference, error = %e, "Could not resolve URL reference");
            None
        }
    }
}
