//! Presentation detail pages: abstract, representative image, affiliations.

use confpapers_common::text::element_text;
use confpapers_common::{FetchClient, Result};
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;

use crate::markup::{has_ancestor_with_class, resolve, FAST_FORWARD_PRESENTER_CLASS};
use crate::models::{PaperDetails, PaperRecord};
use crate::pool::scatter_indexed;

lazy_static! {
    static ref REPRESENTATIVE_IMG: Selector =
        Selector::parse("img.representative-img").expect("valid image selector");
    static ref ABSTRACT: Selector = Selector::parse("span.abstract").expect("valid abstract selector");
    static ref PRESENTER: Selector =
        Selector::parse("div.presenter-details").expect("valid presenter selector");
    static ref INSTITUTION_LINK: Selector =
        Selector::parse("a[data-link-type='presentation.person.institution']")
            .expect("valid institution selector");
}

/// What to do when a per-record fetch exhausts its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep the record with empty defaults and flag it.
    #[default]
    Contain,
    /// Fail the whole run.
    Abort,
}

/// Extract detail fields from a presentation page. Missing markup yields
/// empty values, never an error.
pub fn parse_paper_details(html: &str, base: &Url, fast_forward_class: &str) -> PaperDetails {
    let doc = Html::parse_document(html);

    let image_url = doc
        .select(&REPRESENTATIVE_IMG)
        .next()
        .and_then(|img| img.value().attr("src"))
        .filter(|src| !src.trim().is_empty())
        .and_then(|src| resolve(base, src))
        .map(String::from)
        .unwrap_or_default();

    let description = doc.select(&ABSTRACT).next().map(element_text).unwrap_or_default();

    let affiliations = doc
        .select(&PRESENTER)
        .filter(|p| !has_ancestor_with_class(*p, fast_forward_class))
        .map(|p| p.select(&INSTITUTION_LINK).map(element_text).collect())
        .collect();

    PaperDetails { description, image_url, affiliations }
}

/// Counts from one enrichment batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub enriched: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Fetches detail pages for a batch of records over a bounded pool.
#[derive(Debug, Clone)]
pub struct DetailEnricher {
    client: FetchClient,
    base_url: Url,
    concurrency: usize,
    on_failure: FailurePolicy,
    fast_forward_class: String,
}

impl DetailEnricher {
    pub fn new(
        client: FetchClient,
        base_url: Url,
        concurrency: usize,
        on_failure: FailurePolicy,
        fast_forward_class: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url,
            concurrency,
            on_failure,
            fast_forward_class: fast_forward_class.into(),
        }
    }

    /// Fetch and parse one presentation page.
    pub async fn fetch_details(&self, url: &str) -> Result<PaperDetails> {
        let html = self.client.fetch_text(url).await?;
        Ok(parse_paper_details(&html, &self.base_url, &self.fast_forward_class))
    }

    /// Enrich `papers` in place. Results are joined back by dispatch index.
    #[instrument(skip_all, fields(batch = papers.len()))]
    pub async fn enrich(&self, papers: &mut [PaperRecord]) -> Result<EnrichSummary> {
        let urls: Vec<String> = papers.iter().map(|p| p.url.clone()).collect();
        let results = scatter_indexed(urls, self.concurrency, |_, url| async move {
            self.fetch_details(&url).await
        })
        .await;

        let mut summary = EnrichSummary::default();
        for (paper, result) in papers.iter_mut().zip(results) {
            match result {
                Ok(details) => {
                    paper.apply_details(details);
                    summary.enriched += 1;
                }
                Err(e) if self.on_failure == FailurePolicy::Contain => {
                    warn!(url = %paper.url, title = %paper.title, error = %e, "Detail fetch failed, keeping record with empty fields");
                    summary.errors.push(format!("detail page {}: {e}", paper.url));
                    paper.mark_enrichment_failed(e.to_string());
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(enriched = summary.enriched, failed = summary.failed, "Detail batch complete");
        Ok(summary)
    }
}

/// Enrich `papers` with the default fast-forward filtering.
pub async fn enrich_papers(
    client: &FetchClient,
    papers: &mut [PaperRecord],
    base: &Url,
    concurrency: usize,
    on_failure: FailurePolicy,
) -> Result<EnrichSummary> {
    DetailEnricher::new(client.clone(), base.clone(), concurrency, on_failure, FAST_FORWARD_PRESENTER_CLASS)
        .enrich(papers)
        .await
}
