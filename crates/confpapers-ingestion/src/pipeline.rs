//! End-to-end scrape pipeline.
//!
//! Orchestrates one run against a conference schedule site:
//!   1. Fetch the landing page and locate snippet links
//!   2. Fetch each snippet in order and parse paper rows
//!   3. Enrich newly seen records from their detail pages (bounded pool)
//!   4. Deduplicate by `paper_id`, first occurrence wins
//!   5. Apply manual corrections
//!   6. Download representative images into a staging directory if an
//!      images directory is set
//!   7. Emit progress events via broadcast channel
//!
//! Parsed documents are confined to synchronous helpers and never held
//! across an await point.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use confpapers_common::{FetchClient, Result};
use scraper::Html;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use url::Url;

use crate::dedup::{check_duplicate, dedup_by_paper_id, DedupResult};
use crate::details::{DetailEnricher, FailurePolicy};
use crate::fixes::CorrectionTable;
use crate::images::{ImageMaterializer, StagedImages};
use crate::models::PaperRecord;
use crate::pool::DEFAULT_CONCURRENCY;
use crate::schedule::{parse_snippet, ScheduleFilters};
use crate::snippets::parse_snippet_links;

/// Default schedule site.
pub const DEFAULT_BASE_URL: &str = "https://sa2025.conference-schedule.org/";

// ── Job config ────────────────────────────────────────────────────────────────

/// What to do when a schedule snippet cannot be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnippetFailurePolicy {
    /// Fail the run.
    #[default]
    Abort,
    /// Log, record the error and continue with the next snippet.
    Skip,
}

/// Parameters for a single scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    pub base_url: String,
    pub filters: ScheduleFilters,
    pub corrections: CorrectionTable,
    /// Width of the detail and image worker pools.
    pub concurrency: usize,
    /// Pause between consecutive snippet fetches.
    pub snippet_delay: Duration,
    pub snippet_failure: SnippetFailurePolicy,
    pub detail_failure: FailurePolicy,
    pub image_failure: FailurePolicy,
    /// Images are downloaded only when set.
    pub images_dir: Option<PathBuf>,
}

impl Default for ScrapeJob {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            filters: ScheduleFilters::default(),
            corrections: CorrectionTable::builtin(),
            concurrency: DEFAULT_CONCURRENCY,
            snippet_delay: Duration::from_millis(100),
            snippet_failure: SnippetFailurePolicy::Abort,
            detail_failure: FailurePolicy::Contain,
            image_failure: FailurePolicy::Contain,
            images_dir: None,
        }
    }
}

// ── Progress events ───────────────────────────────────────────────────────────

/// Progress event emitted during a run (cloneable for broadcast).
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeProgress {
    pub stage: String,
    pub message: String,
    pub snippets_done: usize,
    pub snippets_total: usize,
    pub papers_found: usize,
}

impl ScrapeProgress {
    fn new(stage: &str, message: &str) -> Self {
        Self {
            stage: stage.to_string(),
            message: message.to_string(),
            snippets_done: 0,
            snippets_total: 0,
            papers_found: 0,
        }
    }
}

// ── Result summary ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeResult {
    pub snippets_found: usize,
    pub snippets_skipped: usize,
    pub papers_parsed: usize,
    pub papers_duplicate: usize,
    pub papers_enriched: usize,
    pub enrichment_failures: usize,
    pub corrections_applied: usize,
    pub images_downloaded: usize,
    pub image_failures: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// Final catalog plus run summary.
#[derive(Debug)]
pub struct ScrapeOutput {
    pub papers: Vec<PaperRecord>,
    pub result: ScrapeResult,
    /// Downloaded images, not yet in `images_dir`. Commit after the catalog
    /// is written; dropping discards them.
    pub staged_images: Option<StagedImages>,
}

// ── Pipeline orchestrator ─────────────────────────────────────────────────────

fn landing_links(html: &str, base: &Url) -> Vec<String> {
    let doc = Html::parse_document(html);
    parse_snippet_links(&doc, base)
}

/// Split off records whose `paper_id` has not been seen yet, marking them
/// seen. Returns the unseen records and the number dropped.
fn take_unseen(batch: Vec<PaperRecord>, seen: &mut HashSet<String>) -> (Vec<PaperRecord>, usize) {
    let mut fresh = Vec::with_capacity(batch.len());
    let mut dropped = 0;
    for paper in batch {
        match check_duplicate(&paper, seen) {
            DedupResult::New => {
                if let Some(id) = paper.paper_id() {
                    seen.insert(id.to_string());
                }
                fresh.push(paper);
            }
            DedupResult::DuplicatePaperId(_) | DedupResult::MissingId => dropped += 1,
        }
    }
    (fresh, dropped)
}

/// Runs the scrape pipeline for one job and returns the deduplicated,
/// enriched and corrected catalog.
///
/// Progress events are sent via `progress_tx` if provided.
#[instrument(skip(client, job, progress_tx), fields(base = %job.base_url))]
pub async fn run_scrape(
    client: &FetchClient,
    job: &ScrapeJob,
    progress_tx: Option<broadcast::Sender<ScrapeProgress>>,
) -> Result<ScrapeOutput> {
    let t0 = std::time::Instant::now();
    let base = Url::parse(&job.base_url)?;
    let mut result = ScrapeResult::default();

    let emit = |stage: &str, msg: &str, mut prog: ScrapeProgress| {
        prog.stage = stage.to_string();
        prog.message = msg.to_string();
        if let Some(ref tx) = progress_tx {
            let _ = tx.send(prog);
        }
    };

    // ── 1. Landing page ───────────────────────────────────────────────────────
    emit("landing", &format!("Fetching {base}"), ScrapeProgress::new("landing", ""));
    let landing = client.fetch_text(base.as_str()).await?;
    let links = landing_links(&landing, &base);
    result.snippets_found = links.len();
    info!(snippets = links.len(), "Snippet links located");

    let mut prog = ScrapeProgress::new("snippets", "");
    prog.snippets_total = links.len();

    // ── 2-3. Snippets, then detail pages for new records ──────────────────────
    let enricher = DetailEnricher::new(
        client.clone(),
        base.clone(),
        job.concurrency,
        job.detail_failure,
        job.filters.fast_forward_class.clone(),
    );
    let mut seen = HashSet::new();
    let mut collected: Vec<PaperRecord> = Vec::new();

    for (i, link) in links.iter().enumerate() {
        if i > 0 && !job.snippet_delay.is_zero() {
            tokio::time::sleep(job.snippet_delay).await;
        }

        let html = match client.fetch_text(link).await {
            Ok(html) => html,
            Err(e) if job.snippet_failure == SnippetFailurePolicy::Skip => {
                let msg = format!("snippet {link} skipped: {e}");
                warn!("{}", &msg);
                result.errors.push(msg);
                result.snippets_skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        let parsed = parse_snippet(&html, &base, &job.filters);
        result.papers_parsed += parsed.len();
        let (mut fresh, dropped) = take_unseen(parsed, &mut seen);
        result.papers_duplicate += dropped;

        if !fresh.is_empty() {
            let summary = enricher.enrich(&mut fresh).await?;
            result.papers_enriched += summary.enriched;
            result.enrichment_failures += summary.failed;
            result.errors.extend(summary.errors);
        }
        collected.extend(fresh);

        prog.snippets_done = i + 1;
        prog.papers_found = collected.len();
        emit("snippets", &format!("Snippet {}/{} parsed", i + 1, links.len()), prog.clone());
    }

    // ── 4. Dedup ──────────────────────────────────────────────────────────────
    let outcome = dedup_by_paper_id(collected);
    result.papers_duplicate += outcome.duplicates + outcome.missing_id;
    let mut papers = outcome.papers;
    info!(papers = papers.len(), duplicates = result.papers_duplicate, "Deduplicated");

    // ── 5. Corrections ────────────────────────────────────────────────────────
    result.corrections_applied = job.corrections.apply(&mut papers);

    // ── 6. Images ─────────────────────────────────────────────────────────────
    let mut staged_images = None;
    if let Some(dir) = &job.images_dir {
        emit("images", &format!("Downloading images for {} papers", papers.len()), {
            let mut p = prog.clone();
            p.papers_found = papers.len();
            p
        });
        let staged = StagedImages::new(dir)?;
        let materializer = ImageMaterializer::new(
            client.clone(),
            staged.staging_dir(),
            job.concurrency,
            job.image_failure,
        );
        let summary = materializer.download_all(&mut papers).await?;
        result.images_downloaded = summary.downloaded;
        result.image_failures = summary.failed;
        result.errors.extend(summary.errors);
        staged_images = Some(staged);
    }

    result.duration_ms = t0.elapsed().as_millis() as u64;
    emit("complete", &format!("{} papers", papers.len()), {
        let mut p = prog.clone();
        p.papers_found = papers.len();
        p
    });
    info!(
        papers = papers.len(),
        enriched = result.papers_enriched,
        failures = result.enrichment_failures,
        duration_ms = result.duration_ms,
        "Scrape complete"
    );

    Ok(ScrapeOutput { papers, result, staged_images })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
