//! Cross-snippet deduplication of paper records.
//!
//! The schedule lists every presentation once per displayed time zone, so the
//! same `paper_id` turns up in several snippets. Duplicates are assumed to be
//! identical apart from the display time zone: the first record seen wins and
//! later ones are dropped without any field merge.

use std::collections::HashSet;

use crate::models::PaperRecord;

/// Result of a deduplication check.
#[derive(Debug, PartialEq, Eq)]
pub enum DedupResult {
    /// First time this identifier is seen.
    New,
    /// Identifier already kept earlier.
    DuplicatePaperId(String),
    /// Record has no identifier and cannot be keyed.
    MissingId,
}

/// Classify `incoming` against the identifiers kept so far.
pub fn check_duplicate(incoming: &PaperRecord, seen: &HashSet<String>) -> DedupResult {
    match incoming.paper_id() {
        None => DedupResult::MissingId,
        Some(id) if seen.contains(id) => DedupResult::DuplicatePaperId(id.to_string()),
        Some(_) => DedupResult::New,
    }
}

/// Kept records plus drop counts.
#[derive(Debug, Default)]
pub struct DedupOutcome {
    pub papers: Vec<PaperRecord>,
    pub duplicates: usize,
    pub missing_id: usize,
}

/// Keep the first record per `paper_id`, preserving encounter order.
pub fn dedup_by_paper_id(papers: Vec<PaperRecord>) -> DedupOutcome {
    let mut seen = HashSet::with_capacity(papers.len());
    let mut outcome = DedupOutcome::default();

    for paper in papers {
        match check_duplicate(&paper, &seen) {
            DedupResult::New => {
                if let Some(id) = paper.paper_id() {
                    seen.insert(id.to_string());
                }
                outcome.papers.push(paper);
            }
            DedupResult::DuplicatePaperId(_) => outcome.duplicates += 1,
            DedupResult::MissingId => outcome.missing_id += 1,
        }
    }

    outcome
}
