//! Data models for the scrape pipeline.

use serde::{Deserialize, Serialize};

/// Session header metadata, keyed by session identifier within one snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub title: String,
    pub location: String,
}

/// Outcome of the detail-page fetch for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EnrichmentStatus {
    #[default]
    Pending,
    Enriched,
    /// Detail page could not be fetched; fields hold empty defaults.
    Failed(String),
}

/// One technical-paper presentation. Serialized field order is the
/// catalog's field order; absent optionals are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaperRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub title: String,
    pub url: String,
    /// Presentation order; positional key into `affiliations`.
    pub authors: Vec<String>,
    pub session: String,
    pub location: String,
    pub start: String,
    pub end: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliations: Option<Vec<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_file: Option<String>,
    #[serde(skip)]
    pub enrichment: EnrichmentStatus,
}

impl PaperRecord {
    /// Merge the detail-page fields into this record.
    pub fn apply_details(&mut self, details: PaperDetails) {
        self.description = Some(details.description);
        self.image_url = Some(details.image_url);
        if !details.affiliations.is_empty() {
            self.affiliations = Some(details.affiliations);
        }
        self.enrichment = EnrichmentStatus::Enriched;
    }

    /// Empty defaults after a contained detail-page failure.
    pub fn mark_enrichment_failed(&mut self, reason: impl Into<String>) {
        self.description = Some(String::new());
        self.image_url = Some(String::new());
        self.enrichment = EnrichmentStatus::Failed(reason.into());
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn paper_id(&self) -> Option<&str> {
        self.paper_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Fields scraped from a presentation's own page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperDetails {
    pub description: String,
    pub image_url: String,
    /// One institution list per presenter, in presenter order.
    pub affiliations: Vec<Vec<String>>,
}
