//! confpapers-ingestion: conference schedule scraping pipeline.
//! - Snippet discovery on the schedule landing page
//! - Session and paper row parsing with non-paper filters
//! - Detail page enrichment (abstract, image, affiliations)
//! - Deduplication by presentation identifier
//! - Manual corrections
//! - Image download and JSON catalog output

pub mod catalog;
pub mod dedup;
pub mod details;
pub mod fixes;
pub mod images;
pub mod markup;
pub mod models;
pub mod pipeline;
pub mod pool;
pub mod schedule;
pub mod snippets;

pub use catalog::write_catalog;
pub use details::{enrich_papers, parse_paper_details, DetailEnricher, FailurePolicy};
pub use fixes::{CorrectionTable, PaperCorrection};
pub use images::{download_images, image_filename, ImageMaterializer, StagedImages};
pub use models::{PaperRecord, SessionInfo};
pub use pipeline::{run_scrape, ScrapeJob, ScrapeOutput, ScrapeProgress, ScrapeResult, SnippetFailurePolicy};
pub use schedule::{parse_snippet, ExclusionMatch, ScheduleFilters};
