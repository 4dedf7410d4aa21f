//! Configuration loading for confpapers.
//! Reads confpapers.toml from the current directory or the path in CONFPAPERS_CONFIG.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use confpapers_common::RetryPolicy;
use confpapers_ingestion::pipeline::{ScrapeJob, SnippetFailurePolicy, DEFAULT_BASE_URL};
use confpapers_ingestion::{CorrectionTable, ExclusionMatch, FailurePolicy, PaperCorrection, ScheduleFilters};

pub const CONFIG_ENV: &str = "CONFPAPERS_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "confpapers.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Replaces the built-in correction table when non-empty.
    #[serde(default)]
    pub corrections: Vec<PaperCorrection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url()   -> String { DEFAULT_BASE_URL.to_string() }
fn default_user_agent() -> String { format!("confpapers/{}", env!("CARGO_PKG_VERSION")) }

impl Default for SiteConfig {
    fn default() -> Self {
        Self { base_url: default_base_url(), user_agent: default_user_agent() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_min_ms")]
    pub backoff_min_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_snippet_delay_ms")]
    pub snippet_delay_ms: u64,
}

fn default_timeout_secs()     -> u64   { 10 }
fn default_max_attempts()     -> u32   { 4 }
fn default_backoff_min_ms()   -> u64   { 1_000 }
fn default_backoff_max_ms()   -> u64   { 4_000 }
fn default_concurrency()      -> usize { 8 }
fn default_snippet_delay_ms() -> u64   { 100 }

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_min_ms: default_backoff_min_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            concurrency: default_concurrency(),
            snippet_delay_ms: default_snippet_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    #[serde(default = "default_session_type_keyword")]
    pub session_type_keyword: String,
    #[serde(default = "default_excluded_session_titles")]
    pub excluded_session_titles: Vec<String>,
    #[serde(default)]
    pub exclusion_match: ExclusionMatch,
    #[serde(default = "default_excluded_paper_titles")]
    pub excluded_paper_titles: Vec<String>,
    /// Empty string disables the misc-item filter.
    #[serde(default = "default_misc_id_prefix")]
    pub misc_id_prefix: String,
}

fn default_session_type_keyword() -> String {
    ScheduleFilters::default().session_type_keyword
}
fn default_excluded_session_titles() -> Vec<String> {
    ScheduleFilters::default().excluded_session_titles
}
fn default_excluded_paper_titles() -> Vec<String> {
    ScheduleFilters::default().excluded_paper_titles
}
fn default_misc_id_prefix() -> String { "misc_".to_string() }

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            session_type_keyword: default_session_type_keyword(),
            excluded_session_titles: default_excluded_session_titles(),
            exclusion_match: ExclusionMatch::default(),
            excluded_paper_titles: default_excluded_paper_titles(),
            misc_id_prefix: default_misc_id_prefix(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub snippet_failure: SnippetFailurePolicy,
    #[serde(default)]
    pub detail_failure: FailurePolicy,
    #[serde(default)]
    pub image_failure: FailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: String,
    #[serde(default = "default_images_dir")]
    pub images_dir: Option<String>,
    #[serde(default = "bool_true")]
    pub download_images: bool,
}

fn default_output_path() -> String         { "dist/papers.json".to_string() }
fn default_images_dir()  -> Option<String> { Some("dist/images".to_string()) }
fn bool_true()           -> bool           { true }

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            images_dir: default_images_dir(),
            download_images: bool_true(),
        }
    }
}

#[cfg(test)]
mod tests;

impl Config {
    /// Load configuration from confpapers.toml.
    ///
    /// An explicit `path` must exist. Otherwise CONFPAPERS_CONFIG is checked,
    /// then the current directory; if neither file exists the built-in
    /// defaults are used.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Self::from_file(path);
        }

        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        if !path.exists() {
            tracing::warn!(
                "Config file {} not found, using defaults. \
                 Copy confpapers.example.toml to confpapers.toml to customise.",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {e}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.http.backoff_min_ms > self.http.backoff_max_ms {
            anyhow::bail!(
                "http.backoff_min_ms ({}) exceeds http.backoff_max_ms ({})",
                self.http.backoff_min_ms,
                self.http.backoff_max_ms
            );
        }
        for fix in &self.corrections {
            if fix.affiliations.len() != fix.authors.len() {
                anyhow::bail!(
                    "correction for {:?} has {} authors but {} affiliation lists",
                    fix.title,
                    fix.authors.len(),
                    fix.affiliations.len()
                );
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.http.max_attempts,
            backoff_min: Duration::from_millis(self.http.backoff_min_ms),
            backoff_max: Duration::from_millis(self.http.backoff_max_ms),
        }
    }

    pub fn schedule_filters(&self) -> ScheduleFilters {
        let f = &self.filters;
        ScheduleFilters {
            session_type_keyword: f.session_type_keyword.clone(),
            excluded_session_titles: f.excluded_session_titles.clone(),
            exclusion_match: f.exclusion_match,
            excluded_paper_titles: f.excluded_paper_titles.clone(),
            misc_id_prefix: Some(f.misc_id_prefix.clone()).filter(|p| !p.is_empty()),
            ..ScheduleFilters::default()
        }
    }

    pub fn correction_table(&self) -> CorrectionTable {
        if self.corrections.is_empty() {
            CorrectionTable::builtin()
        } else {
            CorrectionTable::new(self.corrections.clone())
        }
    }

    /// Images directory, or `None` when downloads are disabled.
    pub fn images_dir(&self) -> Option<PathBuf> {
        if !self.output.download_images {
            return None;
        }
        self.output.images_dir.as_ref().map(PathBuf::from)
    }

    pub fn to_job(&self) -> ScrapeJob {
        ScrapeJob {
            base_url: self.site.base_url.clone(),
            filters: self.schedule_filters(),
            corrections: self.correction_table(),
            concurrency: self.http.concurrency.max(1),
            snippet_delay: Duration::from_millis(self.http.snippet_delay_ms),
            snippet_failure: self.policy.snippet_failure,
            detail_failure: self.policy.detail_failure,
            image_failure: self.policy.image_failure,
            images_dir: self.images_dir(),
        }
    }
}
