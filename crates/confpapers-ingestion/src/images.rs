//! Representative image download.

use std::io::Write;
use std::path::{Path, PathBuf};

use confpapers_common::{ConfPapersError, FetchClient, Result};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::details::FailurePolicy;
use crate::models::PaperRecord;
use crate::pool::scatter_indexed;

/// Extension used when the image URL path has none.
pub const DEFAULT_IMAGE_EXT: &str = ".jpg";

/// Local filename for a paper's image: `<paper_id><ext>`.
///
/// Path separators in the identifier are replaced so the file always lands
/// directly in the destination directory.
pub fn image_filename(paper_id: &str, image_url: &str) -> String {
    let stem: String = paper_id
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();

    let ext = Url::parse(image_url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segs| segs.next_back().map(str::to_string))
        })
        .and_then(|last| {
            Path::new(&last)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{e}"))
        })
        .unwrap_or_else(|| DEFAULT_IMAGE_EXT.to_string());

    format!("{stem}{ext}")
}

/// Write `bytes` to `path` through a temp file in the same directory.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| ConfPapersError::Io(e.error))?;
    Ok(())
}

/// Counts from one image batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Downloads images for a batch of records into one directory.
#[derive(Debug, Clone)]
pub struct ImageMaterializer {
    client: FetchClient,
    dest_dir: PathBuf,
    concurrency: usize,
    on_failure: FailurePolicy,
}

impl ImageMaterializer {
    pub fn new(
        client: FetchClient,
        dest_dir: impl Into<PathBuf>,
        concurrency: usize,
        on_failure: FailurePolicy,
    ) -> Self {
        Self {
            client,
            dest_dir: dest_dir.into(),
            concurrency,
            on_failure,
        }
    }

    async fn download_one(&self, paper_id: String, image_url: String) -> Result<String> {
        let filename = image_filename(&paper_id, &image_url);
        let bytes = self.client.fetch_bytes(&image_url).await?;
        let path = self.dest_dir.join(&filename);

        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| ConfPapersError::Pipeline(format!("image write task failed: {e}")))??;

        debug!(paper_id = %paper_id, file = %filename, "Image saved");
        Ok(filename)
    }

    /// Download every record's image. `image_file` is set only on success.
    #[instrument(skip_all, fields(dest = %self.dest_dir.display(), batch = papers.len()))]
    pub async fn download_all(&self, papers: &mut [PaperRecord]) -> Result<ImageSummary> {
        tokio::fs::create_dir_all(&self.dest_dir).await?;

        let jobs: Vec<Option<(String, String)>> = papers
            .iter()
            .map(|p| Some((p.paper_id()?.to_string(), p.image_url()?.to_string())))
            .collect();

        let results = scatter_indexed(jobs, self.concurrency, |_, job| async move {
            match job {
                Some((id, url)) => Some(self.download_one(id, url).await),
                None => None,
            }
        })
        .await;

        let mut summary = ImageSummary::default();
        for (paper, result) in papers.iter_mut().zip(results) {
            match result {
                None => summary.skipped += 1,
                Some(Ok(filename)) => {
                    paper.image_file = Some(filename);
                    summary.downloaded += 1;
                }
                Some(Err(e)) if self.on_failure == FailurePolicy::Contain => {
                    warn!(title = %paper.title, error = %e, "Image download failed");
                    summary.errors.push(format!("image for {}: {e}", paper.title));
                    summary.failed += 1;
                }
                Some(Err(e)) => return Err(e),
            }
        }

        info!(
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failed,
            "Image batch complete"
        );
        Ok(summary)
    }
}

/// Convenience wrapper over [`ImageMaterializer::download_all`].
pub async fn download_images(
    client: &FetchClient,
    papers: &mut [PaperRecord],
    dest_dir: &Path,
    concurrency: usize,
    on_failure: FailurePolicy,
) -> Result<ImageSummary> {
    ImageMaterializer::new(client.clone(), dest_dir, concurrency, on_failure)
        .download_all(papers)
        .await
}

/// Images downloaded into a hidden sibling of their final directory.
///
/// Nothing reaches `dest_dir` until [`StagedImages::commit`]; dropping an
/// uncommitted stage deletes the staging directory and everything in it.
#[derive(Debug)]
pub struct StagedImages {
    staging: TempDir,
    dest_dir: PathBuf,
}

impl StagedImages {
    pub fn new(dest_dir: impl Into<PathBuf>) -> Result<Self> {
        let dest_dir = dest_dir.into();
        let parent = match dest_dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;
        let staging = tempfile::Builder::new().prefix(".images-").tempdir_in(&parent)?;
        Ok(Self { staging, dest_dir })
    }

    pub fn staging_dir(&self) -> &Path {
        self.staging.path()
    }

    /// Move every staged file into `dest_dir`, replacing same-named files.
    /// Returns the number of files moved.
    pub fn commit(self) -> Result<usize> {
        std::fs::create_dir_all(&self.dest_dir)?;
        let mut moved = 0;
        for entry in std::fs::read_dir(self.staging.path())? {
            let entry = entry?;
            std::fs::rename(entry.path(), self.dest_dir.join(entry.file_name()))?;
            moved += 1;
        }
        info!(dest = %self.dest_dir.display(), moved, "Images committed");
        Ok(moved)
    }
}
