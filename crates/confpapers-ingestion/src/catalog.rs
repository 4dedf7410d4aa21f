//! JSON catalog output.

use std::io::Write;
use std::path::Path;

use confpapers_common::{ConfPapersError, Result};
use tempfile::NamedTempFile;
use tracing::info;

use crate::models::PaperRecord;

/// Write `papers` as a pretty-printed UTF-8 JSON array.
///
/// Non-ASCII text is written as-is. The file is replaced atomically, so a
/// failed run never leaves a truncated catalog behind.
pub fn write_catalog(path: &Path, papers: &[PaperRecord]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            parent
        }
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, papers)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| ConfPapersError::Io(e.error))?;

    info!(path = %path.display(), papers = papers.len(), "Catalog written");
    Ok(())
}
