//! Batch input boundary: a ZIP archive of resumes.

use std::io::{Cursor, Read};

use thiserror::Error;
use tracing::{debug, info};

use crate::document::SourceDocument;

/// Only entries with this extension are screened; everything else is ignored.
pub const SUPPORTED_EXTENSION: &str = ".pdf";

/// Resource-fork folder macOS adds to archives. Its `._*.pdf` files are not resumes.
const MACOS_METADATA_DIR: &str = "__MACOSX/";

/// Ceilings on decompressed size. ZIP headers declare sizes but nothing makes
/// the compressed stream honour them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLimits {
    pub max_entry_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self {
            max_entry_bytes: 20 * 1024 * 1024,
            max_total_bytes: 200 * 1024 * 1024,
        }
    }
}

/// Failure to open the upload at all. This is batch-fatal: nothing gets processed.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("not a readable ZIP archive: {0}")]
    Unreadable(#[from] zip::result::ZipError),

    #[error("failed to read archive entry '{name}': {message}")]
    Entry { name: String, message: String },
}

/// Reads every supported document from the archive, in archive order.
pub fn read_archive(bytes: &[u8]) -> Result<Vec<SourceDocument>, ArchiveError> {
    read_archive_with_limits(bytes, ArchiveLimits::default())
}

/// Like [`read_archive`], failing as soon as an entry or the running total
/// inflates past `limits`.
pub fn read_archive_with_limits(
    bytes: &[u8],
    limits: ArchiveLimits,
) -> Result<Vec<SourceDocument>, ArchiveError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut documents = Vec::new();
    let mut ignored = 0usize;
    let mut total = 0u64;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| ArchiveError::Entry {
            name: format!("#{index}"),
            message: e.to_string(),
        })?;

        let name = entry.name().to_string();
        if entry.is_dir() || !is_supported_document(&name) {
            ignored += 1;
            continue;
        }

        let remaining = limits.max_total_bytes.saturating_sub(total);
        let budget = limits.max_entry_bytes.min(remaining);
        let mut content = Vec::with_capacity(entry.size().min(budget) as usize);
        entry
            .by_ref()
            .take(budget.saturating_add(1))
            .read_to_end(&mut content)
            .map_err(|e| ArchiveError::Entry {
                name: name.clone(),
                message: e.to_string(),
            })?;

        let size = content.len() as u64;
        if size > budget {
            let message = if limits.max_entry_bytes <= remaining {
                format!("entry exceeds {} bytes uncompressed", limits.max_entry_bytes)
            } else {
                format!("archive exceeds {} bytes uncompressed", limits.max_total_bytes)
            };
            return Err(ArchiveError::Entry { name, message });
        }
        total += size;

        debug!(name = %name, bytes = content.len(), "Read archive entry");
        documents.push(SourceDocument::new(name, content));
    }

    info!(
        documents = documents.len(),
        ignored, "Opened resume archive"
    );
    Ok(documents)
}

/// True for entries the pipeline should look at.
pub fn is_supported_document(name: &str) -> bool {
    !name.starts_with(MACOS_METADATA_DIR)
        && name
            .to_ascii_lowercase()
            .ends_with(SUPPORTED_EXTENSION)
}
