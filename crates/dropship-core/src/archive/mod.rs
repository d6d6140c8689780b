//! Artifact placement: archive extraction and single-file moves.
//!
//! Every operation consumes an [`UploadArtifact`]; the uploaded temp file is
//! gone once the operation returns, whether it succeeded or not.

mod extractor;
mod upload;

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

pub use extractor::{extract_tar_gz, extract_zip};
pub use upload::{ArtifactKind, UploadArtifact, move_file};

use crate::security::is_valid_subdirectory;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to read zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to read tar archive: {0}")]
    Tar(#[source] std::io::Error),

    /// Entry name escapes the destination; nothing after it is written
    #[error("unsafe archive entry: {0}")]
    UnsafeEntry(String),

    #[error("destination parent does not exist: {}", .0.display())]
    MissingParent(PathBuf),

    #[error("{context}: {}", .path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("placement task failed: {0}")]
    Task(String),
}

impl ArchiveError {
    pub(crate) fn io(context: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.to_path_buf();
        move |source| Self::Io {
            context,
            path,
            source,
        }
    }
}

/// Destination-relative path for an archive entry name.
///
/// Returns `None` for entries that name the destination itself (`./`).
pub(crate) fn entry_relative_path(name: &str) -> Result<Option<PathBuf>, ArchiveError> {
    let trimmed = name.trim_start_matches("./");
    if trimmed.is_empty() {
        return Ok(None);
    }
    if !is_valid_subdirectory(trimmed) || trimmed.contains('\\') {
        return Err(ArchiveError::UnsafeEntry(name.to_string()));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return Err(ArchiveError::UnsafeEntry(name.to_string())),
        }
    }

    Ok((!relative.as_os_str().is_empty()).then_some(relative))
}
