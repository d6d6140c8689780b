use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::ArchiveError;

/// How an uploaded artifact is placed, decided by its original file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Zip,
    TarGz,
    File,
}

impl ArtifactKind {
    /// Case-insensitive suffix match; `.tgz` counts as gzip tar.
    pub fn detect(original_name: &str) -> Self {
        let lower = original_name.to_ascii_lowercase();
        if lower.ends_with(".zip") {
            Self::Zip
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Self::TarGz
        } else {
            Self::File
        }
    }
}

/// An uploaded file staged on disk. Dropping it deletes the staged file
/// unless it was moved into place.
#[derive(Debug)]
pub struct UploadArtifact {
    original_name: String,
    temp_path: PathBuf,
    consumed: bool,
}

impl UploadArtifact {
    pub fn new(original_name: impl Into<String>, temp_path: impl Into<PathBuf>) -> Self {
        Self {
            original_name: original_name.into(),
            temp_path: temp_path.into(),
            consumed: false,
        }
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn kind(&self) -> ArtifactKind {
        ArtifactKind::detect(&self.original_name)
    }

    /// True when the original name is a single plain file name.
    pub fn has_safe_name(&self) -> bool {
        let name = self.original_name.trim();
        !name.is_empty()
            && name != "."
            && !name.contains("..")
            && !name.contains('/')
            && !name.contains('\\')
    }
}

impl Drop for UploadArtifact {
    fn drop(&mut self) {
        if self.consumed {
            return;
        }
        match fs::remove_file(&self.temp_path) {
            Ok(()) => debug!(path = %self.temp_path.display(), "Removed staged upload"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.temp_path.display(), error = %err, "Failed to remove staged upload")
            }
        }
    }
}

/// Move the staged upload to `dest`.
///
/// `dest`'s parent must already exist. A rename is tried first; across
/// filesystems the file is copied next to `dest` and renamed into place.
pub async fn move_file(artifact: UploadArtifact, dest: &Path) -> Result<PathBuf, ArchiveError> {
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || move_file_blocking(artifact, dest))
        .await
        .map_err(|e| ArchiveError::Task(e.to_string()))?
}

fn move_file_blocking(mut artifact: UploadArtifact, dest: PathBuf) -> Result<PathBuf, ArchiveError> {
    let parent_exists = dest.parent().is_some_and(Path::is_dir);
    if !parent_exists {
        return Err(ArchiveError::MissingParent(
            dest.parent().map(Path::to_path_buf).unwrap_or_default(),
        ));
    }

    match fs::rename(&artifact.temp_path, &dest) {
        Ok(()) => {
            artifact.consumed = true;
            Ok(dest)
        }
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            debug!(dest = %dest.display(), "Rename crossed devices, copying");
            copy_into_place(&artifact.temp_path, &dest)?;
            Ok(dest)
        }
        Err(err) => Err(ArchiveError::io("failed to move upload", &dest)(err)),
    }
}

fn copy_into_place(src: &Path, dest: &Path) -> Result<(), ArchiveError> {
    let (tmp, mut file) = create_sibling_temp(dest)?;
    let copied = File::open(src)
        .and_then(|mut source| io::copy(&mut source, &mut file))
        .and_then(|_| file.sync_all());
    drop(file);
    if let Err(err) = copied {
        let _ = fs::remove_file(&tmp);
        return Err(ArchiveError::io("failed to copy upload", &tmp)(err));
    }
    if let Err(err) = fs::rename(&tmp, dest) {
        let _ = fs::remove_file(&tmp);
        return Err(ArchiveError::io("failed to move upload", dest)(err));
    }
    Ok(())
}

/// Create a fresh hidden file next to `dest`. `create_new` makes claiming
/// the name atomic, so an existing file is never reused or truncated.
fn create_sibling_temp(dest: &Path) -> Result<(PathBuf, File), ArchiveError> {
    let parent = dest
        .parent()
        .ok_or_else(|| ArchiveError::MissingParent(dest.to_path_buf()))?;
    let base = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    for attempt in 0u32..1000 {
        let candidate = parent.join(format!(".{}.tmp.{}.{}", base, std::process::id(), attempt));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => return Ok((candidate, file)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(ArchiveError::io("failed to create temporary file", &candidate)(err));
            }
        }
    }

    Err(ArchiveError::io("no free temporary name", dest)(io::Error::from(
        io::ErrorKind::AlreadyExists,
    )))
}
