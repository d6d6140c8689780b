use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{debug, warn};

use super::{ArchiveError, UploadArtifact, entry_relative_path};

/// Extract a zip upload into `target_dir`, returning the number of files
/// written.
///
/// An entry whose name escapes `target_dir` aborts the whole extraction.
pub async fn extract_zip(source: UploadArtifact, target_dir: &Path) -> Result<usize, ArchiveError> {
    let target = target_dir.to_path_buf();
    run_blocking(source, move |archive| extract_zip_blocking(archive, &target)).await
}

/// Extract a gzip-compressed tar upload into `target_dir`, returning the
/// number of files written.
///
/// Only directories and regular files are materialized; links and device
/// entries are skipped.
pub async fn extract_tar_gz(
    source: UploadArtifact,
    target_dir: &Path,
) -> Result<usize, ArchiveError> {
    let target = target_dir.to_path_buf();
    run_blocking(source, move |archive| extract_tar_gz_blocking(archive, &target)).await
}

async fn run_blocking<F>(source: UploadArtifact, op: F) -> Result<usize, ArchiveError>
where
    F: FnOnce(&Path) -> Result<usize, ArchiveError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let result = op(source.temp_path());
        drop(source);
        result
    })
    .await
    .map_err(|e| ArchiveError::Task(e.to_string()))?
}

fn extract_zip_blocking(archive_path: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let file =
        File::open(archive_path).map_err(ArchiveError::io("failed to open archive", archive_path))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        let Some(relative) = entry_relative_path(&name)? else {
            continue;
        };
        if entry.enclosed_name().is_none() {
            return Err(ArchiveError::UnsafeEntry(name));
        }
        let outpath = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)
                .map_err(ArchiveError::io("failed to create directory", &outpath))?;
            continue;
        }

        create_parent(&outpath)?;
        let mut outfile =
            File::create(&outpath).map_err(ArchiveError::io("failed to create file", &outpath))?;
        std::io::copy(&mut entry, &mut outfile)
            .map_err(ArchiveError::io("failed to write file", &outpath))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                if let Err(err) =
                    fs::set_permissions(&outpath, fs::Permissions::from_mode(mode & 0o777))
                {
                    warn!(
                        path = %outpath.display(),
                        mode = mode & 0o777,
                        error = %err,
                        "Failed to apply file mode"
                    );
                }
            }
        }

        written += 1;
    }

    debug!(files = written, dest = %dest.display(), "Zip extracted");
    Ok(written)
}

fn extract_tar_gz_blocking(archive_path: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let file =
        File::open(archive_path).map_err(ArchiveError::io("failed to open archive", archive_path))?;
    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    let mut written = 0;

    for entry in archive.entries().map_err(ArchiveError::Tar)? {
        let mut entry = entry.map_err(ArchiveError::Tar)?;
        let name = entry
            .path()
            .map_err(ArchiveError::Tar)?
            .to_string_lossy()
            .into_owned();

        let Some(relative) = entry_relative_path(&name)? else {
            continue;
        };
        let outpath: PathBuf = dest.join(relative);
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            fs::create_dir_all(&outpath)
                .map_err(ArchiveError::io("failed to create directory", &outpath))?;
            continue;
        }
        if !entry_type.is_file() {
            warn!(entry = %name, kind = ?entry_type, "Skipping non-regular tar entry");
            continue;
        }

        create_parent(&outpath)?;
        entry.unpack(&outpath).map_err(ArchiveError::Tar)?;
        written += 1;
    }

    debug!(files = written, dest = %dest.display(), "Tar extracted");
    Ok(written)
}

fn create_parent(path: &Path) -> Result<(), ArchiveError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(ArchiveError::io("failed to create parent directory", parent))?;
    }
    Ok(())
}
