//! Deterministic content digest of a deployed tree.
//!
//! Two deployments of the same artifact into the same target yield the same
//! digest, which makes redeploys comparable.

use anyhow::Context;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const DIR_MARKER: u8 = 0xFF;
const FILE_MARKER: u8 = 0x00;
const LINK_MARKER: u8 = 0x01;

/// blake3 digest of `root`, hex encoded.
///
/// Entries are visited in name order. Files contribute
/// `path || 0x00 || len || content`, directories `path || 0xFF`, and
/// symlinks `path || 0x01 || link target` without being followed. Any path
/// listed in `skip` (relative to `root`) is left out together with its
/// contents.
pub fn content_digest(root: &Path, skip: &[PathBuf]) -> anyhow::Result<String> {
    let mut hasher = blake3::Hasher::new();
    digest_dir(&mut hasher, root, Path::new(""), skip)?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn digest_dir(
    hasher: &mut blake3::Hasher,
    dir: &Path,
    relative: &Path,
    skip: &[PathBuf],
) -> anyhow::Result<()> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let rel_path = relative.join(entry.file_name());
        if skip.iter().any(|s| s == &rel_path) {
            continue;
        }
        let key = rel_path.to_string_lossy().replace('\\', "/");
        let path = entry.path();
        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat entry: {}", path.display()))?;

        hasher.update(key.as_bytes());
        if ty.is_dir() {
            hasher.update(&[DIR_MARKER]);
            digest_dir(hasher, &path, &rel_path, skip)?;
        } else if ty.is_symlink() {
            let target = fs::read_link(&path)
                .with_context(|| format!("Failed to read link: {}", path.display()))?;
            hasher.update(&[LINK_MARKER]);
            hasher.update(target.to_string_lossy().as_bytes());
        } else {
            let mut file = File::open(&path)
                .with_context(|| format!("Failed to open file: {}", path.display()))?;
            let len = file.metadata().map(|m| m.len()).unwrap_or_default();
            hasher.update(&[FILE_MARKER]);
            hasher.update(&len.to_le_bytes());
            std::io::copy(&mut file, hasher)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
        }
    }

    Ok(())
}
