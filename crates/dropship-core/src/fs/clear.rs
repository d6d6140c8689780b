//! Emptying a deployment target before it is repopulated.

use anyhow::Context;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Remove everything inside `dir` except the `preserve` paths (relative to
/// `dir`), then make sure `dir` exists as an empty-or-preserved directory.
///
/// Removal is depth-first and never follows symlinks: a link is removed as
/// a link. A missing `dir` is created. A non-directory at `dir` is replaced.
pub fn clear_directory(dir: &Path, preserve: &[PathBuf]) -> anyhow::Result<()> {
    match fs::symlink_metadata(dir) {
        Ok(meta) if meta.is_dir() => {
            clear_contents(dir, Path::new(""), preserve)?;
        }
        Ok(_) => {
            fs::remove_file(dir)
                .with_context(|| format!("Failed to remove non-directory: {}", dir.display()))?;
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to stat: {}", dir.display()));
        }
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))
}

/// Returns true when something under `dir` was kept.
fn clear_contents(dir: &Path, relative: &Path, preserve: &[PathBuf]) -> anyhow::Result<bool> {
    let mut kept = false;

    for entry in
        fs::read_dir(dir).with_context(|| format!("Failed to read dir: {}", dir.display()))?
    {
        let entry = entry.with_context(|| format!("Failed to read dir entry: {}", dir.display()))?;
        let rel_path = relative.join(entry.file_name());
        if preserve.iter().any(|p| p == &rel_path) {
            kept = true;
            continue;
        }

        let path = entry.path();
        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat entry: {}", path.display()))?;

        if ty.is_dir() {
            if clear_contents(&path, &rel_path, preserve)? {
                kept = true;
            } else {
                fs::remove_dir(&path)
                    .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
            }
        } else {
            remove_entry(&path)?;
        }
    }

    Ok(kept)
}

fn remove_entry(path: &Path) -> anyhow::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        // Directory symlinks on Windows are removed as directories.
        #[cfg(windows)]
        Err(_) if fs::remove_dir(path).is_ok() => Ok(()),
        Err(err) => Err(err).with_context(|| format!("Failed to remove: {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn removes_everything_without_preserve_list() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("site");
        fs::create_dir_all(target.join("a/b")).unwrap();
        fs::write(target.join("a/b/c.txt"), "x").unwrap();
        fs::write(target.join("top.txt"), "x").unwrap();

        clear_directory(&target, &[]).unwrap();

        assert!(target.is_dir());
        assert!(names(&target).is_empty());
    }

    #[test]
    fn missing_target_is_created() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("new/site");
        clear_directory(&target, &[]).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn file_at_target_is_replaced_by_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("site");
        fs::write(&target, "oops").unwrap();
        clear_directory(&target, &[]).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn preserved_paths_survive() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("site");
        fs::create_dir_all(target.join("data/cache")).unwrap();
        fs::write(target.join("data/db.sqlite"), "rows").unwrap();
        fs::write(target.join("data/cache/tmp"), "x").unwrap();
        fs::write(target.join(".env"), "SECRET=1").unwrap();
        fs::write(target.join("index.html"), "old").unwrap();

        let preserve = vec![PathBuf::from(".env"), PathBuf::from("data/db.sqlite")];
        clear_directory(&target, &preserve).unwrap();

        assert_eq!(names(&target), vec![".env".to_string(), "data".to_string()]);
        assert_eq!(names(&target.join("data")), vec!["db.sqlite".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        let dir = TempDir::new().unwrap();
        let outside = dir.path().join("outside");
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("keep.txt"), "keep").unwrap();

        let target = dir.path().join("site");
        fs::create_dir(&target).unwrap();
        std::os::unix::fs::symlink(&outside, target.join("link")).unwrap();

        clear_directory(&target, &[]).unwrap();

        assert!(names(&target).is_empty());
        assert!(outside.join("keep.txt").exists());
    }
}
