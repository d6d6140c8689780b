//! Lexical sandboxing of deployment targets.
//!
//! All checks work on normalized paths without touching the filesystem, so
//! a target that does not exist yet can still be authorized.

use std::path::{Component, Path, PathBuf};

/// Reject subpaths that contain `..` anywhere or start with `/`.
///
/// The empty string is accepted; it addresses the base directory itself.
pub fn is_valid_subdirectory(subpath: &str) -> bool {
    !(subpath.contains("..") || subpath.starts_with('/'))
}

/// Collapse `.` and `..` components without resolving symlinks.
///
/// `..` never climbs above a root or prefix component.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else if components.is_empty() {
                    components.push(component);
                } else if matches!(components.last(), Some(Component::ParentDir)) {
                    components.push(component);
                }
            }
            Component::CurDir => {}
            c => components.push(c),
        }
    }

    components.iter().collect()
}

/// Decides whether a target under the base directory falls inside one of
/// an identity's authorized roots.
#[derive(Debug, Clone)]
pub struct PathGuard {
    base: PathBuf,
}

impl PathGuard {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: normalize_path(base.as_ref()),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Normalized absolute-or-base-relative location of `subpath`.
    pub fn resolve_target(&self, subpath: &str) -> PathBuf {
        normalize_path(&self.base.join(subpath))
    }

    /// True when the resolved target lies inside the base directory and
    /// inside at least one root.
    ///
    /// An empty root, or one resolving outside the base, grants nothing. A
    /// root of `.` resolves to the base and covers every target under it.
    /// Containment is component-wise, so `alice` does not cover `alice2`.
    pub fn is_authorized<S: AsRef<str>>(&self, subpath: &str, roots: &[S]) -> bool {
        let target = self.resolve_target(subpath);
        if !target.starts_with(&self.base) {
            return false;
        }

        roots.iter().any(|root| {
            let root = root.as_ref().trim();
            if root.is_empty() {
                return false;
            }
            let root_path = normalize_path(&self.base.join(root));
            root_path.starts_with(&self.base) && target.starts_with(&root_path)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // is_valid_subdirectory Tests
    // =========================================================================

    #[test]
    fn accepts_plain_and_empty_subpaths() {
        assert!(is_valid_subdirectory(""));
        assert!(is_valid_subdirectory("alice"));
        assert!(is_valid_subdirectory("alice/site/v2"));
    }

    #[test]
    fn rejects_parent_segments_anywhere() {
        assert!(!is_valid_subdirectory(".."));
        assert!(!is_valid_subdirectory("alice/../bob"));
        assert!(!is_valid_subdirectory("a..b"));
    }

    #[test]
    fn rejects_absolute_subpaths() {
        assert!(!is_valid_subdirectory("/etc"));
    }

    // =========================================================================
    // normalize_path Tests
    // =========================================================================

    #[test]
    fn normalize_collapses_dot_and_dotdot() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    }

    #[test]
    fn normalize_does_not_climb_above_root() {
        assert_eq!(normalize_path(Path::new("/../../etc")), PathBuf::from("/etc"));
    }

    #[test]
    fn normalize_keeps_leading_parents_of_relative_paths() {
        assert_eq!(normalize_path(Path::new("../x/./y")), PathBuf::from("../x/y"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    // =========================================================================
    // PathGuard Tests
    // =========================================================================

    #[test]
    fn target_inside_root_is_authorized() {
        let guard = PathGuard::new("/srv/uploads");
        assert!(guard.is_authorized("alice/site", &["alice"]));
        assert!(guard.is_authorized("alice", &["alice"]));
    }

    #[test]
    fn sibling_with_shared_prefix_is_rejected() {
        let guard = PathGuard::new("/srv/uploads");
        assert!(!guard.is_authorized("alice2", &["alice"]));
    }

    #[test]
    fn empty_root_grants_nothing() {
        let guard = PathGuard::new("/srv/uploads");
        assert!(!guard.is_authorized("anything", &[""]));
        assert!(!guard.is_authorized("anything", &["  "]));
        assert!(!guard.is_authorized("", &["alice"]));
    }

    #[test]
    fn dot_root_covers_whole_base() {
        let guard = PathGuard::new("/srv/uploads");
        assert!(guard.is_authorized("team/site", &["."]));
        assert!(guard.is_authorized("", &["."]));
        assert!(guard.is_authorized("team", &["/srv/uploads"]));
    }

    #[test]
    fn roots_escaping_base_grant_nothing() {
        let guard = PathGuard::new("/srv/uploads");
        assert!(!guard.is_authorized("x", &["../other"]));
        assert!(!guard.is_authorized("x", &["/etc"]));
    }

    #[test]
    fn absolute_root_inside_base_is_honored() {
        let guard = PathGuard::new("/srv/uploads");
        assert!(guard.is_authorized("team/app", &["/srv/uploads/team"]));
    }

    #[test]
    fn traversal_in_subpath_cannot_escape() {
        let guard = PathGuard::new("/srv/uploads");
        assert!(!guard.is_authorized("alice/../../etc", &["alice"]));
        assert!(!guard.is_authorized("alice/../bob", &["alice"]));
    }

    #[test]
    fn any_matching_root_suffices() {
        let guard = PathGuard::new("/srv/uploads");
        assert!(guard.is_authorized("shared/docs", &["alice", "shared"]));
    }

    #[test]
    fn resolve_target_is_normalized() {
        let guard = PathGuard::new("/srv/uploads/");
        assert_eq!(
            guard.resolve_target("./alice/site/"),
            PathBuf::from("/srv/uploads/alice/site")
        );
    }
}
