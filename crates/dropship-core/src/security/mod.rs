//! Path containment checks for caller-supplied locations.

mod path_guard;

pub use path_guard::{PathGuard, is_valid_subdirectory, normalize_path};
