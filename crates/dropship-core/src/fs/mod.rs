//! Filesystem primitives shared across features.

pub mod clear;
pub mod tree_hash;

pub use clear::clear_directory;
pub use tree_hash::content_digest;
