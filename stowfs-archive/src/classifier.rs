//! Child/descendant classification of normalized paths.
//!
//! Archives have no directory table, so hierarchy is recovered entirely from string prefixes.
//! Both functions accept folder paths with or without a trailing separator and treat the
//! empty string as the root.

use stowfs_core::path::{normalize_ending, trim_ending, SEPARATOR};

/// Returns true when `candidate` is a direct child of `folder`.
///
/// An item is never its own child, and a path two or more levels down is not a direct child.
pub fn is_child(candidate: &str, folder: &str) -> bool {
    let folder = normalize_ending(folder);
    let candidate = trim_ending(candidate);
    if candidate.len() <= folder.len() || !candidate.starts_with(folder.as_str()) {
        return false;
    }
    !candidate[folder.len()..].contains(SEPARATOR)
}

/// Returns true when `candidate` lies anywhere below `folder`.
pub fn is_descendant(candidate: &str, folder: &str) -> bool {
    let folder = normalize_ending(folder);
    let candidate = trim_ending(candidate);
    candidate.len() > folder.len() && candidate.starts_with(folder.as_str())
}
