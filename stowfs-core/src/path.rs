//! Path and identity scheme.
//!
//! Item ids are slash-delimited strings relative to a tree root. Folder ids end with exactly
//! one [`SEPARATOR`], file ids never do, and the root folder's id is the empty string. Every
//! function here is pure and total.

use crate::types::ItemKind;

/// The only path separator stored in ids.
pub const SEPARATOR: char = '/';

/// Appends a single separator unless `path` is empty or already ends with one.
pub fn normalize_ending(path: &str) -> String {
    if path.is_empty() || path.ends_with(SEPARATOR) {
        path.to_string()
    } else {
        let mut normalized = String::with_capacity(path.len() + 1);
        normalized.push_str(path);
        normalized.push(SEPARATOR);
        normalized
    }
}

/// Inverse of [`normalize_ending`]: strips every trailing separator.
pub fn trim_ending(path: &str) -> &str {
    path.trim_end_matches(SEPARATOR)
}

/// Normalizes an id to the form required by `kind`.
pub fn normalize_for(path: &str, kind: ItemKind) -> String {
    match kind {
        ItemKind::Folder => normalize_ending(path),
        ItemKind::File => trim_ending(path).to_string(),
    }
}

/// Rewrites backslashes to the canonical separator.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Splits on the separator and drops empty segments.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty()).collect()
}

/// Builds a child id as `parent_id + name`, plus the separator for folders.
pub fn join_child(parent_id: &str, name: &str, kind: ItemKind) -> String {
    let parent = normalize_ending(parent_id);
    let name = trim_ending(name);
    normalize_for(&format!("{}{}", parent, name), kind)
}

/// Last segment of an id, ignoring a trailing separator.
pub fn last_segment(id: &str) -> &str {
    let trimmed = trim_ending(id);
    match trimmed.rfind(SEPARATOR) {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    }
}

/// Folder id containing `id`, or `None` for the root.
///
/// # Example
/// `"a/b/c"` and `"a/b/c/"` both yield `"a/b/"`; `"a"` yields `""`.
pub fn parent_id(id: &str) -> Option<&str> {
    let trimmed = trim_ending(id);
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind(SEPARATOR) {
        Some(index) => Some(&trimmed[..=index]),
        None => Some(""),
    }
}

/// Heuristic used by folder-only traversal: a segment containing a `.` that does not end
/// with one is treated as a file name.
pub fn looks_like_file(segment: &str) -> bool {
    segment.contains('.') && !segment.ends_with('.')
}
