//! Virtual folder materialization.
//!
//! A folder's direct children are derived from the archive's flat entry list one level at a
//! time. An entry that continues past the next separator implies a virtual folder; a direct
//! child entry that no other entry extends is a file. Deeper folders are discovered when the
//! consumer descends into the folder above them.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use stowfs_core::path::{normalize_ending, SEPARATOR};

use crate::classifier::{is_child, is_descendant};
use crate::codec::ArchiveEntry;
use crate::folder::ArchiveFolder;

/// Normalized paths of the virtual folders directly below `folder_path`, in first-seen order.
pub fn child_folder_paths(folder_path: &str, entries: &[ArchiveEntry]) -> Vec<String> {
    let folder = normalize_ending(folder_path);
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for entry in entries {
        let path = normalize_ending(&entry.full_path);
        if !is_descendant(&path, &folder) {
            continue;
        }
        let rest = &path[folder.len()..];
        let boundary = match rest.find(SEPARATOR) {
            Some(index) => folder.len() + index + 1,
            None => continue,
        };
        // Only entries reaching past the boundary imply a folder there.
        if boundary == path.len() {
            continue;
        }
        let candidate = &path[..boundary];
        if is_child(candidate, &folder) && seen.insert(candidate.to_string()) {
            paths.push(candidate.to_string());
        }
    }
    paths
}

/// Entries that are files directly inside `folder_path`.
///
/// A direct child entry that another entry extends marks a folder, not a file.
pub fn child_file_entries<'a>(
    folder_path: &str,
    entries: &'a [ArchiveEntry],
) -> Vec<&'a ArchiveEntry> {
    let folders: HashSet<String> = child_folder_paths(folder_path, entries).into_iter().collect();
    entries
        .iter()
        .filter(|entry| is_child(&entry.full_path, folder_path))
        .filter(|entry| !folders.contains(&normalize_ending(&entry.full_path)))
        .collect()
}

/// Every entry anywhere below `folder_path`.
pub fn descendant_entries(folder_path: &str, entries: &[ArchiveEntry]) -> Vec<ArchiveEntry> {
    entries
        .iter()
        .filter(|entry| is_descendant(&entry.full_path, folder_path))
        .cloned()
        .collect()
}

/// Materialized child folders of one folder, keyed by normalized path.
///
/// Owned by its folder; entries are only added when missing, so a key keeps the same node
/// until it is removed by a delete.
#[derive(Default)]
pub struct VirtualFolderCache {
    folders: IndexMap<String, Arc<ArchiveFolder>>,
}

impl VirtualFolderCache {
    pub fn get(&self, path: &str) -> Option<Arc<ArchiveFolder>> {
        self.folders.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.folders.contains_key(path)
    }

    /// Returns the cached node for `path`, creating it with `create` when absent.
    pub fn get_or_insert_with<F>(&mut self, path: &str, create: F) -> Arc<ArchiveFolder>
    where
        F: FnOnce() -> Arc<ArchiveFolder>,
    {
        self.folders.entry(path.to_string()).or_insert_with(create).clone()
    }

    pub fn insert(&mut self, path: String, folder: Arc<ArchiveFolder>) {
        self.folders.insert(path, folder);
    }

    pub fn remove(&mut self, path: &str) -> Option<Arc<ArchiveFolder>> {
        self.folders.shift_remove(path)
    }

    pub fn folders(&self) -> Vec<Arc<ArchiveFolder>> {
        self.folders.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}
