//! Folder nodes of an archive tree.

mod mutation;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use stowfs_core::path::{join_child, last_segment, normalize_ending, split_segments, SEPARATOR};
use stowfs_core::traits::{
    ChildItem, FileCopy, FileMove, ItemLookup, ModifiableFolder, NameLookup, RecursiveLookup,
    RootLookup, StorageFolder, StorageItem,
};
use stowfs_core::{check_cancelled, ItemFilter, ItemKind, ItemRef, Result, StoreError};
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace};

use crate::codec::ArchiveEntry;
use crate::file::ArchiveFile;
use crate::handle::ArchiveHandle;
use crate::materializer::{child_file_entries, child_folder_paths, VirtualFolderCache};

/// A folder inside an archive, either the root or a virtual folder implied by entry paths.
///
/// Folder nodes are never backed by an entry of their own. Child folders are kept in the
/// folder's [`VirtualFolderCache`] so that every lookup of the same path returns the same
/// node until the folder is deleted. Files are listed from the live entries on each call.
pub struct ArchiveFolder {
    archive: Arc<ArchiveHandle>,
    path: String,
    name: String,
    parent: Option<Weak<ArchiveFolder>>,
    me: Weak<ArchiveFolder>,
    cache: Mutex<VirtualFolderCache>,
    deleted: AtomicBool,
}

impl ArchiveFolder {
    pub(crate) fn new_root(archive: Arc<ArchiveHandle>) -> Arc<Self> {
        let root = Self::new(archive.clone(), String::new(), None);
        archive.set_root(Arc::downgrade(&root));
        root
    }

    fn new(
        archive: Arc<ArchiveHandle>,
        path: String,
        parent: Option<Weak<ArchiveFolder>>,
    ) -> Arc<Self> {
        let name = last_segment(&path).to_string();
        Arc::new_cyclic(|me| Self {
            archive,
            path,
            name,
            parent,
            me: me.clone(),
            cache: Mutex::new(VirtualFolderCache::default()),
            deleted: AtomicBool::new(false),
        })
    }

    fn new_child(&self, path: &str) -> Arc<ArchiveFolder> {
        Self::new(self.archive.clone(), path.to_string(), Some(self.me.clone()))
    }

    /// Normalized path: empty for the root, otherwise ending with one separator.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Whether this folder was removed by a delete. Deleted folders fail every operation.
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub fn archive(&self) -> &Arc<ArchiveHandle> {
        &self.archive
    }

    fn ensure_live(&self) -> Result<()> {
        if self.is_deleted() {
            Err(StoreError::not_found(self.path.as_str()))
        } else {
            Ok(())
        }
    }

    fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
        for child in self.cache.lock().folders() {
            child.mark_deleted();
        }
    }

    /// Merges the folders implied by `entries` into the cache and returns every cached child.
    fn materialize(&self, entries: &[ArchiveEntry]) -> Vec<Arc<ArchiveFolder>> {
        let mut cache = self.cache.lock();
        for path in child_folder_paths(&self.path, entries) {
            if !cache.contains(&path) {
                trace!(path = %path, "materializing virtual folder");
                cache.insert(path.clone(), self.new_child(&path));
            }
        }
        cache.folders()
    }

    fn file_nodes(&self, entries: &[ArchiveEntry]) -> Vec<Arc<ArchiveFile>> {
        let cache = self.cache.lock();
        child_file_entries(&self.path, entries)
            .into_iter()
            .filter(|entry| !cache.contains(&normalize_ending(&entry.full_path)))
            .map(|entry| self.file_node(entry))
            .collect()
    }

    fn file_node(&self, entry: &ArchiveEntry) -> Arc<ArchiveFile> {
        Arc::new(ArchiveFile::new(
            self.archive.clone(),
            entry.full_path.clone(),
            entry.name.clone(),
            self.me.clone(),
        ))
    }

    /// Direct child folders, materialized from the current entries.
    #[instrument(skip(self, cancel), fields(path = %self.path))]
    pub async fn folders(&self, cancel: &CancellationToken) -> Result<Vec<Arc<ArchiveFolder>>> {
        self.ensure_live()?;
        check_cancelled(cancel)?;
        let entries = self.archive.entries().await?;
        Ok(self.materialize(&entries))
    }

    /// Direct child files.
    pub async fn files(&self, cancel: &CancellationToken) -> Result<Vec<Arc<ArchiveFile>>> {
        self.ensure_live()?;
        check_cancelled(cancel)?;
        let entries = self.archive.entries().await?;
        self.materialize(&entries);
        Ok(self.file_nodes(&entries))
    }

    /// Child folder named `name`, if any.
    pub async fn folder(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<ArchiveFolder>>> {
        let path = join_child(&self.path, name, ItemKind::Folder);
        self.folders(cancel).await?;
        Ok(self.cache.lock().get(&path))
    }

    /// Child file named `name`, if any.
    pub async fn file(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<ArchiveFile>>> {
        Ok(self
            .files(cancel)
            .await?
            .into_iter()
            .find(|file| file.name() == name))
    }

    async fn child(
        &self,
        name: &str,
        kind: ItemKind,
        cancel: &CancellationToken,
    ) -> Result<Option<ItemRef>> {
        Ok(match kind {
            ItemKind::Folder => self.folder(name, cancel).await?.map(|f| f as ItemRef),
            ItemKind::File => self.file(name, cancel).await?.map(|f| f as ItemRef),
        })
    }
}

impl fmt::Debug for ArchiveFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveFolder")
            .field("path", &self.path)
            .field("deleted", &self.is_deleted())
            .finish()
    }
}

impl StorageItem for ArchiveFolder {
    fn id(&self) -> &str {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ItemKind {
        ItemKind::Folder
    }

    fn as_folder(&self) -> Option<&dyn StorageFolder> {
        Some(self)
    }

    fn as_child(&self) -> Option<&dyn ChildItem> {
        if self.is_root() {
            None
        } else {
            Some(self)
        }
    }

    fn as_modifiable(&self) -> Option<&dyn ModifiableFolder> {
        if self.archive.options().mode.is_writable() {
            Some(self)
        } else {
            None
        }
    }

    fn as_item_lookup(&self) -> Option<&dyn ItemLookup> {
        Some(self)
    }

    fn as_name_lookup(&self) -> Option<&dyn NameLookup> {
        Some(self)
    }

    fn as_recursive_lookup(&self) -> Option<&dyn RecursiveLookup> {
        Some(self)
    }

    fn as_file_copy(&self) -> Option<&dyn FileCopy> {
        Some(self)
    }

    fn as_file_move(&self) -> Option<&dyn FileMove> {
        Some(self)
    }

    fn as_root_lookup(&self) -> Option<&dyn RootLookup> {
        Some(self)
    }
}

#[async_trait]
impl StorageFolder for ArchiveFolder {
    async fn children(
        &self,
        filter: ItemFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<ItemRef>> {
        self.ensure_live()?;
        check_cancelled(cancel)?;
        let entries = self.archive.entries().await?;
        let folders = self.materialize(&entries);

        let mut children: Vec<ItemRef> = Vec::new();
        if filter.accepts(ItemKind::Folder) {
            children.extend(folders.into_iter().map(|f| f as ItemRef));
        }
        if filter.accepts(ItemKind::File) {
            children.extend(self.file_nodes(&entries).into_iter().map(|f| f as ItemRef));
        }
        Ok(children)
    }
}

#[async_trait]
impl ChildItem for ArchiveFolder {
    async fn parent(&self, cancel: &CancellationToken) -> Result<ItemRef> {
        check_cancelled(cancel)?;
        self.parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|parent| parent as ItemRef)
            .ok_or_else(|| StoreError::not_found(format!("parent of '{}'", self.path)))
    }
}

#[async_trait]
impl ModifiableFolder for ArchiveFolder {
    async fn create_file(
        &self,
        name: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<ItemRef> {
        self.create_file_named(name, overwrite, cancel).await.map(|item| item as ItemRef)
    }

    async fn create_folder(
        &self,
        name: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<ItemRef> {
        self.create_folder_named(name, overwrite, cancel).await.map(|item| item as ItemRef)
    }

    async fn delete(&self, item: &dyn StorageItem, cancel: &CancellationToken) -> Result<()> {
        self.delete_item(item.id(), cancel).await
    }
}

#[async_trait]
impl ItemLookup for ArchiveFolder {
    async fn get_item(&self, id: &str, cancel: &CancellationToken) -> Result<ItemRef> {
        let kind = if id.ends_with(SEPARATOR) { ItemKind::Folder } else { ItemKind::File };
        let name = last_segment(id);
        if name.is_empty() || join_child(&self.path, name, kind) != id {
            return Err(StoreError::not_found(id));
        }
        self.child(name, kind, cancel)
            .await?
            .ok_or_else(|| StoreError::not_found(id))
    }
}

#[async_trait]
impl NameLookup for ArchiveFolder {
    async fn get_item_by_name(&self, name: &str, cancel: &CancellationToken) -> Result<ItemRef> {
        if let Some(folder) = self.child(name, ItemKind::Folder, cancel).await? {
            return Ok(folder);
        }
        self.child(name, ItemKind::File, cancel)
            .await?
            .ok_or_else(|| StoreError::not_found(name))
    }
}

#[async_trait]
impl RecursiveLookup for ArchiveFolder {
    async fn get_item_recursive(&self, id: &str, cancel: &CancellationToken) -> Result<ItemRef> {
        self.ensure_live()?;
        let relative = id
            .strip_prefix(self.path.as_str())
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| StoreError::not_found(id))?;

        let mut segments = split_segments(relative);
        let last = segments.pop().ok_or_else(|| StoreError::not_found(id))?;

        let mut current = self
            .me
            .upgrade()
            .ok_or_else(|| StoreError::not_found(self.path.as_str()))?;
        for segment in segments {
            check_cancelled(cancel)?;
            current = current
                .folder(segment, cancel)
                .await?
                .ok_or_else(|| StoreError::not_found(id))?;
        }

        let kind = if id.ends_with(SEPARATOR) { ItemKind::Folder } else { ItemKind::File };
        current
            .child(last, kind, cancel)
            .await?
            .ok_or_else(|| StoreError::not_found(id))
    }
}

#[async_trait]
impl FileCopy for ArchiveFolder {
    async fn copy_file_in(
        &self,
        source: &dyn StorageItem,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<ItemRef> {
        self.copy_in(source, overwrite, cancel).await.map(|item| item as ItemRef)
    }
}

#[async_trait]
impl FileMove for ArchiveFolder {
    async fn move_file_in(
        &self,
        source: &dyn StorageItem,
        source_folder: &dyn StorageItem,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<ItemRef> {
        self.move_in(source, source_folder, overwrite, cancel).await.map(|item| item as ItemRef)
    }
}

#[async_trait]
impl RootLookup for ArchiveFolder {
    async fn root(&self, cancel: &CancellationToken) -> Result<ItemRef> {
        check_cancelled(cancel)?;
        self.archive
            .root()
            .map(|root| root as ItemRef)
            .ok_or_else(|| StoreError::not_found("archive root"))
    }
}
