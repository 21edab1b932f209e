//! File nodes of an archive tree, each wrapping one entry.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use stowfs_core::stream::BoxedStream;
use stowfs_core::traits::{ChildItem, RootLookup, StorageFile, StorageItem};
use stowfs_core::{check_cancelled, AccessMode, ItemKind, ItemRef, Result, StoreError};
use tokio_util::sync::CancellationToken;

use crate::folder::ArchiveFolder;
use crate::handle::ArchiveHandle;

#[derive(Debug)]
pub struct ArchiveFile {
    archive: Arc<ArchiveHandle>,
    path: String,
    name: String,
    parent: Weak<ArchiveFolder>,
}

impl ArchiveFile {
    pub(crate) fn new(
        archive: Arc<ArchiveHandle>,
        path: String,
        name: String,
        parent: Weak<ArchiveFolder>,
    ) -> Self {
        Self { archive, path, name, parent }
    }

    /// Full entry path; equal to the id.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent_folder(&self) -> Result<Arc<ArchiveFolder>> {
        self.parent
            .upgrade()
            .filter(|parent| !parent.is_deleted())
            .ok_or_else(|| StoreError::not_found(format!("parent of '{}'", self.path)))
    }
}

impl StorageItem for ArchiveFile {
    fn id(&self) -> &str {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ItemKind {
        ItemKind::File
    }

    fn as_file(&self) -> Option<&dyn StorageFile> {
        Some(self)
    }

    fn as_child(&self) -> Option<&dyn ChildItem> {
        Some(self)
    }

    fn as_root_lookup(&self) -> Option<&dyn RootLookup> {
        Some(self)
    }
}

#[async_trait]
impl StorageFile for ArchiveFile {
    async fn open_stream(
        &self,
        mode: AccessMode,
        cancel: &CancellationToken,
    ) -> Result<BoxedStream> {
        check_cancelled(cancel)?;
        self.parent_folder()?;
        self.archive.open_entry(&self.path, mode).await
    }
}

#[async_trait]
impl ChildItem for ArchiveFile {
    async fn parent(&self, cancel: &CancellationToken) -> Result<ItemRef> {
        check_cancelled(cancel)?;
        self.parent_folder().map(|parent| parent as ItemRef)
    }
}

#[async_trait]
impl RootLookup for ArchiveFile {
    async fn root(&self, cancel: &CancellationToken) -> Result<ItemRef> {
        check_cancelled(cancel)?;
        self.archive
            .root()
            .map(|root| root as ItemRef)
            .ok_or_else(|| StoreError::not_found("archive root"))
    }
}
