//! Core traits that define the addressable storage contract.
//!
//! Every backend implements [`StorageItem`] plus whichever of the minimal traits apply to the
//! item ([`StorageFile`], [`StorageFolder`], [`ChildItem`], [`ModifiableFolder`]). Items can
//! additionally expose specialized capabilities; the `as_*` probe methods return `None` by
//! default, in which case [`crate::capability`] runs a generic fallback built on the minimal
//! traits.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::stream::BoxedStream;
use crate::types::{AccessMode, ItemFilter, ItemKind};

/// Shared handle to any item.
pub type ItemRef = Arc<dyn StorageItem>;

/// An addressable file or folder.
pub trait StorageItem: Send + Sync {
    /// Identifier unique within the item's tree.
    fn id(&self) -> &str;

    /// Display name (last segment of the id).
    fn name(&self) -> &str;

    fn kind(&self) -> ItemKind;

    fn as_file(&self) -> Option<&dyn StorageFile> {
        None
    }

    fn as_folder(&self) -> Option<&dyn StorageFolder> {
        None
    }

    /// Present on every item that has a parent.
    fn as_child(&self) -> Option<&dyn ChildItem> {
        None
    }

    /// Present on folders that accept create and delete.
    fn as_modifiable(&self) -> Option<&dyn ModifiableFolder> {
        None
    }

    fn as_item_lookup(&self) -> Option<&dyn ItemLookup> {
        None
    }

    fn as_name_lookup(&self) -> Option<&dyn NameLookup> {
        None
    }

    fn as_recursive_lookup(&self) -> Option<&dyn RecursiveLookup> {
        None
    }

    fn as_file_copy(&self) -> Option<&dyn FileCopy> {
        None
    }

    fn as_file_move(&self) -> Option<&dyn FileMove> {
        None
    }

    fn as_root_lookup(&self) -> Option<&dyn RootLookup> {
        None
    }
}

impl fmt::Debug for dyn StorageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageItem")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}

/// A file whose bytes can be streamed.
#[async_trait]
pub trait StorageFile: StorageItem {
    async fn open_stream(&self, mode: AccessMode, cancel: &CancellationToken)
        -> Result<BoxedStream>;
}

/// A folder that can enumerate its direct children.
#[async_trait]
pub trait StorageFolder: StorageItem {
    async fn children(&self, filter: ItemFilter, cancel: &CancellationToken)
        -> Result<Vec<ItemRef>>;
}

/// An item that can look up the folder containing it.
#[async_trait]
pub trait ChildItem: StorageItem {
    async fn parent(&self, cancel: &CancellationToken) -> Result<ItemRef>;
}

/// A folder that supports creating and deleting children.
#[async_trait]
pub trait ModifiableFolder: StorageFolder {
    /// Creates a file named `name`. Without `overwrite` an existing file is returned as is.
    async fn create_file(&self, name: &str, overwrite: bool, cancel: &CancellationToken)
        -> Result<ItemRef>;

    /// Creates a folder named `name`. Without `overwrite` an existing folder is returned as is.
    async fn create_folder(&self, name: &str, overwrite: bool, cancel: &CancellationToken)
        -> Result<ItemRef>;

    /// Deletes a direct child. Folders are deleted recursively.
    async fn delete(&self, item: &dyn StorageItem, cancel: &CancellationToken) -> Result<()>;
}

/// Direct child lookup by id.
#[async_trait]
pub trait ItemLookup: Send + Sync {
    async fn get_item(&self, id: &str, cancel: &CancellationToken) -> Result<ItemRef>;
}

/// Direct child lookup by name.
#[async_trait]
pub trait NameLookup: Send + Sync {
    async fn get_item_by_name(&self, name: &str, cancel: &CancellationToken) -> Result<ItemRef>;
}

/// Lookup of any descendant by id.
#[async_trait]
pub trait RecursiveLookup: Send + Sync {
    async fn get_item_recursive(&self, id: &str, cancel: &CancellationToken) -> Result<ItemRef>;
}

/// Copying a file into this folder.
#[async_trait]
pub trait FileCopy: Send + Sync {
    async fn copy_file_in(
        &self,
        source: &dyn StorageItem,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<ItemRef>;
}

/// Moving a file from another folder into this one.
#[async_trait]
pub trait FileMove: Send + Sync {
    async fn move_file_in(
        &self,
        source: &dyn StorageItem,
        source_folder: &dyn StorageItem,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<ItemRef>;
}

/// Direct access to the root of the item's tree.
#[async_trait]
pub trait RootLookup: Send + Sync {
    async fn root(&self, cancel: &CancellationToken) -> Result<ItemRef>;
}
