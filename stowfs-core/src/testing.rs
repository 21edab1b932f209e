//! Minimal in-memory backend used by the unit tests. It implements only the minimal contract,
//! so every capability-probed operation exercises its fallback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{check_cancelled, Result, StoreError};
use crate::path::{join_child, SEPARATOR};
use crate::stream::{BoxedStream, MemoryStream};
use crate::traits::{
    ChildItem, ItemLookup, ItemRef, ModifiableFolder, StorageFile, StorageFolder, StorageItem,
};
use crate::types::{AccessMode, ItemFilter, ItemKind};

enum MemEntry {
    File(Arc<MemFile>),
    Folder(Arc<MemFolder>),
}

impl MemEntry {
    fn name(&self) -> &str {
        match self {
            MemEntry::File(file) => &file.name,
            MemEntry::Folder(folder) => &folder.name,
        }
    }

    fn item(&self) -> ItemRef {
        match self {
            MemEntry::File(file) => file.clone(),
            MemEntry::Folder(folder) => folder.clone(),
        }
    }
}

pub struct MemFolder {
    id: String,
    name: String,
    parent: Option<Weak<MemFolder>>,
    me: Weak<MemFolder>,
    entries: Mutex<Vec<MemEntry>>,
}

impl MemFolder {
    pub fn root() -> ItemRef {
        Self::new(String::new(), String::new(), None)
    }

    fn new(id: String, name: String, parent: Option<Weak<MemFolder>>) -> Arc<MemFolder> {
        Arc::new_cyclic(|me| MemFolder {
            id,
            name,
            parent,
            me: me.clone(),
            entries: Mutex::new(Vec::new()),
        })
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() || name.contains(SEPARATOR) {
            return Err(StoreError::invalid_argument(name, "not a single path segment"));
        }
        Ok(())
    }
}

pub struct MemFile {
    id: String,
    name: String,
    parent: Weak<MemFolder>,
    data: Arc<Mutex<Vec<u8>>>,
}

impl StorageItem for MemFolder {
    fn id(&self) -> &str {
        &self.id
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
        self.parent.as_ref().map(|_| self as &dyn ChildItem)
    }

    fn as_modifiable(&self) -> Option<&dyn ModifiableFolder> {
        Some(self)
    }
}

#[async_trait]
impl StorageFolder for MemFolder {
    async fn children(
        &self,
        filter: ItemFilter,
        cancel: &CancellationToken,
    ) -> Result<Vec<ItemRef>> {
        check_cancelled(cancel)?;
        Ok(self
            .entries
            .lock()
            .iter()
            .map(MemEntry::item)
            .filter(|item| filter.accepts(item.kind()))
            .collect())
    }
}

#[async_trait]
impl ChildItem for MemFolder {
    async fn parent(&self, _cancel: &CancellationToken) -> Result<ItemRef> {
        let parent = self.parent.as_ref().and_then(Weak::upgrade);
        parent
            .map(|p| p as ItemRef)
            .ok_or_else(|| StoreError::not_found(format!("parent of {}", self.id)))
    }
}

#[async_trait]
impl ModifiableFolder for MemFolder {
    async fn create_file(
        &self,
        name: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<ItemRef> {
        check_cancelled(cancel)?;
        Self::validate_name(name)?;
        let mut entries = self.entries.lock();
        if let Some(index) = entries.iter().position(|e| e.name() == name) {
            let existing = match &entries[index] {
                MemEntry::Folder(_) => return Err(StoreError::already_exists(name)),
                MemEntry::File(file) => file.clone(),
            };
            if !overwrite {
                return Ok(existing);
            }
            entries.remove(index);
        }
        let file = Arc::new(MemFile {
            id: join_child(&self.id, name, ItemKind::File),
            name: name.to_string(),
            parent: self.me.clone(),
            data: Arc::new(Mutex::new(Vec::new())),
        });
        entries.push(MemEntry::File(file.clone()));
        Ok(file)
    }

    async fn create_folder(
        &self,
        name: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<ItemRef> {
        check_cancelled(cancel)?;
        Self::validate_name(name)?;
        let mut entries = self.entries.lock();
        if let Some(index) = entries.iter().position(|e| e.name() == name) {
            let existing = match &entries[index] {
                MemEntry::File(_) => return Err(StoreError::already_exists(name)),
                MemEntry::Folder(folder) => folder.clone(),
            };
            if !overwrite {
                return Ok(existing);
            }
            entries.remove(index);
        }
        let folder = MemFolder::new(
            join_child(&self.id, name, ItemKind::Folder),
            name.to_string(),
            Some(self.me.clone()),
        );
        entries.push(MemEntry::Folder(folder.clone()));
        Ok(folder)
    }

    async fn delete(&self, item: &dyn StorageItem, cancel: &CancellationToken) -> Result<()> {
        check_cancelled(cancel)?;
        let mut entries = self.entries.lock();
        let index = entries
            .iter()
            .position(|e| e.item().id() == item.id())
            .ok_or_else(|| StoreError::not_found(item.id()))?;
        entries.remove(index);
        Ok(())
    }
}

impl StorageItem for MemFile {
    fn id(&self) -> &str {
        &self.id
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
}

#[async_trait]
impl StorageFile for MemFile {
    async fn open_stream(
        &self,
        _mode: AccessMode,
        cancel: &CancellationToken,
    ) -> Result<BoxedStream> {
        check_cancelled(cancel)?;
        Ok(Box::new(MemoryStream::new(self.data.clone())))
    }
}

#[async_trait]
impl ChildItem for MemFile {
    async fn parent(&self, _cancel: &CancellationToken) -> Result<ItemRef> {
        self.parent
            .upgrade()
            .map(|p| p as ItemRef)
            .ok_or_else(|| StoreError::not_found(format!("parent of {}", self.id)))
    }
}

/// Wraps a folder and specializes only direct lookup by id, counting calls.
pub struct CountingLookup {
    inner: ItemRef,
    lookups: AtomicUsize,
}

impl CountingLookup {
    pub fn new(inner: ItemRef) -> Arc<Self> {
        Arc::new(Self { inner, lookups: AtomicUsize::new(0) })
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl StorageItem for CountingLookup {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> ItemKind {
        self.inner.kind()
    }

    fn as_folder(&self) -> Option<&dyn StorageFolder> {
        self.inner.as_folder()
    }

    fn as_item_lookup(&self) -> Option<&dyn ItemLookup> {
        Some(self)
    }
}

#[async_trait]
impl ItemLookup for CountingLookup {
    async fn get_item(&self, id: &str, cancel: &CancellationToken) -> Result<ItemRef> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        crate::capability::get_item(self.inner.as_ref(), id, cancel).await
    }
}
