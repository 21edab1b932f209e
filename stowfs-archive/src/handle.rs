//! The archive handle shared by every node of one tree.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use stowfs_core::stream::BoxedStream;
use stowfs_core::{AccessMode, Result, StoreError};
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tracing::debug;

use crate::codec::{ArchiveCodec, ArchiveEntry, ArchiveSource};
use crate::config::ArchiveOptions;
use crate::folder::ArchiveFolder;

/// Lazily opened archive. Nodes hold it through an `Arc`; only the tree owner closes it.
pub struct ArchiveHandle {
    source: Box<dyn ArchiveSource>,
    options: ArchiveOptions,
    codec: OnceCell<Mutex<Box<dyn ArchiveCodec>>>,
    closed: AtomicBool,
    root: OnceLock<Weak<ArchiveFolder>>,
}

impl fmt::Debug for ArchiveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveHandle")
            .field("options", &self.options)
            .field("open", &self.is_open())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ArchiveHandle {
    pub(crate) fn new(source: Box<dyn ArchiveSource>, options: ArchiveOptions) -> Arc<Self> {
        Arc::new(Self {
            source,
            options,
            codec: OnceCell::new(),
            closed: AtomicBool::new(false),
            root: OnceLock::new(),
        })
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Whether the archive has been opened by a previous operation.
    pub fn is_open(&self) -> bool {
        self.codec.initialized() && !self.is_closed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn set_root(&self, root: Weak<ArchiveFolder>) {
        let _ = self.root.set(root);
    }

    pub(crate) fn root(&self) -> Option<Arc<ArchiveFolder>> {
        self.root.get().and_then(Weak::upgrade)
    }

    /// Fails with `Unsupported` unless the archive was opened for update.
    pub(crate) fn ensure_writable(&self, operation: &str) -> Result<()> {
        if self.options.mode.is_writable() {
            Ok(())
        } else {
            Err(StoreError::unsupported(format!("{} in read-only archive", operation)))
        }
    }

    async fn codec(&self) -> Result<MutexGuard<'_, Box<dyn ArchiveCodec>>> {
        if self.is_closed() {
            return Err(StoreError::unsupported("access closed archive"));
        }
        let codec = self
            .codec
            .get_or_try_init(|| async {
                debug!(mode = %self.options.mode, "opening archive");
                self.source.open(self.options.mode).await.map(Mutex::new)
            })
            .await?;
        Ok(codec.lock().await)
    }

    pub(crate) async fn entries(&self) -> Result<Vec<ArchiveEntry>> {
        Ok(self.codec().await?.entries())
    }

    pub(crate) async fn open_entry(
        &self,
        full_path: &str,
        mode: AccessMode,
    ) -> Result<BoxedStream> {
        if mode.is_write() {
            self.ensure_writable("open entry for writing")?;
        }
        let codec = self.codec().await?;
        let entry = codec
            .entries()
            .into_iter()
            .find(|entry| entry.full_path == full_path)
            .ok_or_else(|| StoreError::not_found(full_path))?;
        codec.open_entry(&entry, mode).await
    }

    pub(crate) async fn create_entry(&self, full_path: &str) -> Result<BoxedStream> {
        self.ensure_writable("create entry")?;
        debug!(path = %full_path, "creating archive entry");
        self.codec().await?.create_entry(full_path).await
    }

    pub(crate) async fn delete_entry(&self, entry: &ArchiveEntry) -> Result<()> {
        self.ensure_writable("delete entry")?;
        debug!(path = %entry.full_path, "deleting archive entry");
        self.codec().await?.delete_entry(entry).await
    }

    /// Closes the archive. Later calls return `Ok` without closing again.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.codec.get() {
            Some(codec) => {
                debug!("closing archive");
                codec.lock().await.close().await
            }
            None => Ok(()),
        }
    }
}
