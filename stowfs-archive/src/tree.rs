//! Owner of an archive tree.

use std::sync::Arc;

use stowfs_core::{ItemRef, Result};
use tracing::{debug, warn};

use crate::codec::ArchiveSource;
use crate::config::ArchiveOptions;
use crate::folder::ArchiveFolder;
use crate::handle::ArchiveHandle;

/// Holds the root folder and the archive handle of one tree.
///
/// Creating a tree does not touch the archive; it is opened by the first operation that
/// needs its entries. The owner releases it with [`ArchiveTree::close`].
pub struct ArchiveTree {
    handle: Arc<ArchiveHandle>,
    root: Arc<ArchiveFolder>,
}

impl ArchiveTree {
    pub fn new(source: impl ArchiveSource + 'static, options: ArchiveOptions) -> Self {
        let handle = ArchiveHandle::new(Box::new(source), options);
        let root = ArchiveFolder::new_root(handle.clone());
        debug!(mode = %handle.options().mode, "archive tree created");
        Self { handle, root }
    }

    pub fn root(&self) -> Arc<ArchiveFolder> {
        self.root.clone()
    }

    /// The root as a generic item, for the capability and resolver operations.
    pub fn root_item(&self) -> ItemRef {
        self.root.clone()
    }

    pub fn handle(&self) -> &Arc<ArchiveHandle> {
        &self.handle
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    /// Closes the archive. Nodes outliving the tree fail afterwards.
    pub async fn close(&self) -> Result<()> {
        self.handle.close().await
    }
}

impl Drop for ArchiveTree {
    fn drop(&mut self) {
        if self.handle.is_open() {
            warn!("archive tree dropped without close; pending changes may be lost");
        }
    }
}
