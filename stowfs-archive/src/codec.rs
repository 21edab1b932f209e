//! Interface consumed from an archive format codec.
//!
//! A codec knows nothing about folders: it lists path-named entries and opens, creates or
//! deletes the stream of a single entry. The hierarchy is reconstructed by
//! [`crate::materializer`].

use async_trait::async_trait;
use stowfs_core::path::{last_segment, trim_ending, SEPARATOR};
use stowfs_core::stream::BoxedStream;
use stowfs_core::{AccessMode, Result};

use crate::config::ArchiveMode;

/// A single path-named object inside an archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchiveEntry {
    /// Slash-delimited path without leading or trailing separator.
    pub full_path: String,
    /// Last segment of `full_path`.
    pub name: String,
}

impl ArchiveEntry {
    pub fn new(full_path: impl AsRef<str>) -> Self {
        let full_path = trim_ending(full_path.as_ref().trim_start_matches(SEPARATOR)).to_string();
        let name = last_segment(&full_path).to_string();
        Self { full_path, name }
    }
}

/// An opened archive.
#[async_trait]
pub trait ArchiveCodec: Send + Sync {
    /// Snapshot of the current entries, in archive order.
    fn entries(&self) -> Vec<ArchiveEntry>;

    async fn open_entry(&self, entry: &ArchiveEntry, mode: AccessMode) -> Result<BoxedStream>;

    /// Adds an empty entry at `path` and returns a writable stream on it.
    async fn create_entry(&mut self, path: &str) -> Result<BoxedStream>;

    async fn delete_entry(&mut self, entry: &ArchiveEntry) -> Result<()>;

    /// Flushes pending changes and releases the archive.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Something an archive can be opened from: a file path, a blob, a buffer.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    async fn open(&self, mode: ArchiveMode) -> Result<Box<dyn ArchiveCodec>>;
}
