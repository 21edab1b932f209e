//! In-memory archive codec.
//!
//! Keeps entries in insertion order with one shared buffer per entry, so writes through an
//! entry stream are visible to later readers and to [`MemoryArchive::contents`]. Clones share
//! the same state, which lets a test keep a handle on the archive a tree was built from.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use indexmap::IndexMap;
use parking_lot::Mutex;
use stowfs_core::stream::{BoxedStream, MemoryStream};
use stowfs_core::{AccessMode, Result, StoreError};

use crate::codec::{ArchiveCodec, ArchiveEntry, ArchiveSource};
use crate::config::ArchiveMode;

type Buffer = Arc<Mutex<Vec<u8>>>;

#[derive(Default)]
struct State {
    entries: IndexMap<String, Buffer>,
    opens: usize,
    closes: usize,
}

#[derive(Clone, Default)]
pub struct MemoryArchive {
    state: Arc<Mutex<State>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive pre-populated with `(path, contents)` pairs.
    pub fn with_entries<I, P, B>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<String>,
        B: Into<Bytes>,
    {
        let archive = Self::new();
        for (path, contents) in entries {
            archive.insert(path, contents);
        }
        archive
    }

    /// Adds or replaces an entry.
    pub fn insert(&self, path: impl Into<String>, contents: impl Into<Bytes>) {
        let entry = ArchiveEntry::new(path.into());
        let bytes: Bytes = contents.into();
        self.state
            .lock()
            .entries
            .insert(entry.full_path, Arc::new(Mutex::new(bytes.to_vec())));
    }

    pub fn contents(&self, path: &str) -> Option<Bytes> {
        let state = self.state.lock();
        let buffer = state.entries.get(path)?;
        let bytes = Bytes::copy_from_slice(&buffer.lock());
        Some(bytes)
    }

    /// Entry paths in archive order.
    pub fn paths(&self) -> Vec<String> {
        self.state.lock().entries.keys().cloned().collect()
    }

    /// Number of times the archive was opened.
    pub fn open_count(&self) -> usize {
        self.state.lock().opens
    }

    /// Number of times an opened archive was closed.
    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }
}

#[async_trait]
impl ArchiveSource for MemoryArchive {
    async fn open(&self, mode: ArchiveMode) -> Result<Box<dyn ArchiveCodec>> {
        self.state.lock().opens += 1;
        Ok(Box::new(MemoryCodec {
            state: self.state.clone(),
            mode,
        }))
    }
}

struct MemoryCodec {
    state: Arc<Mutex<State>>,
    mode: ArchiveMode,
}

impl MemoryCodec {
    fn check_writable(&self, operation: &str) -> Result<()> {
        if self.mode.is_writable() {
            Ok(())
        } else {
            Err(StoreError::unsupported(format!("{} in read-only archive", operation)))
        }
    }
}

#[async_trait]
impl ArchiveCodec for MemoryCodec {
    fn entries(&self) -> Vec<ArchiveEntry> {
        self.state.lock().entries.keys().map(ArchiveEntry::new).collect()
    }

    async fn open_entry(&self, entry: &ArchiveEntry, mode: AccessMode) -> Result<BoxedStream> {
        if mode.is_write() {
            self.check_writable("write entry")?;
        }
        let buffer = self
            .state
            .lock()
            .entries
            .get(&entry.full_path)
            .cloned()
            .ok_or_else(|| StoreError::not_found(entry.full_path.as_str()))?;
        Ok(Box::new(MemoryStream::new(buffer)))
    }

    async fn create_entry(&mut self, path: &str) -> Result<BoxedStream> {
        self.check_writable("create entry")?;
        let entry = ArchiveEntry::new(path);
        let buffer: Buffer = Arc::default();
        {
            let mut state = self.state.lock();
            if state.entries.contains_key(&entry.full_path) {
                return Err(StoreError::already_exists(entry.full_path));
            }
            state.entries.insert(entry.full_path, buffer.clone());
        }
        Ok(Box::new(MemoryStream::new(buffer)))
    }

    async fn delete_entry(&mut self, entry: &ArchiveEntry) -> Result<()> {
        self.check_writable("delete entry")?;
        self.state
            .lock()
            .entries
            .shift_remove(&entry.full_path)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(entry.full_path.as_str()))
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().closes += 1;
        Ok(())
    }
}
