//! Create, delete, copy and move on archive folders.
//!
//! Archives have no directory records and no rename. Folders only exist in the caches until
//! an entry is written below them, deleting a folder deletes every entry under its path, and
//! a move is a copy followed by a delete of the source.

use std::sync::Arc;

use stowfs_core::path::{join_child, normalize_ending, parent_id, trim_ending, SEPARATOR};
use stowfs_core::stream::copy_stream;
use stowfs_core::traits::StorageItem;
use stowfs_core::{check_cancelled, AccessMode, ItemKind, Result, StoreError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::ArchiveFolder;
use crate::classifier::is_child;
use crate::codec::ArchiveEntry;
use crate::file::ArchiveFile;
use crate::materializer::{child_folder_paths, descendant_entries};

impl ArchiveFolder {
    /// Gets or creates the file `name` in this folder.
    ///
    /// Without `overwrite` an existing file is returned unchanged; with it the entry is
    /// replaced by an empty one. Names spanning several segments fail with `NotFound`: a
    /// nested file has to be created through its own folder.
    pub async fn create_file_named(
        &self,
        name: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<Arc<ArchiveFile>> {
        self.ensure_live()?;
        check_cancelled(cancel)?;
        self.archive.ensure_writable("create file")?;
        let path = self.child_path(name, ItemKind::File)?;

        let entries = self.archive.entries().await?;
        let folder_path = normalize_ending(&path);
        let implied = child_folder_paths(&self.path, &entries).contains(&folder_path);
        if implied || self.cache.lock().contains(&folder_path) {
            return Err(StoreError::already_exists(folder_path));
        }

        if let Some(existing) = entries.iter().find(|entry| entry.full_path == path) {
            if !overwrite {
                return Ok(self.file_node(existing));
            }
            self.archive.delete_entry(existing).await?;
        }

        // The returned stream is only needed by callers writing immediately.
        drop(self.archive.create_entry(&path).await?);
        debug!(path = %path, "created file");
        Ok(self.file_node(&ArchiveEntry::new(&path)))
    }

    /// Gets or creates the folder `name` in this folder.
    ///
    /// Without `overwrite` an existing folder is returned as the same node; with it the
    /// existing folder is deleted recursively and replaced by an empty one.
    pub async fn create_folder_named(
        &self,
        name: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<Arc<ArchiveFolder>> {
        self.ensure_live()?;
        check_cancelled(cancel)?;
        self.archive.ensure_writable("create folder")?;
        let path = self.child_path(name, ItemKind::Folder)?;

        let entries = self.archive.entries().await?;
        self.materialize(&entries);
        let file_path = trim_ending(&path);
        if entries.iter().any(|entry| entry.full_path == file_path) {
            return Err(StoreError::already_exists(file_path));
        }

        let existing = self.cache.lock().get(&path);
        if let Some(existing) = existing {
            if !overwrite {
                return Ok(existing);
            }
            self.delete_folder(existing, cancel).await?;
        }

        let folder = self.cache.lock().get_or_insert_with(&path, || self.new_child(&path));
        debug!(path = %path, "created folder");
        Ok(folder)
    }

    /// Deletes the direct child identified by `id`. Folder ids end with a separator.
    pub async fn delete_item(&self, id: &str, cancel: &CancellationToken) -> Result<()> {
        self.ensure_live()?;
        check_cancelled(cancel)?;
        self.archive.ensure_writable("delete")?;
        if trim_ending(id).is_empty() {
            return Err(StoreError::invalid_argument(id, "the root folder cannot be deleted"));
        }
        if parent_id(id) != Some(self.path.as_str()) {
            return Err(StoreError::not_found(id));
        }

        if id.ends_with(SEPARATOR) {
            let folder = self.materialized_folder(id).await?;
            return self.delete_folder(folder, cancel).await;
        }

        let entries = self.archive.entries().await?;
        let entry = entries
            .iter()
            .find(|entry| entry.full_path == id && is_child(&entry.full_path, &self.path))
            .ok_or_else(|| StoreError::not_found(id))?;
        self.archive.delete_entry(entry).await
    }

    async fn materialized_folder(&self, path: &str) -> Result<Arc<ArchiveFolder>> {
        let entries = self.archive.entries().await?;
        self.materialize(&entries);
        self.cache.lock().get(path).ok_or_else(|| StoreError::not_found(path))
    }

    /// Deletes every entry below `folder`, then evicts it from this folder's cache.
    ///
    /// Descendants are snapshotted before the first delete. A failing entry is skipped and
    /// the first failure is returned once the rest were attempted; nothing is restored.
    #[instrument(skip(self, folder, cancel), fields(path = %folder.path))]
    async fn delete_folder(
        &self,
        folder: Arc<ArchiveFolder>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let entries = self.archive.entries().await?;
        let doomed = descendant_entries(&folder.path, &entries);
        debug!(entries = doomed.len(), "deleting folder");

        let mut first_error = None;
        for entry in &doomed {
            check_cancelled(cancel)?;
            if let Err(e) = self.archive.delete_entry(entry).await {
                warn!(entry = %entry.full_path, error = %e, "failed to delete entry");
                first_error.get_or_insert(e);
            }
        }

        self.cache.lock().remove(&folder.path);
        folder.mark_deleted();
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Copies the file `source` into this folder under its own name.
    ///
    /// Without `overwrite` an existing file of that name is returned and nothing is copied.
    pub async fn copy_in(
        &self,
        source: &dyn StorageItem,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<Arc<ArchiveFile>> {
        self.ensure_live()?;
        check_cancelled(cancel)?;
        self.archive.ensure_writable("copy file")?;
        let file = source
            .as_file()
            .ok_or_else(|| StoreError::invalid_argument(source.id(), "item is not a file"))?;

        if let Some(existing) = self.file(source.name(), cancel).await? {
            if !overwrite {
                return Ok(existing);
            }
        }

        let mut input = file.open_stream(AccessMode::Read, cancel).await?;
        let target = self.create_file_named(source.name(), overwrite, cancel).await?;
        let mut output = self.archive.open_entry(target.id(), AccessMode::ReadWrite).await?;
        let copied = copy_stream(
            &mut input,
            &mut output,
            self.archive.options().copy_buffer_size,
            cancel,
        )
        .await?;
        debug!(from = %source.id(), to = %target.id(), bytes = copied, "copied file");
        Ok(target)
    }

    /// Moves the file `source` from `source_folder` into this folder.
    ///
    /// Emulated as copy then delete. Without `overwrite` an existing file of the same name
    /// fails with `AlreadyExists` and the source stays in place.
    pub async fn move_in(
        &self,
        source: &dyn StorageItem,
        source_folder: &dyn StorageItem,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<Arc<ArchiveFile>> {
        self.ensure_live()?;
        check_cancelled(cancel)?;
        self.archive.ensure_writable("move file")?;
        let same_folder =
            std::ptr::addr_eq(source_folder as *const dyn StorageItem, self as *const Self);
        if source.as_file().is_none() {
            return Err(StoreError::invalid_argument(source.id(), "item is not a file"));
        }
        let origin = match source_folder.as_modifiable() {
            Some(origin) => origin,
            None if source_folder.as_folder().is_some() => {
                return Err(StoreError::unsupported(format!(
                    "move out of read-only folder '{}'",
                    source_folder.id()
                )))
            }
            None => {
                return Err(StoreError::invalid_argument(source_folder.id(), "item is not a folder"))
            }
        };

        let existing = self.file(source.name(), cancel).await?;
        if same_folder {
            return existing.ok_or_else(|| StoreError::not_found(source.id()));
        }
        if existing.is_some() && !overwrite {
            let path = join_child(&self.path, source.name(), ItemKind::File);
            return Err(StoreError::already_exists(path));
        }

        let moved = self.copy_in(source, overwrite, cancel).await?;
        origin.delete(source, cancel).await?;
        debug!(from = %source.id(), to = %moved.id(), "moved file");
        Ok(moved)
    }

    /// Validates a single-segment child name and returns the child's normalized path.
    fn child_path(&self, name: &str, kind: ItemKind) -> Result<String> {
        let segment = trim_ending(name);
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(StoreError::invalid_argument(name, "not a valid item name"));
        }
        let path = join_child(&self.path, segment, kind);
        if segment.contains(SEPARATOR) || segment.contains('\\') {
            return Err(StoreError::not_found(path));
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use stowfs_core::capability;
    use stowfs_core::stream::BoxedStream;
    use stowfs_core::traits::{StorageFile, StorageFolder};
    use stowfs_core::ItemFilter;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::codec::{ArchiveCodec, ArchiveSource};
    use crate::config::{ArchiveMode, ArchiveOptions};
    use crate::memory::MemoryArchive;
    use crate::tree::ArchiveTree;

    /// Wraps a [`MemoryArchive`], failing deletes of one path and optionally cancelling a
    /// token after every successful delete.
    #[derive(Clone)]
    struct FlakyArchive {
        inner: MemoryArchive,
        fail_path: &'static str,
        cancel_after_delete: Option<CancellationToken>,
    }

    struct FlakyCodec {
        inner: Box<dyn ArchiveCodec>,
        fail_path: &'static str,
        cancel_after_delete: Option<CancellationToken>,
    }

    #[async_trait]
    impl ArchiveSource for FlakyArchive {
        async fn open(&self, mode: ArchiveMode) -> Result<Box<dyn ArchiveCodec>> {
            Ok(Box::new(FlakyCodec {
                inner: self.inner.open(mode).await?,
                fail_path: self.fail_path,
                cancel_after_delete: self.cancel_after_delete.clone(),
            }))
        }
    }

    #[async_trait]
    impl ArchiveCodec for FlakyCodec {
        fn entries(&self) -> Vec<ArchiveEntry> {
            self.inner.entries()
        }

        async fn open_entry(&self, entry: &ArchiveEntry, mode: AccessMode) -> Result<BoxedStream> {
            self.inner.open_entry(entry, mode).await
        }

        async fn create_entry(&mut self, path: &str) -> Result<BoxedStream> {
            self.inner.create_entry(path).await
        }

        async fn delete_entry(&mut self, entry: &ArchiveEntry) -> Result<()> {
            if entry.full_path == self.fail_path {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "entry locked").into());
            }
            self.inner.delete_entry(entry).await?;
            if let Some(token) = &self.cancel_after_delete {
                token.cancel();
            }
            Ok(())
        }
    }

    fn tree(archive: &MemoryArchive) -> ArchiveTree {
        ArchiveTree::new(archive.clone(), ArchiveOptions::default())
    }

    async fn read(file: &ArchiveFile) -> Vec<u8> {
        let mut stream = file
            .open_stream(AccessMode::Read, &CancellationToken::new())
            .await
            .unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_create_file_is_get_or_create() {
        let cancel = CancellationToken::new();
        let archive = MemoryArchive::with_entries([("sub/x", "payload")]);
        let tree = tree(&archive);
        let sub = tree.root().folder("sub", &cancel).await.unwrap().unwrap();

        let file = sub.create_file_named("x", false, &cancel).await.unwrap();
        assert_eq!(file.id(), "sub/x");
        assert_eq!(read(&file).await, b"payload");
        assert_eq!(archive.paths(), vec!["sub/x"]);

        let replaced = sub.create_file_named("x", true, &cancel).await.unwrap();
        assert!(read(&replaced).await.is_empty());
        assert_eq!(archive.paths(), vec!["sub/x"]);
    }

    #[tokio::test]
    async fn test_create_file_rejects_bad_names() {
        let cancel = CancellationToken::new();
        let tree = tree(&MemoryArchive::new());
        let root = tree.root();

        let err = root.create_file_named("a/b", false, &cancel).await.unwrap_err();
        assert!(err.is_not_found());
        for name in ["", ".", "..", "/"] {
            let err = root.create_file_named(name, false, &cancel).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidArgument { .. }), "{:?}", name);
        }
    }

    #[tokio::test]
    async fn test_name_clash_between_kinds() {
        let cancel = CancellationToken::new();
        let tree = tree(&MemoryArchive::with_entries([("docs/readme", ""), ("notes", "")]));
        let root = tree.root();

        let err = root.create_file_named("docs", false, &cancel).await.unwrap_err();
        assert!(err.is_already_exists());
        let err = root.create_folder_named("notes", false, &cancel).await.unwrap_err();
        assert!(err.is_already_exists());

        root.create_folder_named("empty", false, &cancel).await.unwrap();
        let err = root.create_file_named("empty", true, &cancel).await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_create_folder_reuses_and_overwrites() {
        let cancel = CancellationToken::new();
        let archive =
            MemoryArchive::with_entries([("a/one", "1"), ("a/b/two", "2"), ("keep", "k")]);
        let tree = tree(&archive);
        let root = tree.root();

        let first = root.create_folder_named("a", false, &cancel).await.unwrap();
        let again = root.create_folder_named("a/", false, &cancel).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(archive.paths(), vec!["a/one", "a/b/two", "keep"]);

        let fresh = root.create_folder_named("a", true, &cancel).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert!(first.is_deleted());
        assert!(fresh.children(ItemFilter::All, &cancel).await.unwrap().is_empty());
        assert_eq!(archive.paths(), vec!["keep"]);
    }

    #[tokio::test]
    async fn test_empty_folder_survives_rematerialization() {
        let cancel = CancellationToken::new();
        let tree = tree(&MemoryArchive::new());
        let root = tree.root();

        let created = root.create_folder_named("later", false, &cancel).await.unwrap();
        let listed = root.folders(&cancel).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(Arc::ptr_eq(&created, &listed[0]));
    }

    #[tokio::test]
    async fn test_delete_folder_removes_descendants_only() {
        let cancel = CancellationToken::new();
        let archive = MemoryArchive::with_entries([
            ("a/x", ""),
            ("a/b/y", ""),
            ("a/b/c/z", ""),
            ("ab/w", ""),
            ("top", ""),
        ]);
        let tree = tree(&archive);
        let root = tree.root();
        let a = root.folder("a", &cancel).await.unwrap().unwrap();
        let b = a.folder("b", &cancel).await.unwrap().unwrap();

        root.delete_item("a/", &cancel).await.unwrap();
        assert_eq!(archive.paths(), vec!["ab/w", "top"]);
        assert!(a.is_deleted());
        assert!(b.is_deleted());

        let names: Vec<String> = root
            .folders(&cancel)
            .await
            .unwrap()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(names, vec!["ab"]);

        let err = b.files(&cancel).await.unwrap_err();
        assert!(err.is_not_found());
        let err = root.delete_item("a/", &cancel).await.unwrap_err();
        assert!(err.is_not_found());
    }

    fn four_entries() -> MemoryArchive {
        MemoryArchive::with_entries([("a/x", ""), ("a/b/y", ""), ("a/z", ""), ("keep", "")])
    }

    #[tokio::test]
    async fn test_delete_folder_continues_past_failed_entry() {
        let cancel = CancellationToken::new();
        let archive = four_entries();
        let flaky = FlakyArchive {
            inner: archive.clone(),
            fail_path: "a/b/y",
            cancel_after_delete: None,
        };
        let tree = ArchiveTree::new(flaky, ArchiveOptions::default());
        let root = tree.root();
        let a = root.folder("a", &cancel).await.unwrap().unwrap();

        let err = root.delete_item("a/", &cancel).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert_eq!(archive.paths(), vec!["a/b/y", "keep"]);
        assert!(a.is_deleted());

        // The surviving entry implies the folder again, as a new node.
        let again = root.folder("a", &cancel).await.unwrap().unwrap();
        assert!(!Arc::ptr_eq(&a, &again));
    }

    #[tokio::test]
    async fn test_delete_folder_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        let archive = four_entries();
        let flaky = FlakyArchive {
            inner: archive.clone(),
            fail_path: "",
            cancel_after_delete: Some(cancel.clone()),
        };
        let tree = ArchiveTree::new(flaky, ArchiveOptions::default());
        let root = tree.root();
        let a = root.folder("a", &cancel).await.unwrap().unwrap();

        let err = root.delete_item("a/", &cancel).await.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
        assert_eq!(archive.paths(), vec!["a/b/y", "a/z", "keep"]);
        assert!(!a.is_deleted());
    }

    #[tokio::test]
    async fn test_delete_file_and_missing() {
        let cancel = CancellationToken::new();
        let archive = MemoryArchive::with_entries([("a/x", ""), ("y", "")]);
        let tree = tree(&archive);
        let root = tree.root();

        root.delete_item("y", &cancel).await.unwrap();
        assert_eq!(archive.paths(), vec!["a/x"]);

        assert!(root.delete_item("y", &cancel).await.unwrap_err().is_not_found());
        assert!(root.delete_item("a/x", &cancel).await.unwrap_err().is_not_found());
        let err = root.delete_item("", &cancel).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_copy_streams_bytes_with_configured_buffer() {
        let cancel = CancellationToken::new();
        let archive = MemoryArchive::with_entries([("src/data.bin", vec![7u8; 1000])]);
        let options = ArchiveOptions { copy_buffer_size: 64, ..ArchiveOptions::default() };
        let tree = ArchiveTree::new(archive.clone(), options);
        let root = tree.root();
        let src = root.folder("src", &cancel).await.unwrap().unwrap();
        let dst = root.create_folder_named("dst", false, &cancel).await.unwrap();
        let file = src.file("data.bin", &cancel).await.unwrap().unwrap();

        let copy = dst.copy_in(file.as_ref(), false, &cancel).await.unwrap();
        assert_eq!(copy.id(), "dst/data.bin");
        assert_eq!(archive.contents("dst/data.bin").unwrap().len(), 1000);
        assert_eq!(archive.contents("src/data.bin").unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn test_copy_keeps_existing_without_overwrite() {
        let cancel = CancellationToken::new();
        let archive = MemoryArchive::with_entries([("a/f", "new"), ("b/f", "old")]);
        let tree = tree(&archive);
        let root = tree.root();
        let a = root.folder("a", &cancel).await.unwrap().unwrap();
        let b = root.folder("b", &cancel).await.unwrap().unwrap();
        let source = a.file("f", &cancel).await.unwrap().unwrap();

        b.copy_in(source.as_ref(), false, &cancel).await.unwrap();
        assert_eq!(&archive.contents("b/f").unwrap()[..], b"old");

        b.copy_in(source.as_ref(), true, &cancel).await.unwrap();
        assert_eq!(&archive.contents("b/f").unwrap()[..], b"new");
    }

    #[tokio::test]
    async fn test_move_conflict_leaves_source() {
        let cancel = CancellationToken::new();
        let archive = MemoryArchive::with_entries([("a/f", "mine"), ("b/f", "theirs")]);
        let tree = tree(&archive);
        let root = tree.root();
        let a = root.folder("a", &cancel).await.unwrap().unwrap();
        let b = root.folder("b", &cancel).await.unwrap().unwrap();
        let file = a.file("f", &cancel).await.unwrap().unwrap();

        let err = b.move_in(file.as_ref(), a.as_ref(), false, &cancel).await.unwrap_err();
        assert!(err.is_already_exists());
        assert!(a.file("f", &cancel).await.unwrap().is_some());
        assert_eq!(&archive.contents("b/f").unwrap()[..], b"theirs");

        let moved = b.move_in(file.as_ref(), a.as_ref(), true, &cancel).await.unwrap();
        assert_eq!(moved.id(), "b/f");
        assert_eq!(archive.paths(), vec!["b/f"]);
        assert_eq!(&archive.contents("b/f").unwrap()[..], b"mine");
    }

    #[tokio::test]
    async fn test_move_within_same_folder_is_noop() {
        let cancel = CancellationToken::new();
        let archive = MemoryArchive::with_entries([("a/f", "data")]);
        let tree = tree(&archive);
        let a = tree.root().folder("a", &cancel).await.unwrap().unwrap();
        let file = a.file("f", &cancel).await.unwrap().unwrap();

        let same = a.move_in(file.as_ref(), a.as_ref(), true, &cancel).await.unwrap();
        assert_eq!(same.id(), "a/f");
        assert_eq!(&archive.contents("a/f").unwrap()[..], b"data");
    }

    #[tokio::test]
    async fn test_capability_operations_use_archive_paths() {
        let cancel = CancellationToken::new();
        let archive = MemoryArchive::with_entries([("a/f", "x")]);
        let tree = tree(&archive);
        let root = tree.root_item();
        let a = capability::get_item(root.as_ref(), "a/", &cancel).await.unwrap();
        let f = capability::get_item(a.as_ref(), "a/f", &cancel).await.unwrap();
        let dest = root.as_modifiable().unwrap().create_folder("z", false, &cancel).await.unwrap();

        let moved = capability::move_file(f.as_ref(), a.as_ref(), dest.as_ref(), false, &cancel)
            .await
            .unwrap();
        assert_eq!(moved.id(), "z/f");
        assert_eq!(archive.paths(), vec!["z/f"]);
    }

    #[tokio::test]
    async fn test_write_through_created_file() {
        let cancel = CancellationToken::new();
        let archive = MemoryArchive::new();
        let tree = tree(&archive);
        let file = tree.root().create_file_named("w.txt", false, &cancel).await.unwrap();
        let mut stream = file.open_stream(AccessMode::ReadWrite, &cancel).await.unwrap();
        stream.write_all(b"hello").await.unwrap();
        stream.flush().await.unwrap();
        assert_eq!(&archive.contents("w.txt").unwrap()[..], b"hello");
    }

    #[tokio::test]
    async fn test_cancelled_mutation_does_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let archive = MemoryArchive::new();
        let tree = tree(&archive);
        let err = tree.root().create_folder_named("x", false, &cancel).await.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
        assert_eq!(archive.open_count(), 0);
    }
}
