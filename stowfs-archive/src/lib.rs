//! # stowfs archive
//!
//! Archive-backed hierarchical view over a flat list of path-named entries.
//!
//! An archive only knows entries such as `a/b/c`. This crate rebuilds the folder tree from
//! those paths on demand, keeps each virtual folder node stable across lookups, and emulates
//! folder creation, recursive delete, copy and move on top of the four entry primitives a
//! codec provides.
//!
//! ## Basic Usage
//!
//! ```rust,ignore
//! use stowfs_archive::{ArchiveOptions, ArchiveTree, MemoryArchive};
//! use stowfs_core::resolver::resolve_or_create;
//! use stowfs_core::ItemKind;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> stowfs_core::Result<()> {
//! let cancel = CancellationToken::new();
//! let tree = ArchiveTree::new(MemoryArchive::new(), ArchiveOptions::default());
//!
//! let root = tree.root_item();
//! let file = resolve_or_create(root, "logs/today.txt", ItemKind::File, false, &cancel).await?;
//! assert_eq!(file.id(), "logs/today.txt");
//!
//! tree.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`codec`]: the entry-level interface implemented by archive formats
//! - [`handle`]: the lazily opened archive shared by every node of a tree
//! - [`classifier`]: direct-child and descendant tests on normalized paths
//! - [`materializer`]: virtual folder discovery and the per-folder node cache
//! - [`folder`] / [`file`]: the node types, implementing the `stowfs-core` traits
//! - [`tree`]: the owner that creates the root and closes the archive
//! - [`memory`]: an in-memory codec

pub mod classifier;
pub mod codec;
pub mod config;
pub mod file;
pub mod folder;
pub mod handle;
pub mod materializer;
pub mod memory;
pub mod tree;

pub use codec::{ArchiveCodec, ArchiveEntry, ArchiveSource};
pub use config::{ArchiveMode, ArchiveOptions, ArchiveOptionsBuilder};
pub use file::ArchiveFile;
pub use folder::ArchiveFolder;
pub use handle::ArchiveHandle;
pub use memory::MemoryArchive;
pub use tree::ArchiveTree;
