//! # stowfs core
//!
//! A uniform "addressable storage" abstraction: files and folders with stable ids, parent links
//! and enumeration, implemented by heterogeneous backends.
//!
//! ## Basic Usage
//!
//! ```rust,ignore
//! use stowfs_core::resolver::resolve_or_create;
//! use stowfs_core::types::ItemKind;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn example(root: stowfs_core::traits::ItemRef) -> stowfs_core::error::Result<()> {
//!     let cancel = CancellationToken::new();
//!     // Creates folders `reports` and `2024` on the way if they are missing.
//!     let file =
//!         resolve_or_create(root, "reports/2024/q1.csv", ItemKind::File, false, &cancel).await?;
//!     println!("created {}", file.id());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`path`]: id normalization (folders end with one separator, files never do)
//! - [`traits`]: the minimal item contract and the optional specialized capabilities
//! - [`capability`]: probe-then-fallback public operations (get, copy, move, root)
//! - [`resolver`]: relative-path walking that creates missing folders and files
//! - [`stream`]: file streams and the shared copy routine
//! - [`error`]: error taxonomy
//!
//! Backends live in separate crates; `stowfs-archive` provides the archive-backed tree.

pub mod capability;
pub mod error;
pub mod path;
pub mod resolver;
pub mod stream;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{check_cancelled, Result, StoreError};
pub use traits::ItemRef;
pub use types::{AccessMode, ItemFilter, ItemKind};
