//! Capability probe with generic fallback.
//!
//! Each public operation here probes its target for the matching specialized capability and
//! delegates to it when present. Otherwise it runs a fallback written only against the minimal
//! contract: enumeration, streams, create and delete. Both paths share overwrite semantics:
//! copying onto an existing file without `overwrite` returns the existing file untouched, and
//! moving onto one fails with [`StoreError::AlreadyExists`].

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{check_cancelled, Result, StoreError};
use crate::stream::{copy_stream, DEFAULT_COPY_BUFFER_SIZE};
use crate::traits::{ItemRef, ModifiableFolder, StorageFile, StorageFolder, StorageItem};
use crate::types::{AccessMode, ItemFilter};

/// Runs `fast` with the probed capability, or `fallback` when the target lacks it.
pub async fn probe_or_fallback<'a, C, T, Fast, FastFut, Fallback, FallbackFut>(
    operation: &'static str,
    capability: Option<&'a C>,
    fast: Fast,
    fallback: Fallback,
) -> Result<T>
where
    C: ?Sized + 'a,
    Fast: FnOnce(&'a C) -> FastFut,
    FastFut: Future<Output = Result<T>>,
    Fallback: FnOnce() -> FallbackFut,
    FallbackFut: Future<Output = Result<T>>,
{
    match capability {
        Some(capability) => {
            trace!(operation, "using specialized capability");
            fast(capability).await
        }
        None => {
            trace!(operation, "capability missing, running generic fallback");
            fallback().await
        }
    }
}

/// Finds the direct child of `folder` whose id equals `id`.
pub async fn get_item(
    folder: &dyn StorageItem,
    id: &str,
    cancel: &CancellationToken,
) -> Result<ItemRef> {
    check_cancelled(cancel)?;
    probe_or_fallback(
        "get-item",
        folder.as_item_lookup(),
        |lookup| lookup.get_item(id, cancel),
        || scan_children(folder, id, |child| child.id() == id, cancel),
    )
    .await
}

/// Finds the direct child of `folder` named `name`.
pub async fn get_item_by_name(
    folder: &dyn StorageItem,
    name: &str,
    cancel: &CancellationToken,
) -> Result<ItemRef> {
    check_cancelled(cancel)?;
    probe_or_fallback(
        "get-item-by-name",
        folder.as_name_lookup(),
        |lookup| lookup.get_item_by_name(name, cancel),
        || scan_children(folder, name, |child| child.name() == name, cancel),
    )
    .await
}

/// Finds any descendant of `folder` whose id equals `id`.
pub async fn get_item_recursive(
    folder: &dyn StorageItem,
    id: &str,
    cancel: &CancellationToken,
) -> Result<ItemRef> {
    check_cancelled(cancel)?;
    probe_or_fallback(
        "get-recursive-item",
        folder.as_recursive_lookup(),
        |lookup| lookup.get_item_recursive(id, cancel),
        || fallback_recursive(folder, id, cancel),
    )
    .await
}

/// Copies the file `source` into `destination`, keeping its name.
pub async fn copy_file(
    source: &dyn StorageItem,
    destination: &dyn StorageItem,
    overwrite: bool,
    cancel: &CancellationToken,
) -> Result<ItemRef> {
    check_cancelled(cancel)?;
    probe_or_fallback(
        "copy-file",
        destination.as_file_copy(),
        |copy| copy.copy_file_in(source, overwrite, cancel),
        || fallback_copy(source, destination, overwrite, cancel),
    )
    .await
}

/// Moves the file `source` out of `source_folder` into `destination`.
///
/// The source is only deleted after the copy completed.
pub async fn move_file(
    source: &dyn StorageItem,
    source_folder: &dyn StorageItem,
    destination: &dyn StorageItem,
    overwrite: bool,
    cancel: &CancellationToken,
) -> Result<ItemRef> {
    check_cancelled(cancel)?;
    probe_or_fallback(
        "move-file",
        destination.as_file_move(),
        |mv| mv.move_file_in(source, source_folder, overwrite, cancel),
        || fallback_move(source, source_folder, destination, overwrite, cancel),
    )
    .await
}

/// Returns the root of the tree containing `item`.
pub async fn get_root(item: &ItemRef, cancel: &CancellationToken) -> Result<ItemRef> {
    check_cancelled(cancel)?;
    probe_or_fallback(
        "get-root",
        item.as_root_lookup(),
        |lookup| lookup.root(cancel),
        || fallback_root(item, cancel),
    )
    .await
}

async fn scan_children<P>(
    folder: &dyn StorageItem,
    key: &str,
    predicate: P,
    cancel: &CancellationToken,
) -> Result<ItemRef>
where
    P: Fn(&ItemRef) -> bool,
{
    let children = require_folder(folder)?.children(ItemFilter::All, cancel).await?;
    find_child(children, predicate, cancel)?.ok_or_else(|| StoreError::not_found(key))
}

async fn fallback_recursive(
    folder: &dyn StorageItem,
    id: &str,
    cancel: &CancellationToken,
) -> Result<ItemRef> {
    let mut pending = require_folder(folder)?.children(ItemFilter::All, cancel).await?;
    while let Some(item) = pending.pop() {
        check_cancelled(cancel)?;
        if item.id() == id {
            return Ok(item);
        }
        if let Some(sub) = item.as_folder() {
            pending.extend(sub.children(ItemFilter::All, cancel).await?);
        }
    }
    Err(StoreError::not_found(id))
}

async fn fallback_copy(
    source: &dyn StorageItem,
    destination: &dyn StorageItem,
    overwrite: bool,
    cancel: &CancellationToken,
) -> Result<ItemRef> {
    let file = require_file(source)?;
    let target = require_modifiable(destination)?;
    copy_into(file, target, overwrite, cancel).await
}

async fn fallback_move(
    source: &dyn StorageItem,
    source_folder: &dyn StorageItem,
    destination: &dyn StorageItem,
    overwrite: bool,
    cancel: &CancellationToken,
) -> Result<ItemRef> {
    let file = require_file(source)?;
    let origin = require_modifiable(source_folder)?;
    let target = require_modifiable(destination)?;

    if source_folder.id() == destination.id() {
        return child_named(target, file.name(), cancel)
            .await?
            .ok_or_else(|| StoreError::not_found(source.id()));
    }
    if !overwrite && child_named(target, file.name(), cancel).await?.is_some() {
        return Err(StoreError::already_exists(file.name()));
    }
    let moved = copy_into(file, target, overwrite, cancel).await?;
    origin.delete(source, cancel).await?;
    Ok(moved)
}

async fn fallback_root(item: &ItemRef, cancel: &CancellationToken) -> Result<ItemRef> {
    let mut current = item.clone();
    loop {
        check_cancelled(cancel)?;
        let parent = match current.as_child() {
            Some(child) => child.parent(cancel).await?,
            None => return Ok(current),
        };
        current = parent;
    }
}

async fn copy_into(
    source: &dyn StorageFile,
    destination: &dyn ModifiableFolder,
    overwrite: bool,
    cancel: &CancellationToken,
) -> Result<ItemRef> {
    if let Some(existing) = child_named(destination, source.name(), cancel).await? {
        if !overwrite {
            return Ok(existing);
        }
    }
    let created = destination.create_file(source.name(), overwrite, cancel).await?;
    let target = require_file(created.as_ref())?;

    let mut input = source.open_stream(AccessMode::Read, cancel).await?;
    let mut output = target.open_stream(AccessMode::ReadWrite, cancel).await?;
    copy_stream(&mut input, &mut output, DEFAULT_COPY_BUFFER_SIZE, cancel).await?;
    Ok(created)
}

async fn child_named(
    folder: &dyn ModifiableFolder,
    name: &str,
    cancel: &CancellationToken,
) -> Result<Option<ItemRef>> {
    let children = folder.children(ItemFilter::All, cancel).await?;
    find_child(children, |child| child.name() == name, cancel)
}

fn find_child<P>(
    children: Vec<ItemRef>,
    predicate: P,
    cancel: &CancellationToken,
) -> Result<Option<ItemRef>>
where
    P: Fn(&ItemRef) -> bool,
{
    for child in children {
        check_cancelled(cancel)?;
        if predicate(&child) {
            return Ok(Some(child));
        }
    }
    Ok(None)
}

pub(crate) fn require_folder(item: &dyn StorageItem) -> Result<&dyn StorageFolder> {
    item.as_folder()
        .ok_or_else(|| StoreError::invalid_argument(item.id(), "item is not a folder"))
}

pub(crate) fn require_file(item: &dyn StorageItem) -> Result<&dyn StorageFile> {
    item.as_file()
        .ok_or_else(|| StoreError::invalid_argument(item.id(), "item is not a file"))
}

pub(crate) fn require_modifiable(item: &dyn StorageItem) -> Result<&dyn ModifiableFolder> {
    if item.as_folder().is_none() {
        return Err(StoreError::invalid_argument(item.id(), "item is not a folder"));
    }
    item.as_modifiable()
        .ok_or_else(|| StoreError::unsupported(format!("modify read-only folder '{}'", item.id())))
}
