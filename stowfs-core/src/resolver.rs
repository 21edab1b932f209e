//! Relative-path resolution and creation.
//!
//! A relative path is walked one segment at a time from a starting item. `.` is skipped, `..`
//! ascends through [`ChildItem::parent`], and every other folder segment goes through
//! [`ModifiableFolder::create_folder`], so missing folders are materialized on the way. In
//! file mode the last segment is created with [`ModifiableFolder::create_file`].

use futures::{pin_mut, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::capability::require_modifiable;
use crate::error::{check_cancelled, Result, StoreError};
use crate::path::{looks_like_file, normalize_separators, split_segments, SEPARATOR};
use crate::traits::ItemRef;
use crate::types::ItemKind;

/// The folder segments to walk and the optional terminal file name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathPlan {
    folders: Vec<String>,
    file: Option<String>,
}

impl PathPlan {
    fn new(path: &str, kind: ItemKind, skip_file_like_tail: bool) -> Result<Self> {
        let normalized = normalize_separators(path);
        let mut segments: Vec<String> =
            split_segments(&normalized).into_iter().map(str::to_string).collect();

        match kind {
            ItemKind::File => {
                if normalized.ends_with(SEPARATOR) {
                    return Err(StoreError::invalid_argument(
                        path,
                        "file path must not end with a separator",
                    ));
                }
                let file = match segments.pop() {
                    Some(name) if name != "." && name != ".." => name,
                    _ => return Err(StoreError::invalid_argument(path, "file name is required")),
                };
                Ok(Self { folders: segments, file: Some(file) })
            }
            ItemKind::Folder => {
                if skip_file_like_tail && segments.last().is_some_and(|s| looks_like_file(s)) {
                    segments.pop();
                }
                Ok(Self { folders: segments, file: None })
            }
        }
    }
}

/// Walks `path` from `start`, creating missing folders (and the file in file mode), and
/// yields every visited or created item in traversal order.
///
/// In folder mode a last segment that looks like a file name (`report.txt`) is ignored, so
/// callers can pass a file path and get its folders created. Failures surface at the
/// offending segment; items already yielded stay valid.
pub fn create_along_path(
    start: ItemRef,
    path: &str,
    kind: ItemKind,
    overwrite: bool,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<ItemRef>> + Send {
    let plan = PathPlan::new(path, kind, true);
    walk(start, plan, overwrite, cancel)
}

/// Resolves `path` from `start`, creating what is missing, and returns the terminal item.
///
/// An empty folder path resolves to the starting folder.
#[instrument(skip(start, cancel), fields(start = %start.id()))]
pub async fn resolve_or_create(
    start: ItemRef,
    path: &str,
    kind: ItemKind,
    overwrite: bool,
    cancel: &CancellationToken,
) -> Result<ItemRef> {
    check_cancelled(cancel)?;
    let origin = starting_folder(start, cancel).await?;
    let plan = PathPlan::new(path, kind, false);

    let steps = walk(origin.clone(), plan, overwrite, cancel.clone());
    pin_mut!(steps);
    let mut last = origin;
    while let Some(item) = steps.next().await {
        last = item?;
    }
    debug!(id = %last.id(), "path resolved");
    Ok(last)
}

/// Builds the relative path from `from` down to `to` by ascending `to`'s parents.
///
/// Folder targets end with a separator; file targets do not. Fails with
/// [`StoreError::NotFound`] when `from` is not an ancestor of `to`.
pub async fn relative_path(
    from: &ItemRef,
    to: &ItemRef,
    cancel: &CancellationToken,
) -> Result<String> {
    let mut names = Vec::new();
    let mut current = to.clone();
    while current.id() != from.id() {
        check_cancelled(cancel)?;
        names.push(current.name().to_string());
        let parent = match current.as_child() {
            Some(child) => child.parent(cancel).await?,
            None => {
                return Err(StoreError::not_found(format!(
                    "'{}' is not below '{}'",
                    to.id(),
                    from.id()
                )))
            }
        };
        current = parent;
    }

    names.reverse();
    let mut path = names.join("/");
    if to.kind().is_folder() && !path.is_empty() {
        path.push(SEPARATOR);
    }
    Ok(path)
}

/// Folders start where they are; any other item starts from its parent.
async fn starting_folder(start: ItemRef, cancel: &CancellationToken) -> Result<ItemRef> {
    if start.as_folder().is_some() {
        return Ok(start);
    }
    match start.as_child() {
        Some(child) => child.parent(cancel).await,
        None => Err(StoreError::invalid_argument(
            start.id(),
            "start must be a folder or an item with a parent",
        )),
    }
}

fn walk(
    start: ItemRef,
    plan: Result<PathPlan>,
    overwrite: bool,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<ItemRef>> + Send {
    async_stream::try_stream! {
        let plan = plan?;
        let mut current = starting_folder(start, &cancel).await?;

        for segment in plan.folders {
            check_cancelled(&cancel)?;
            let next = match segment.as_str() {
                "." => continue,
                ".." => match current.as_child() {
                    Some(child) => child.parent(&cancel).await?,
                    None => Err(StoreError::invalid_argument(
                        segment.clone(),
                        format!("'{}' has no parent", current.id()),
                    ))?,
                },
                name => {
                    require_modifiable(current.as_ref())?
                        .create_folder(name, overwrite, &cancel)
                        .await?
                }
            };
            current = next;
            yield current.clone();
        }

        if let Some(name) = plan.file {
            check_cancelled(&cancel)?;
            let file = require_modifiable(current.as_ref())?
                .create_file(&name, overwrite, &cancel)
                .await?;
            yield file;
        }
    }
}
