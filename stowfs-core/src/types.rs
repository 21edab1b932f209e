use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Whether an item is a file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    File,
    Folder,
}

impl ItemKind {
    pub fn is_folder(&self) -> bool {
        matches!(self, ItemKind::Folder)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::File => write!(f, "file"),
            ItemKind::Folder => write!(f, "folder"),
        }
    }
}

/// Selects which children an enumeration returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemFilter {
    Files,
    Folders,
    All,
}

impl ItemFilter {
    /// Returns true if items of `kind` pass this filter.
    pub fn accepts(&self, kind: ItemKind) -> bool {
        match self {
            ItemFilter::All => true,
            ItemFilter::Files => kind == ItemKind::File,
            ItemFilter::Folders => kind == ItemKind::Folder,
        }
    }
}

impl FromStr for ItemFilter {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "files" | "file" => Ok(ItemFilter::Files),
            "folders" | "folder" => Ok(ItemFilter::Folders),
            "all" | "*" => Ok(ItemFilter::All),
            _ => Err(StoreError::invalid_argument(s, "unsupported type filter")),
        }
    }
}

/// How a file stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

impl AccessMode {
    pub fn is_write(&self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }
}
