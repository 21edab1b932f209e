//! Configuration types for archive-backed trees.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stowfs_core::stream::DEFAULT_COPY_BUFFER_SIZE;
use stowfs_core::StoreError;

/// How the archive is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveMode {
    /// Entries can be listed and read; every mutation fails with `Unsupported`.
    ReadOnly,
    /// Entries can be created and deleted.
    #[default]
    Update,
}

impl ArchiveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveMode::ReadOnly => "read-only",
            ArchiveMode::Update => "update",
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, ArchiveMode::Update)
    }
}

impl fmt::Display for ArchiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ArchiveMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read-only" | "readonly" | "read" => Ok(ArchiveMode::ReadOnly),
            "update" | "read-write" | "readwrite" => Ok(ArchiveMode::Update),
            _ => Err(format!("Unknown archive mode: {}", s)),
        }
    }
}

/// Options for an [`crate::ArchiveTree`].
///
/// The separator is always `/`; codecs using another separator must translate entry paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveOptions {
    /// Mode the archive is opened in
    pub mode: ArchiveMode,

    /// Chunk size used when copying entry streams
    pub copy_buffer_size: usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            mode: ArchiveMode::Update,
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
        }
    }
}

impl ArchiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for browsing an archive without modifying it.
    pub fn read_only() -> Self {
        Self {
            mode: ArchiveMode::ReadOnly,
            ..Self::default()
        }
    }

    /// Parses options from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| StoreError::invalid_argument("archive options", e.to_string()))?;
        options.validate().map_err(|errors| {
            StoreError::invalid_argument("archive options", errors.join("; "))
        })?;
        Ok(options)
    }

    /// Validates the options.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.copy_buffer_size == 0 {
            errors.push("copy_buffer_size must be greater than zero".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Builder for [`ArchiveOptions`].
#[derive(Debug, Clone, Default)]
pub struct ArchiveOptionsBuilder {
    options: ArchiveOptions,
}

impl ArchiveOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ArchiveMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn with_copy_buffer_size(mut self, bytes: usize) -> Self {
        self.options.copy_buffer_size = bytes;
        self
    }

    /// Validates and returns the options.
    pub fn build(self) -> Result<ArchiveOptions, StoreError> {
        self.options.validate().map_err(|errors| {
            StoreError::invalid_argument("archive options", errors.join("; "))
        })?;
        Ok(self.options)
    }
}
