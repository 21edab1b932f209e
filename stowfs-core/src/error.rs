//! Error types for stowfs operations.

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Error type shared by every addressable backend and the generic operations built on them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Id, name or path does not resolve to an existing item.
    #[error("Item not found: {id}")]
    NotFound {
        id: String
    },

    /// Creation requested without overwrite against an existing item.
    #[error("Item already exists: {id}")]
    AlreadyExists {
        id: String
    },

    /// Malformed path segment, empty name, trailing separator on a file target, etc.
    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument {
        argument: String,
        reason: String
    },

    /// The caller's cancellation token fired.
    #[error("Operation cancelled")]
    Cancelled,

    /// Operation not available on this item, archive mode or stream.
    #[error("Unsupported operation: {operation}")]
    Unsupported {
        operation: String
    },

    /// I/O error from a backend stream.
    #[error("I/O error")]
    Io {
        #[from]
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn not_found(id: impl Into<String>) -> Self {
        StoreError::NotFound { id: id.into() }
    }

    pub fn already_exists(id: impl Into<String>) -> Self {
        StoreError::AlreadyExists { id: id.into() }
    }

    pub fn invalid_argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        StoreError::Unsupported { operation: operation.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}

/// Result type alias for stowfs operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Fails with [`StoreError::Cancelled`] once the token has fired.
pub fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(StoreError::Cancelled)
    } else {
        Ok(())
    }
}
