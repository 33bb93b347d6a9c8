//! Error types for transfer operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type for transfer operations
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors that can occur while inspecting or transferring an item
#[derive(Debug, Error)]
pub enum TransferError {
    /// Filesystem operation failed on a specific path
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Directory traversal failed
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    /// Registry log holds no usable record where one is required
    #[error("Registry error: {0}")]
    Registry(String),

    /// Publisher metadata is missing or unreadable
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Another run holds the item's registry lock
    #[error("Item is locked by another transfer run: {path}")]
    Locked { path: PathBuf },

    /// Item directory is not usable as an item
    #[error("Invalid item directory: {0}")]
    InvalidItem(String),
}

impl TransferError {
    /// Wraps an I/O error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<quick_xml::Error> for TransferError {
    fn from(err: quick_xml::Error) -> Self {
        TransferError::Metadata(err.to_string())
    }
}
