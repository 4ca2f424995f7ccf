//! Storage error types.

use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while reading, writing or locking the index.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The index file does not exist (the repository is not initialized).
    #[error("Index not found: {0}")]
    NotFound(String),

    /// The index file already exists.
    #[error("Index already exists: {0}")]
    AlreadyExists(String),

    /// A version record could not be parsed.
    #[error("Malformed version in index: {line:?} ({reason})")]
    MalformedEntry { line: String, reason: String },

    /// The exclusive index lock could not be acquired in time.
    #[error("Timed out after {waited:?} waiting for lock on {path}")]
    LockTimeout { path: String, waited: Duration },

    /// IO error (permission denied, disk full, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata JSON could not be serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    /// Create a not found error for a path.
    pub fn not_found(path: &Path) -> Self {
        Self::NotFound(path.display().to_string())
    }

    /// Create a malformed entry error naming the offending line.
    pub fn malformed(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedEntry {
            line: line.into(),
            reason: reason.into(),
        }
    }
}
