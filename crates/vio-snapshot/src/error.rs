//! Snapshot error types.

use std::path::Path;
use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Snapshot directory not found.
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// Creating or reading snapshot storage failed.
    #[error("Snapshot IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The tree synchronizer could not be run or reported failure.
    #[error("{tool} failed: {message}")]
    Sync { tool: String, message: String },
}

impl SnapshotError {
    /// Create a not found error for a snapshot directory.
    pub fn not_found(path: &Path) -> Self {
        Self::NotFound(path.display().to_string())
    }

    /// Wrap an IO error with the path it happened at.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Create a synchronizer failure.
    pub fn sync(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sync {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn snapshot_error_not_found_formats_path() {
        let err = SnapshotError::not_found(Path::new("/snaps/abc/17"));
        assert_eq!(err.to_string(), "Snapshot not found: /snaps/abc/17");
    }

    #[test]
    fn snapshot_error_io_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = SnapshotError::io(Path::new("/snaps"), io_err);
        assert!(err.to_string().starts_with("Snapshot IO error at /snaps"));
        assert!(StdError::source(&err).is_some());
    }

    #[test]
    fn snapshot_error_sync_names_tool() {
        let err = SnapshotError::sync("rsync", "exit status 23");
        assert_eq!(err.to_string(), "rsync failed: exit status 23");
    }
}
