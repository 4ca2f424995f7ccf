//! Error types for the core crate.

use thiserror::Error;
use vio_snapshot::SnapshotError;
use vio_storage::StorageError;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// `init` on a repository whose index already exists.
    #[error("repository already initialized: {0}")]
    AlreadyInitialized(String),

    /// An operation that needs an initialized repository ran without one.
    #[error("uninitialized repository: {0}")]
    NotInitialized(String),

    /// The tracked tree has local modifications.
    #[error("uncommitted changes in repository: {0}")]
    UncommittedChanges(String),

    /// An equal version is already in the index.
    #[error("version {0} already in index")]
    DuplicateVersion(String),

    /// The requested version is not in the index.
    #[error("version not found: {0}")]
    VersionNotFound(String),

    /// The operation exists but has no implementation.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// The version-control tool failed.
    #[error("`{command}` failed: {message}")]
    Vcs { command: String, message: String },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Index error.
    #[error("index error: {0}")]
    Storage(#[from] StorageError),

    /// Snapshot error.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON syntax or shape.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config file not found.
    #[error("config file not found: {path}")]
    NotFound { path: String },

    /// An environment override holds an unusable value.
    #[error("invalid value {value:?} for {name}")]
    InvalidEnv { name: String, value: String },
}

/// The failure conditions callers can act on, independent of the layer that
/// raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyInitialized,
    NotFound,
    UncommittedChanges,
    DuplicateVersion,
    VersionNotFound,
    MalformedEntry,
    SnapshotIo,
    LockTimeout,
    NotImplemented,
    Vcs,
    Config,
    Io,
}

impl CoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::AlreadyInitialized(_) => ErrorKind::AlreadyInitialized,
            CoreError::NotInitialized(_) => ErrorKind::NotFound,
            CoreError::UncommittedChanges(_) => ErrorKind::UncommittedChanges,
            CoreError::DuplicateVersion(_) => ErrorKind::DuplicateVersion,
            CoreError::VersionNotFound(_) => ErrorKind::VersionNotFound,
            CoreError::NotImplemented(_) => ErrorKind::NotImplemented,
            CoreError::Vcs { .. } => ErrorKind::Vcs,
            CoreError::Config(_) => ErrorKind::Config,
            CoreError::Storage(e) => match e {
                StorageError::NotFound(_) => ErrorKind::NotFound,
                StorageError::AlreadyExists(_) => ErrorKind::AlreadyInitialized,
                StorageError::MalformedEntry { .. } => ErrorKind::MalformedEntry,
                StorageError::LockTimeout { .. } => ErrorKind::LockTimeout,
                StorageError::Io(_) | StorageError::Json(_) => ErrorKind::Io,
            },
            CoreError::Snapshot(e) => match e {
                SnapshotError::NotFound(_) => ErrorKind::NotFound,
                SnapshotError::Io { .. } | SnapshotError::Sync { .. } => ErrorKind::SnapshotIo,
            },
            CoreError::Io(_) | CoreError::Json(_) => ErrorKind::Io,
        }
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
