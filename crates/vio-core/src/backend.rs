//! Backend abstraction.
//!
//! A backend owns the lifecycle of one repository's snapshot storage:
//! `Uninitialized -> Initialized`, then any number of commits and checkouts.

use crate::config::{BackendKind, Config};
use crate::error::CoreResult;
use crate::posix::PosixBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use vio_storage::{Metadata, Version};

/// Repository status as reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Status {
    /// Everything the backend knows about is in the index.
    Committed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Committed => "committed",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing the index with the snapshots present on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Consistency {
    /// Indexed versions whose snapshot directory is missing.
    pub missing: Vec<Version>,

    /// Snapshot directories, as `(revision, epoch_seconds)`, that no index
    /// entry references.
    pub orphaned: Vec<(String, i64)>,
}

impl Consistency {
    /// Every indexed version has its snapshot.
    ///
    /// Orphans do not count: they are what an interrupted commit leaves.
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Snapshot storage for one repository.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Kind of this backend.
    fn kind(&self) -> BackendKind;

    /// Create the snapshot root and an empty index.
    async fn init(&self) -> CoreResult<()>;

    /// Check that the backend has been initialized.
    async fn open(&self) -> CoreResult<()>;

    /// Whether the index exists.
    async fn is_initialized(&self) -> bool;

    async fn status(&self) -> CoreResult<Status>;

    /// Snapshot the untracked content of the working tree as a new version.
    async fn commit(&self, metadata: Metadata) -> CoreResult<Version> {
        self.commit_at(metadata, Utc::now()).await
    }

    /// Like [`Backend::commit`], stamping the version with `timestamp`.
    async fn commit_at(&self, metadata: Metadata, timestamp: DateTime<Utc>)
        -> CoreResult<Version>;

    /// Restore the snapshot of `version` into the working tree.
    async fn checkout(&self, version: &Version) -> CoreResult<()>;

    async fn diff(&self, from: &Version, to: &Version, path: &Path) -> CoreResult<String>;

    /// All committed versions, oldest first.
    async fn versions(&self) -> CoreResult<Vec<Version>>;

    /// Compare the index with the snapshots on disk.
    async fn verify(&self) -> CoreResult<Consistency>;
}

/// Build the backend selected by `config` for the repository at `root`.
pub fn instantiate_backend(config: &Config, root: &Path) -> CoreResult<Box<dyn Backend>> {
    match config.backend {
        BackendKind::Posix => Ok(Box::new(PosixBackend::from_config(root, config))),
    }
}
