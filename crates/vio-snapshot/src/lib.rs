//! Snapshot engine for vio.
//!
//! A snapshot is a filtered copy of a working tree, stored under
//! `{snapshot_root}/{revision}/{epoch_seconds}/`. Tracked files, the
//! version-control metadata directory and entries of the repository's
//! `.vioignore` file are left out, so a snapshot holds only untracked content.
//!
//! The copy itself is delegated to a [`TreeSync`] implementation:
//! - [`Rsync`]: runs the external `rsync` tool
//! - [`LocalSync`]: an in-process recursive copy
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use vio_snapshot::{Rsync, SnapshotEngine};
//! use vio_storage::{Metadata, Version};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SnapshotEngine::new("/project/.snapshots", Arc::new(Rsync::default()));
//! let version = Version::new("3f2a9c1", Metadata::new())?;
//!
//! let tracked = vec!["README.md".to_string(), "src/main.rs".to_string()];
//! engine.create(Path::new("/project"), &version, &tracked).await?;
//!
//! // ... later, bring the untracked files back ...
//! engine.restore(Path::new("/project"), &version).await?;
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod sync;

pub use engine::{SnapshotEngine, IGNORE_FILE_NAME, VCS_METADATA_DIR};
pub use error::{SnapshotError, SnapshotResult};
pub use sync::{Filter, LocalSync, Rsync, TreeSync};
