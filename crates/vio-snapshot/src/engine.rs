//! Snapshot creation and restoration.

use crate::{Filter, SnapshotError, SnapshotResult, TreeSync};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};
use vio_storage::Version;

/// Repository-local file listing extra paths to leave out of snapshots.
pub const IGNORE_FILE_NAME: &str = ".vioignore";

/// Version-control metadata directory, never part of a snapshot.
pub const VCS_METADATA_DIR: &str = ".git";

/// Materializes and restores filtered copies of a working tree.
///
/// Snapshots live in a directory per version:
/// ```text
/// snapshot_root/
///   index                   # version index (see vio-storage)
///   <revision>/
///     <epoch_seconds>/      # untracked content at commit time
/// ```
#[derive(Clone)]
pub struct SnapshotEngine {
    /// Root directory of snapshot storage.
    root: PathBuf,

    /// Tool performing the copies.
    sync: Arc<dyn TreeSync>,
}

impl std::fmt::Debug for SnapshotEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotEngine")
            .field("root", &self.root)
            .field("sync", &self.sync.name())
            .finish()
    }
}

impl SnapshotEngine {
    pub fn new(root: impl Into<PathBuf>, sync: Arc<dyn TreeSync>) -> Self {
        Self {
            root: root.into(),
            sync,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the snapshot of `version`.
    pub fn snapshot_dir(&self, version: &Version) -> PathBuf {
        self.root.join(version.snapshot_path())
    }

    /// Whether the snapshot directory of `version` exists.
    pub async fn exists(&self, version: &Version) -> bool {
        is_dir(&self.snapshot_dir(version)).await
    }

    /// Build the exclusion rules for snapshotting `worktree`.
    ///
    /// Excludes every tracked path (matched literally), the version-control
    /// metadata directory and the snapshot root when it lies inside the
    /// working tree. Entries of the ignore file, when one exists, are
    /// patterns.
    pub async fn exclusions(&self, worktree: &Path, tracked: &[String]) -> Filter {
        let mut filter = tracked
            .iter()
            .filter(|path| !path.is_empty())
            .fold(Filter::new(), |filter, path| filter.exclude_path(path))
            .exclude_dir(VCS_METADATA_DIR);

        if let Some(relative) = vio_util::path::relative_inside(&self.root, worktree) {
            filter = filter.exclude_dir(&relative);
        }

        let ignore_file = worktree.join(IGNORE_FILE_NAME);
        if fs::metadata(&ignore_file)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
        {
            filter = filter.exclude_from(ignore_file);
        }

        filter
    }

    /// Snapshot the untracked content of `worktree` for `version`.
    ///
    /// The snapshot directory is created first, then filled by the
    /// synchronizer. A failure leaves at most an unreferenced directory.
    ///
    /// Fails without copying anything when the snapshot directory already
    /// exists, so an existing snapshot is never overwritten.
    pub async fn create(
        &self,
        worktree: &Path,
        version: &Version,
        tracked: &[String],
    ) -> SnapshotResult<PathBuf> {
        let revision_dir = self.root.join(version.revision());
        fs::create_dir_all(&revision_dir)
            .await
            .map_err(|e| SnapshotError::io(&revision_dir, e))?;

        let destination = self.snapshot_dir(version);
        fs::create_dir(&destination).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                warn!(path = %destination.display(), "Snapshot directory already exists");
            }
            SnapshotError::io(&destination, e)
        })?;

        let filter = self.exclusions(worktree, tracked).await;
        debug!(
            version = %version.label(),
            excludes = filter.excludes().len(),
            ignore_file = filter.exclude_file().is_some(),
            "Creating snapshot"
        );

        self.sync.copy(worktree, &destination, &filter).await?;

        info!(
            version = %version.label(),
            path = %destination.display(),
            sync = self.sync.name(),
            "Created snapshot"
        );
        Ok(destination)
    }

    /// Copy the snapshot of `version` on top of `worktree`.
    ///
    /// Files in the working tree that the snapshot does not hold, tracked
    /// files among them, are left untouched.
    pub async fn restore(&self, worktree: &Path, version: &Version) -> SnapshotResult<()> {
        let source = self.snapshot_dir(version);
        if !is_dir(&source).await {
            return Err(SnapshotError::not_found(&source));
        }

        self.sync.copy(&source, worktree, &Filter::new()).await?;

        info!(
            version = %version.label(),
            path = %worktree.display(),
            sync = self.sync.name(),
            "Restored snapshot"
        );
        Ok(())
    }

    /// List the `(revision, epoch_seconds)` pairs present on disk.
    ///
    /// Entries that do not follow the snapshot layout are skipped.
    pub async fn list(&self) -> SnapshotResult<Vec<(String, i64)>> {
        let mut snapshots = Vec::new();

        let mut revisions = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(snapshots),
            Err(e) => return Err(SnapshotError::io(&self.root, e)),
        };

        while let Some(revision) = revisions
            .next_entry()
            .await
            .map_err(|e| SnapshotError::io(&self.root, e))?
        {
            if !revision
                .file_type()
                .await
                .map_err(|e| SnapshotError::io(&revision.path(), e))?
                .is_dir()
            {
                continue;
            }
            let revision_name = revision.file_name().to_string_lossy().to_string();

            let mut stamps = fs::read_dir(revision.path())
                .await
                .map_err(|e| SnapshotError::io(&revision.path(), e))?;
            while let Some(stamp) = stamps
                .next_entry()
                .await
                .map_err(|e| SnapshotError::io(&revision.path(), e))?
            {
                if let Ok(seconds) = stamp.file_name().to_string_lossy().parse::<i64>() {
                    snapshots.push((revision_name.clone(), seconds));
                }
            }
        }

        snapshots.sort();
        Ok(snapshots)
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}
