//! Backend storing snapshots as plain directories on the local file system.

use crate::backend::{Backend, Consistency, Status};
use crate::config::{BackendKind, Config, SynchronizerKind};
use crate::error::{CoreError, CoreResult};
use crate::vcs::{GitCli, Vcs};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use vio_snapshot::{LocalSync, Rsync, SnapshotEngine, TreeSync};
use vio_storage::{IndexStore, Metadata, StorageError, Version};
use vio_util::TimingGuard;

/// POSIX backend.
///
/// The index lives at `<snapshots>/index`, next to the per-version snapshot
/// directories.
pub struct PosixBackend {
    repo_path: PathBuf,
    engine: SnapshotEngine,
    vcs: Arc<dyn Vcs>,
    lock_timeout: Duration,
}

impl std::fmt::Debug for PosixBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosixBackend")
            .field("repo_path", &self.repo_path)
            .field("engine", &self.engine)
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}

impl PosixBackend {
    pub fn new(
        repo_path: impl Into<PathBuf>,
        snapshots_path: impl Into<PathBuf>,
        sync: Arc<dyn TreeSync>,
        vcs: Arc<dyn Vcs>,
    ) -> Self {
        Self {
            repo_path: repo_path.into(),
            engine: SnapshotEngine::new(snapshots_path, sync),
            vcs,
            lock_timeout: Config::default().lock_timeout(),
        }
    }

    /// Backend for the repository at `root` using `git` and the configured
    /// synchronizer.
    pub fn from_config(root: &Path, config: &Config) -> Self {
        let sync: Arc<dyn TreeSync> = match config.synchronizer {
            SynchronizerKind::Rsync => Arc::new(Rsync::default()),
            SynchronizerKind::Local => Arc::new(LocalSync),
        };
        Self::new(
            root,
            config.snapshots_dir(root),
            sync,
            Arc::new(GitCli::default()),
        )
        .with_lock_timeout(config.lock_timeout())
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn snapshots_path(&self) -> &Path {
        self.engine.root()
    }

    pub fn index_path(&self) -> PathBuf {
        self.engine.root().join(IndexStore::FILE_NAME)
    }

    async fn index(&self) -> CoreResult<IndexStore> {
        IndexStore::open(self.index_path())
            .await
            .map_err(|e| match e {
                StorageError::NotFound(path) => CoreError::NotInitialized(path),
                other => other.into(),
            })
    }

    async fn ensure_clean(&self) -> CoreResult<()> {
        if !self.vcs.is_clean(&self.repo_path).await? {
            return Err(CoreError::UncommittedChanges(
                self.repo_path.display().to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for PosixBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Posix
    }

    async fn init(&self) -> CoreResult<()> {
        let index_path = self.index_path();
        if IndexStore::exists(&index_path).await {
            return Err(CoreError::AlreadyInitialized(
                index_path.display().to_string(),
            ));
        }

        tokio::fs::create_dir_all(self.engine.root()).await?;
        IndexStore::create(&index_path).await.map_err(|e| match e {
            StorageError::AlreadyExists(path) => CoreError::AlreadyInitialized(path),
            other => other.into(),
        })?;

        info!(
            repo = %self.repo_path.display(),
            snapshots = %self.engine.root().display(),
            "Initialized repository"
        );
        Ok(())
    }

    async fn open(&self) -> CoreResult<()> {
        self.index().await.map(|_| ())
    }

    async fn is_initialized(&self) -> bool {
        IndexStore::exists(&self.index_path()).await
    }

    async fn status(&self) -> CoreResult<Status> {
        self.index().await?;
        Ok(Status::Committed)
    }

    async fn commit_at(
        &self,
        metadata: Metadata,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Version> {
        let _timing = TimingGuard::operation("commit").with_detail(self.repo_path.display());
        let index = self.index().await?;

        self.ensure_clean().await?;
        let revision = self.vcs.current_revision(&self.repo_path).await?;
        let tracked = self.vcs.tracked_files(&self.repo_path).await?;
        let version = Version::at(revision, timestamp, metadata)?;
        debug!(version = %version.label(), tracked = tracked.len(), "Committing");

        let (index, candidate, tracked) = (&index, &version, &tracked);
        index
            .with_exclusive_lock(self.lock_timeout, move || async move {
                if index.contains(candidate).await? {
                    return Err(CoreError::DuplicateVersion(candidate.to_string()));
                }

                // Snapshot before append: a crash in between leaves an
                // orphaned directory, never an entry without data.
                self.engine
                    .create(&self.repo_path, candidate, tracked)
                    .await?;
                index.append(candidate).await?;
                Ok::<_, CoreError>(())
            })
            .await?;

        info!(version = %version, "Committed version");
        Ok(version)
    }

    async fn checkout(&self, version: &Version) -> CoreResult<()> {
        let _timing = TimingGuard::operation("checkout").with_detail(version.label());
        let index = self.index().await?;

        self.ensure_clean().await?;

        let index = &index;
        index
            .with_exclusive_lock(self.lock_timeout, move || async move {
                if !index.contains(version).await? {
                    return Err(CoreError::VersionNotFound(version.to_string()));
                }
                self.engine.restore(&self.repo_path, version).await?;
                Ok::<_, CoreError>(())
            })
            .await?;

        info!(version = %version, "Checked out version");
        Ok(())
    }

    async fn diff(&self, _from: &Version, _to: &Version, _path: &Path) -> CoreResult<String> {
        Err(CoreError::NotImplemented("diff"))
    }

    async fn versions(&self) -> CoreResult<Vec<Version>> {
        Ok(self.index().await?.read_all().await?)
    }

    async fn verify(&self) -> CoreResult<Consistency> {
        let versions = self.index().await?.read_all().await?;
        let on_disk = self.engine.list().await?;

        let missing: Vec<Version> = versions
            .iter()
            .filter(|v| {
                !on_disk
                    .iter()
                    .any(|(rev, epoch)| rev == v.revision() && *epoch == v.epoch_seconds())
            })
            .cloned()
            .collect();

        let orphaned: Vec<(String, i64)> = on_disk
            .into_iter()
            .filter(|(rev, epoch)| {
                !versions
                    .iter()
                    .any(|v| v.revision() == rev && v.epoch_seconds() == *epoch)
            })
            .collect();

        for version in &missing {
            warn!(version = %version.label(), "Indexed version has no snapshot");
        }
        for (revision, epoch) in &orphaned {
            debug!(%revision, epoch, "Snapshot directory not referenced by the index");
        }

        Ok(Consistency { missing, orphaned })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::vcs::testing::FakeVcs;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        vcs: Arc<FakeVcs>,
        backend: PosixBackend,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let vcs = Arc::new(FakeVcs::new("abc1234", &["README", ".vioignore"]));
            let backend = PosixBackend::new(
                dir.path(),
                dir.path().join(".snapshots"),
                Arc::new(LocalSync),
                vcs.clone(),
            )
            .with_lock_timeout(Duration::from_millis(200));
            fs::write(dir.path().join("README"), "tracked").unwrap();
            Self { dir, vcs, backend }
        }

        async fn initialized() -> Self {
            let fixture = Self::new();
            fixture.backend.init().await.unwrap();
            fixture
        }

        fn path(&self, relative: &str) -> PathBuf {
            self.dir.path().join(relative)
        }
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_init() {
        let fixture = Fixture::new();
        assert!(!fixture.backend.is_initialized().await);

        fixture.backend.init().await.unwrap();
        assert!(fixture.backend.is_initialized().await);
        assert!(fixture.backend.versions().await.unwrap().is_empty());
        assert_eq!(fixture.backend.status().await.unwrap(), Status::Committed);
        fixture.backend.open().await.unwrap();

        let err = fixture.backend.init().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyInitialized);
    }

    #[tokio::test]
    async fn test_uninitialized() {
        let fixture = Fixture::new();

        let err = fixture.backend.open().await.unwrap_err();
        assert!(matches!(err, CoreError::NotInitialized(_)));

        let err = fixture.backend.commit(Metadata::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotInitialized(_)));
        assert!(fixture.backend.status().await.is_err());
    }

    #[tokio::test]
    async fn test_commit_snapshots_untracked_files() {
        let fixture = Fixture::initialized().await;
        fs::write(fixture.path("bar"), "yeah").unwrap();
        fs::create_dir_all(fixture.path("out")).unwrap();
        fs::write(fixture.path("out/toz"), "ok").unwrap();

        let version = fixture
            .backend
            .commit(meta(&[("run", "1")]))
            .await
            .unwrap();
        assert_eq!(version.revision(), "abc1234");

        let versions = fixture.backend.versions().await.unwrap();
        assert_eq!(versions, vec![version.clone()]);

        let snapshot = fixture.path(".snapshots").join(version.snapshot_path());
        assert_eq!(fs::read_to_string(snapshot.join("bar")).unwrap(), "yeah");
        assert_eq!(fs::read_to_string(snapshot.join("out/toz")).unwrap(), "ok");
        assert!(!snapshot.join("README").exists());
        assert!(!snapshot.join(".snapshots").exists());
    }

    #[tokio::test]
    async fn test_commit_with_uncommitted_changes() {
        let fixture = Fixture::initialized().await;
        fixture.vcs.set_clean(false);

        let err = fixture.backend.commit(Metadata::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UncommittedChanges);
        assert!(fixture.backend.versions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_version() {
        let fixture = Fixture::initialized().await;
        fs::write(fixture.path("bar"), "yeah").unwrap();

        fixture
            .backend
            .commit_at(Metadata::new(), at(1_600_000_000))
            .await
            .unwrap();
        let err = fixture
            .backend
            .commit_at(Metadata::new(), at(1_600_000_000))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateVersion);
        assert_eq!(fixture.backend.versions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_second_commit_keeps_first_snapshot() {
        let fixture = Fixture::initialized().await;
        fs::write(fixture.path("bar"), "v1").unwrap();
        let first = fixture
            .backend
            .commit_at(Metadata::new(), at(1_600_000_000))
            .await
            .unwrap();

        // Distinct version, but it would share the snapshot directory
        fs::write(fixture.path("bar"), "v2").unwrap();
        let err = fixture
            .backend
            .commit_at(meta(&[("k", "v")]), at(1_600_000_000))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SnapshotIo);
        assert_eq!(fixture.backend.versions().await.unwrap(), vec![first.clone()]);

        fs::remove_file(fixture.path("bar")).unwrap();
        fixture.backend.checkout(&first).await.unwrap();
        assert_eq!(fs::read_to_string(fixture.path("bar")).unwrap(), "v1");

        // The next second gets its own snapshot
        let second = fixture
            .backend
            .commit_at(meta(&[("k", "v")]), at(1_600_000_001))
            .await
            .unwrap();
        fs::write(fixture.path("bar"), "v3").unwrap();
        fixture.backend.checkout(&second).await.unwrap();
        assert_eq!(fs::read_to_string(fixture.path("bar")).unwrap(), "v1");
    }

    #[tokio::test]
    async fn test_commit_refuses_orphaned_snapshot_directory() {
        let fixture = Fixture::initialized().await;
        fs::write(fixture.path("bar"), "new").unwrap();
        let orphan = fixture.path(".snapshots/abc1234/1600000000");
        fs::create_dir_all(&orphan).unwrap();
        fs::write(orphan.join("bar"), "left behind").unwrap();

        let err = fixture
            .backend
            .commit_at(Metadata::new(), at(1_600_000_000))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SnapshotIo);
        assert!(fixture.backend.versions().await.unwrap().is_empty());
        assert_eq!(
            fs::read_to_string(orphan.join("bar")).unwrap(),
            "left behind"
        );
    }

    #[tokio::test]
    async fn test_checkout_restores_untracked_files() {
        let fixture = Fixture::initialized().await;
        fs::write(fixture.path("bar"), "yeah").unwrap();
        fs::write(fixture.path("toz"), "ok").unwrap();

        let version = fixture.backend.commit(Metadata::new()).await.unwrap();
        fs::remove_file(fixture.path("bar")).unwrap();
        fs::remove_file(fixture.path("toz")).unwrap();

        fixture.backend.checkout(&version).await.unwrap();
        assert_eq!(fs::read_to_string(fixture.path("bar")).unwrap(), "yeah");
        assert_eq!(fs::read_to_string(fixture.path("toz")).unwrap(), "ok");
        assert_eq!(fs::read_to_string(fixture.path("README")).unwrap(), "tracked");
    }

    #[tokio::test]
    async fn test_checkout_unknown_version() {
        let fixture = Fixture::initialized().await;
        fs::write(fixture.path("bar"), "before").unwrap();
        fixture
            .backend
            .commit_at(Metadata::new(), at(1_600_000_000))
            .await
            .unwrap();
        fs::write(fixture.path("bar"), "after").unwrap();

        let unknown = Version::at("abc1234", at(1_600_000_001), Metadata::new()).unwrap();
        let err = fixture.backend.checkout(&unknown).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VersionNotFound);
        assert_eq!(fs::read_to_string(fixture.path("bar")).unwrap(), "after");
    }

    #[tokio::test]
    async fn test_checkout_with_uncommitted_changes() {
        let fixture = Fixture::initialized().await;
        let version = fixture.backend.commit(Metadata::new()).await.unwrap();

        fixture.vcs.set_clean(false);
        let err = fixture.backend.checkout(&version).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UncommittedChanges);
    }

    #[tokio::test]
    async fn test_commit_waits_for_lock() {
        let fixture = Fixture::initialized().await;
        let index = IndexStore::open(fixture.backend.index_path()).await.unwrap();
        let guard = index.lock(Duration::from_secs(1)).await.unwrap();

        let err = fixture.backend.commit(Metadata::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LockTimeout);
        assert!(fixture.backend.versions().await.unwrap().is_empty());

        drop(guard);
        fixture.backend.commit(Metadata::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_diff_not_implemented() {
        let fixture = Fixture::initialized().await;
        let v = Version::at("abc1234", at(1), Metadata::new()).unwrap();
        let err = fixture
            .backend
            .diff(&v, &v, Path::new("bar"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }

    #[tokio::test]
    async fn test_verify() {
        let fixture = Fixture::initialized().await;
        let kept = fixture
            .backend
            .commit_at(Metadata::new(), at(100))
            .await
            .unwrap();
        let lost = fixture
            .backend
            .commit_at(Metadata::new(), at(200))
            .await
            .unwrap();
        assert!(fixture.backend.verify().await.unwrap().is_consistent());

        fs::remove_dir_all(fixture.path(".snapshots").join(lost.snapshot_path())).unwrap();
        fs::create_dir_all(fixture.path(".snapshots/abc1234/300")).unwrap();

        let report = fixture.backend.verify().await.unwrap();
        assert!(!report.is_consistent());
        assert_eq!(report.missing, vec![lost]);
        assert_eq!(report.orphaned, vec![("abc1234".to_string(), 300)]);
        assert!(!report.missing.contains(&kept));
    }
}
