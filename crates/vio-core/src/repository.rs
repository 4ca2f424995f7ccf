//! Repository facade.
//!
//! Ties a working tree to its `.vioconfig` and backend, and resolves the
//! textual forms users type (`revision`, `revision#epoch`, JSON metadata)
//! into the typed values the backend works with.

use crate::backend::{instantiate_backend, Backend, Consistency, Status};
use crate::config::{BackendKind, Config, SynchronizerKind};
use crate::error::{ConfigError, CoreError, CoreResult};
use crate::vcs::GitCli;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vio_snapshot::Rsync;
use vio_storage::{Metadata, Version};

/// Options for [`Repository::init`].
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Snapshot storage root; `.snapshots` when unset.
    pub snapshots_path: Option<PathBuf>,
    pub backend: BackendKind,
    pub synchronizer: SynchronizerKind,
}

impl InitOptions {
    fn into_config(self) -> Config {
        let defaults = Config::default();
        Config {
            snapshots_path: self.snapshots_path.unwrap_or(defaults.snapshots_path),
            backend: self.backend,
            synchronizer: self.synchronizer,
            ..defaults
        }
    }
}

/// A working tree under vio.
pub struct Repository {
    root: PathBuf,
    config: Config,
    backend: Box<dyn Backend>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("backend", &self.backend.kind())
            .finish()
    }
}

impl Repository {
    /// Initialize vio in the working tree at `root`.
    ///
    /// Writes `.vioconfig` from `options` unless the file already exists, in
    /// which case the existing configuration is used.
    pub async fn init(root: impl Into<PathBuf>, options: InitOptions) -> CoreResult<Self> {
        let root = root.into();

        if Config::exists(&root) {
            debug!(root = %root.display(), "Using existing configuration");
        } else {
            options.into_config().save(&root).await?;
        }

        let config = Config::load(&root).await?;
        let backend = instantiate_backend(&config, &root)?;
        backend.init().await?;

        Ok(Self::with_backend(root, config, backend))
    }

    /// Open an initialized repository.
    pub async fn open(root: impl Into<PathBuf>) -> CoreResult<Self> {
        let root = root.into();
        let config = Config::load(&root).await.map_err(|e| match e {
            CoreError::Config(ConfigError::NotFound { path }) => CoreError::NotInitialized(path),
            other => other,
        })?;

        let backend = instantiate_backend(&config, &root)?;
        backend.open().await?;

        debug!(root = %root.display(), backend = config.backend.as_str(), "Opened repository");
        Ok(Self::with_backend(root, config, backend))
    }

    /// Assemble a repository from parts.
    pub fn with_backend(root: PathBuf, config: Config, backend: Box<dyn Backend>) -> Self {
        Self {
            root,
            config,
            backend,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub async fn is_initialized(&self) -> bool {
        self.backend.is_initialized().await
    }

    pub async fn status(&self) -> CoreResult<Status> {
        self.backend.status().await
    }

    /// Commit with metadata given as a JSON object of string values.
    pub async fn commit(&self, metadata_json: &str) -> CoreResult<Version> {
        let metadata = parse_metadata(metadata_json)?;
        self.backend.commit(metadata).await
    }

    /// Find the indexed version a user-supplied `spec` refers to.
    ///
    /// - `revision`: the latest version of that revision
    /// - `revision#epoch`: the latest version of that revision and second
    /// - `revision#epoch,{json}`: exactly that version
    pub async fn resolve(&self, spec: &str) -> CoreResult<Version> {
        let spec = spec.trim();
        let versions = self.backend.versions().await?;

        let found = if spec.contains(',') {
            let wanted = Version::from_index_line(spec)?;
            versions.into_iter().find(|v| *v == wanted)
        } else if spec.contains('#') {
            let wanted = Version::parse(spec)?;
            versions.into_iter().rev().find(|v| {
                v.revision() == wanted.revision() && v.epoch_seconds() == wanted.epoch_seconds()
            })
        } else {
            versions.into_iter().rev().find(|v| v.revision() == spec)
        };

        found.ok_or_else(|| CoreError::VersionNotFound(spec.to_string()))
    }

    /// Restore the version `spec` refers to.
    pub async fn checkout(&self, spec: &str) -> CoreResult<Version> {
        let version = self.resolve(spec).await?;
        self.backend.checkout(&version).await?;
        Ok(version)
    }

    pub async fn versions(&self) -> CoreResult<Vec<Version>> {
        self.backend.versions().await
    }

    /// Render the index, one version per line, oldest first.
    pub async fn log(&self) -> CoreResult<String> {
        let mut out = String::new();
        for version in self.backend.versions().await? {
            out.push_str(&format!(
                "{}  {}  {}\n",
                version.label(),
                version.timestamp().format("%Y-%m-%d %H:%M:%S UTC"),
                serde_json::to_string(version.metadata())?
            ));
        }
        Ok(out)
    }

    pub async fn diff(&self, from: &str, to: &str, path: &Path) -> CoreResult<String> {
        let from = self.resolve(from).await?;
        let to = self.resolve(to).await?;
        self.backend.diff(&from, &to, path).await
    }

    pub async fn verify(&self) -> CoreResult<Consistency> {
        self.backend.verify().await
    }
}

/// Parse commit metadata from JSON.
///
/// Empty input and `null` mean no metadata. Anything else must be an object
/// whose values are strings.
pub fn parse_metadata(json: &str) -> CoreResult<Metadata> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(Metadata::new());
    }
    let metadata: Option<Metadata> = serde_json::from_str(json)?;
    Ok(metadata.unwrap_or_default())
}

/// Check that the external tools `config` relies on can be executed.
pub async fn check_dependencies(config: &Config) -> CoreResult<()> {
    GitCli::default().probe().await?;
    if config.synchronizer == SynchronizerKind::Rsync {
        Rsync::default().probe().await?;
    }
    info!(synchronizer = config.synchronizer.as_str(), "External tools available");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::posix::PosixBackend;
    use crate::vcs::testing::FakeVcs;
    use chrono::DateTime;
    use std::sync::Arc;
    use tempfile::TempDir;
    use vio_snapshot::LocalSync;
    use vio_storage::IndexStore;

    async fn repository() -> (TempDir, Repository) {
        let dir = TempDir::new().unwrap();
        let config = Config {
            synchronizer: SynchronizerKind::Local,
            ..Config::default()
        };
        let backend = PosixBackend::new(
            dir.path(),
            config.snapshots_dir(dir.path()),
            Arc::new(LocalSync),
            Arc::new(FakeVcs::new("abc1234", &[])),
        );
        backend.init().await.unwrap();
        let repo = Repository::with_backend(dir.path().to_path_buf(), config, Box::new(backend));
        (dir, repo)
    }

    async fn commit_at(repo: &Repository, seconds: i64, metadata: &str) -> Version {
        repo.backend()
            .commit_at(
                parse_metadata(metadata).unwrap(),
                DateTime::from_timestamp(seconds, 0).unwrap(),
            )
            .await
            .unwrap()
    }

    #[test]
    fn test_parse_metadata() {
        assert!(parse_metadata("").unwrap().is_empty());
        assert!(parse_metadata("null").unwrap().is_empty());
        assert!(parse_metadata("{}").unwrap().is_empty());

        let metadata = parse_metadata(r#"{"b": "2", "a": "1"}"#).unwrap();
        assert_eq!(metadata.get("a").map(String::as_str), Some("1"));
        assert_eq!(metadata.len(), 2);

        assert!(parse_metadata(r#"{"a": 1}"#).is_err());
        assert!(parse_metadata("[1, 2]").is_err());
    }

    #[test]
    fn test_init_options_into_config() {
        let config = InitOptions {
            snapshots_path: Some(PathBuf::from("/data/snaps")),
            synchronizer: SynchronizerKind::Local,
            ..InitOptions::default()
        }
        .into_config();
        assert_eq!(config.snapshots_path, PathBuf::from("/data/snaps"));
        assert_eq!(config.synchronizer, SynchronizerKind::Local);
        assert_eq!(config.lock_timeout_secs, Config::default().lock_timeout_secs);
    }

    #[tokio::test]
    async fn test_resolve() {
        let (_dir, repo) = repository().await;
        let first = commit_at(&repo, 100, "").await;
        let second = commit_at(&repo, 200, r#"{"run": "a"}"#).await;

        // A second entry for the same second cannot be committed; write it
        // to the index directly
        let third = Version::at(
            "abc1234",
            DateTime::from_timestamp(200, 0).unwrap(),
            parse_metadata(r#"{"run": "b"}"#).unwrap(),
        )
        .unwrap();
        let index_path = repo
            .config()
            .snapshots_dir(repo.root())
            .join(IndexStore::FILE_NAME);
        IndexStore::open(index_path)
            .await
            .unwrap()
            .append(&third)
            .await
            .unwrap();

        assert_eq!(repo.resolve("abc1234").await.unwrap(), third);
        assert_eq!(repo.resolve("abc1234#100").await.unwrap(), first);
        assert_eq!(repo.resolve("abc1234#200").await.unwrap(), third);
        assert_eq!(
            repo.resolve(r#"abc1234#200,{"run":"a"}"#).await.unwrap(),
            second
        );

        let err = repo.resolve("abc1234#300").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VersionNotFound);
        let err = repo.resolve("def5678").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VersionNotFound);
        let err = repo.resolve("abc1234#soon").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEntry);
    }

    #[tokio::test]
    async fn test_log() {
        let (_dir, repo) = repository().await;
        assert_eq!(repo.log().await.unwrap(), "");

        commit_at(&repo, 0, r#"{"k": "v"}"#).await;
        assert_eq!(
            repo.log().await.unwrap(),
            "abc1234#0  1970-01-01 00:00:00 UTC  {\"k\":\"v\"}\n"
        );
    }

    #[tokio::test]
    async fn test_checkout_by_spec() {
        let (dir, repo) = repository().await;
        std::fs::write(dir.path().join("bar"), "one").unwrap();
        let version = repo.commit(r#"{"step": "1"}"#).await.unwrap();
        std::fs::remove_file(dir.path().join("bar")).unwrap();

        let restored = repo.checkout(&version.label()).await.unwrap();
        assert_eq!(restored, version);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("bar")).unwrap(),
            "one"
        );
        assert_eq!(repo.status().await.unwrap(), Status::Committed);
    }

    #[tokio::test]
    async fn test_open_without_config() {
        let dir = TempDir::new().unwrap();
        let err = Repository::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotInitialized(_)));
    }

    #[tokio::test]
    async fn test_diff_resolves_before_failing() {
        let (_dir, repo) = repository().await;
        let err = repo
            .diff("abc1234", "abc1234", Path::new("bar"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VersionNotFound);

        commit_at(&repo, 100, "").await;
        let err = repo
            .diff("abc1234", "abc1234", Path::new("bar"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotImplemented);
    }
}
