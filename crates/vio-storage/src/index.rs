//! Append-only version index.
//!
//! The index is a single UTF-8 file holding one serialized [`Version`] per
//! line, in commit order. Lines are only ever appended:
//!
//! ```text
//! 3f2a9c1#1700000000,{}
//! 3f2a9c1#1700000321,{"run":"2"}
//! 8b7d0e4#1700004000,{"machine":"node-1"}
//! ```

use crate::{IndexLock, StorageError, StorageResult, Version};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Handle to an existing index file.
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    /// File name of the index inside the snapshot root.
    pub const FILE_NAME: &'static str = "index";

    /// Create an empty index at `path`.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if the file is present.
    pub async fn create(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => {
                file.sync_all().await?;
                debug!(path = %path.display(), "Created index");
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(path.display().to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Open the index at `path`.
    ///
    /// Fails with [`StorageError::NotFound`] if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Self { path }),
            Ok(_) => Err(StorageError::not_found(&path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(&path))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Whether an index file exists at `path`.
    pub async fn exists(path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every version in commit order.
    ///
    /// Blank lines are skipped. Any other line that does not parse aborts the
    /// whole read with [`StorageError::MalformedEntry`].
    pub async fn read_all(&self) -> StorageResult<Vec<Version>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(&self.path));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let versions = content
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .map(Version::from_index_line)
            .collect::<StorageResult<Vec<_>>>()?;

        debug!(path = %self.path.display(), count = versions.len(), "Read index");
        Ok(versions)
    }

    /// Whether a version equal to `version` has been committed.
    pub async fn contains(&self, version: &Version) -> StorageResult<bool> {
        Ok(self.read_all().await?.iter().any(|v| v == version))
    }

    /// Append one version as a newline-terminated line.
    ///
    /// Callers serialize appends through [`IndexStore::lock`].
    pub async fn append(&self, version: &Version) -> StorageResult<()> {
        let line = format!("{}\n", version.serialize()?);

        let mut file = match fs::OpenOptions::new().append(true).open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(&self.path));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        // One write per record keeps the line contiguous under O_APPEND
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;

        debug!(path = %self.path.display(), version = %version.label(), "Appended to index");
        Ok(())
    }

    /// Acquire the exclusive index lock, waiting at most `timeout`.
    pub async fn lock(&self, timeout: Duration) -> StorageResult<IndexLock> {
        IndexLock::acquire(&self.path, timeout).await
    }

    /// Run `f` while holding the exclusive index lock.
    ///
    /// The lock is released before this returns, whether `f` succeeds or
    /// fails, and also if the returned future is dropped mid-flight.
    pub async fn with_exclusive_lock<T, E, F, Fut>(&self, timeout: Duration, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<StorageError>,
    {
        let _guard = self.lock(timeout).await?;
        f().await
    }
}
