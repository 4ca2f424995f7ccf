//! Exclusive advisory lock over the index file.
//!
//! The lock is whole-file and process-wide. It is held by an [`IndexLock`]
//! guard and released when the guard is dropped, whatever the exit path.

use crate::{StorageError, StorageResult};
use std::fs::{File, TryLockError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Interval between lock attempts while another holder owns the lock.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Scoped holder of the exclusive index lock.
#[derive(Debug)]
pub struct IndexLock {
    file: File,
    path: PathBuf,
}

impl IndexLock {
    /// Acquire the exclusive lock on `path`, waiting at most `timeout`.
    ///
    /// Fails with [`StorageError::NotFound`] if the file does not exist and
    /// with [`StorageError::LockTimeout`] if the lock is still held elsewhere
    /// once `timeout` has elapsed.
    pub async fn acquire(path: &Path, timeout: Duration) -> StorageResult<Self> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(path));
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let started = Instant::now();
        loop {
            match file.try_lock() {
                Ok(()) => {
                    debug!(path = %path.display(), waited_ms = started.elapsed().as_millis() as u64, "Acquired index lock");
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                    });
                }
                Err(TryLockError::WouldBlock) => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        warn!(path = %path.display(), "Gave up waiting for index lock");
                        return Err(StorageError::LockTimeout {
                            path: path.display().to_string(),
                            waited,
                        });
                    }
                    tokio::time::sleep(POLL_INTERVAL.min(timeout - waited)).await;
                }
                Err(TryLockError::Error(e)) => return Err(StorageError::Io(e)),
            }
        }
    }

    /// Path of the locked file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well; unlock explicitly
        // so the release does not depend on when the file is closed.
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %e, "Failed to release index lock");
        } else {
            debug!(path = %self.path.display(), "Released index lock");
        }
    }
}
