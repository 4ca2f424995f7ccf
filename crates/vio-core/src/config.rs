//! Configuration management for vio.
//!
//! Each repository carries a `.vioconfig` JSON file at its root, written by
//! `vio init`:
//!
//! ```json
//! {
//!   "snapshots_path": ".snapshots",
//!   "backend": "posix",
//!   "synchronizer": "rsync",
//!   "lock_timeout_secs": 30
//! }
//! ```
//!
//! Environment overrides are applied on load:
//! - `VIO_SNAPSHOTS_PATH` - snapshot storage root
//! - `VIO_SYNCHRONIZER` - `rsync` or `local`
//! - `VIO_LOCK_TIMEOUT_SECS` - seconds to wait for the index lock

use crate::error::{ConfigError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use vio_util::path::CONFIG_FILE_NAME;

/// Snapshot storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Plain directories on the local file system.
    #[default]
    Posix,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Posix => "posix",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "posix" => Some(BackendKind::Posix),
            _ => None,
        }
    }
}

/// Tool used to copy trees in and out of snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynchronizerKind {
    /// The external `rsync` executable.
    #[default]
    Rsync,
    /// The built-in recursive copy.
    Local,
}

impl SynchronizerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SynchronizerKind::Rsync => "rsync",
            SynchronizerKind::Local => "local",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "rsync" => Some(SynchronizerKind::Rsync),
            "local" => Some(SynchronizerKind::Local),
            _ => None,
        }
    }
}

/// Repository configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Snapshot storage root, relative to the repository root unless absolute.
    pub snapshots_path: PathBuf,

    /// Storage backend.
    pub backend: BackendKind,

    /// Tree synchronizer.
    pub synchronizer: SynchronizerKind,

    /// Seconds to wait for the index lock before giving up.
    pub lock_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshots_path: PathBuf::from(".snapshots"),
            backend: BackendKind::Posix,
            synchronizer: SynchronizerKind::Rsync,
            lock_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Path of the config file for a repository.
    pub fn path(repo_root: &Path) -> PathBuf {
        repo_root.join(CONFIG_FILE_NAME)
    }

    /// Whether a repository has a config file.
    pub fn exists(repo_root: &Path) -> bool {
        Self::path(repo_root).is_file()
    }

    /// Load the repository config and apply environment overrides.
    pub async fn load(repo_root: &Path) -> CoreResult<Self> {
        let config = Self::load_file(&Self::path(repo_root)).await?;
        config.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Load a config file without environment overrides.
    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound {
                    path: path.display().to_string(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse config JSON; `source` names the origin in errors.
    pub fn parse(content: &str, source: &str) -> CoreResult<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(content).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Apply `VIO_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(mut self, lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("VIO_SNAPSHOTS_PATH").filter(|p| !p.is_empty()) {
            self.snapshots_path = PathBuf::from(path);
        }

        if let Some(value) = lookup("VIO_SYNCHRONIZER") {
            self.synchronizer =
                SynchronizerKind::parse(&value).ok_or_else(|| ConfigError::InvalidEnv {
                    name: "VIO_SYNCHRONIZER".to_string(),
                    value: value.clone(),
                })?;
        }

        if let Some(value) = lookup("VIO_LOCK_TIMEOUT_SECS") {
            self.lock_timeout_secs = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "VIO_LOCK_TIMEOUT_SECS".to_string(),
                value: value.clone(),
            })?;
        }

        Ok(self)
    }

    /// Write the config file for a repository.
    pub async fn save(&self, repo_root: &Path) -> CoreResult<()> {
        let path = Self::path(repo_root);
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::InvalidJson {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        tokio::fs::write(&path, format!("{content}\n")).await?;
        tracing::info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Absolute snapshot storage root for a repository.
    pub fn snapshots_dir(&self, repo_root: &Path) -> PathBuf {
        vio_util::path::resolve(repo_root, &self.snapshots_path)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}
