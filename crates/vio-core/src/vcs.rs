//! Version-control oracle.
//!
//! The backend asks the version-control system three things: whether the
//! tracked tree is clean, which revision is checked out and which files are
//! tracked. [`GitCli`] answers them by running `git` in the repository.

use crate::error::{CoreError, CoreResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Queries against the version-control system of a working tree.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Whether tracked files are free of local modifications.
    async fn is_clean(&self, repo: &Path) -> CoreResult<bool>;

    /// Identifier of the checked-out revision.
    async fn current_revision(&self, repo: &Path) -> CoreResult<String>;

    /// Tracked paths, relative to the repository root with `/` separators.
    async fn tracked_files(&self, repo: &Path) -> CoreResult<Vec<String>>;
}

/// [`Vcs`] implementation that runs the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check that the executable can be run.
    pub async fn probe(&self) -> CoreResult<()> {
        let cwd = std::env::temp_dir();
        self.run(&cwd, &["--version"]).await.map(|_| ())
    }

    /// Run git with `args` inside `repo` and return its stdout.
    async fn run(&self, repo: &Path, args: &[&str]) -> CoreResult<String> {
        let command = format!("git {}", args.join(" "));
        debug!(repo = %repo.display(), %command, "Running git");

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(repo)
            .output()
            .await
            .map_err(|e| CoreError::Vcs {
                command: command.clone(),
                message: format!("unable to execute {}: {e}", self.program.display()),
            })?;

        if !output.status.success() {
            return Err(CoreError::Vcs {
                command,
                message: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn is_clean(&self, repo: &Path) -> CoreResult<bool> {
        let out = self
            .run(repo, &["status", "--porcelain", "--untracked-files=no"])
            .await?;
        Ok(out.trim().is_empty())
    }

    async fn current_revision(&self, repo: &Path) -> CoreResult<String> {
        let out = self
            .run(repo, &["rev-parse", "--verify", "--short", "HEAD"])
            .await?;
        let revision = out.trim().to_string();
        if revision.is_empty() {
            return Err(CoreError::Vcs {
                command: "git rev-parse --verify --short HEAD".to_string(),
                message: "empty revision".to_string(),
            });
        }
        Ok(revision)
    }

    async fn tracked_files(&self, repo: &Path) -> CoreResult<Vec<String>> {
        // -z: NUL-separated and unquoted, whatever the file names contain
        let out = self.run(repo, &["ls-files", "-z"]).await?;
        Ok(out
            .split('\0')
            .filter(|path| !path.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// In-memory [`Vcs`] for unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug)]
    pub(crate) struct FakeVcs {
        pub clean: Mutex<bool>,
        pub revision: String,
        pub tracked: Vec<String>,
    }

    impl FakeVcs {
        pub(crate) fn new(revision: &str, tracked: &[&str]) -> Self {
            Self {
                clean: Mutex::new(true),
                revision: revision.to_string(),
                tracked: tracked.iter().map(|s| s.to_string()).collect(),
            }
        }

        pub(crate) fn set_clean(&self, clean: bool) {
            *self.clean.lock().unwrap() = clean;
        }
    }

    #[async_trait]
    impl Vcs for FakeVcs {
        async fn is_clean(&self, _repo: &Path) -> CoreResult<bool> {
            Ok(*self.clean.lock().unwrap())
        }

        async fn current_revision(&self, _repo: &Path) -> CoreResult<String> {
            Ok(self.revision.clone())
        }

        async fn tracked_files(&self, _repo: &Path) -> CoreResult<Vec<String>> {
            Ok(self.tracked.clone())
        }
    }
}
