//! Test fixtures for creating reproducible repositories.
//!
//! A [`TestRepo`] is a temporary directory turned into a git repository with
//! one initial commit holding the tracked files. Untracked files are written
//! after that commit, which is the content vio snapshots.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::TempDir;

/// Whether `program` can be executed.
pub fn has_tool(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Return early from a test when an external tool is missing.
#[macro_export]
macro_rules! require_tool {
    ($program:expr) => {
        if !$crate::fixtures::has_tool($program) {
            eprintln!("skipping: {} is not available", $program);
            return;
        }
    };
}

/// Builder for a temporary git repository.
///
/// # Example
///
/// ```rust,no_run
/// use vio_test_utils::fixtures::TestRepo;
///
/// let repo = TestRepo::new()
///     .with_tracked_file(".vioignore", "ignored_folder\n")
///     .with_file("ignored_folder/big.bin", "...")
///     .build();
///
/// assert!(repo.file_exists("ignored_folder/big.bin"));
/// ```
pub struct TestRepo {
    temp_dir: TempDir,
    tracked: BTreeMap<PathBuf, String>,
    untracked: BTreeMap<PathBuf, String>,
}

impl TestRepo {
    /// Start a repository whose only tracked file is `README`.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            tracked: BTreeMap::from([(PathBuf::from("README"), "test repository\n".to_string())]),
            untracked: BTreeMap::new(),
        }
    }

    /// Add a file to the initial commit.
    pub fn with_tracked_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.tracked
            .insert(path.as_ref().to_path_buf(), contents.into());
        self
    }

    /// Add a file left out of version control.
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.untracked
            .insert(path.as_ref().to_path_buf(), contents.into());
        self
    }

    /// Create the repository on disk.
    ///
    /// Panics if git is not available; guard callers with
    /// [`require_tool!`](crate::require_tool).
    pub fn build(self) -> BuiltTestRepo {
        let repo = BuiltTestRepo {
            temp_dir: self.temp_dir,
        };

        repo.git(&["init", "-q"]);
        repo.git(&["config", "user.email", "test@example.com"]);
        repo.git(&["config", "user.name", "Test"]);
        repo.git(&["config", "commit.gpgsign", "false"]);

        for (path, contents) in &self.tracked {
            repo.write_file(path, contents);
        }
        repo.commit_all("initial commit");

        for (path, contents) in &self.untracked {
            repo.write_file(path, contents);
        }

        repo
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// A git repository on disk, removed when dropped.
pub struct BuiltTestRepo {
    temp_dir: TempDir,
}

impl BuiltTestRepo {
    /// Get the path to the repository root.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Run git in the repository and return its stdout.
    pub fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .unwrap_or_else(|e| panic!("Failed to run git {}: {}", args.join(" "), e));

        assert!(
            output.status.success(),
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    /// Stage everything and commit it.
    pub fn commit_all(&self, message: &str) {
        self.git(&["add", "-A"]);
        self.git(&["commit", "-q", "--allow-empty", "-m", message]);
    }

    /// Short id of `HEAD`.
    pub fn head(&self) -> String {
        self.git(&["rev-parse", "--short", "HEAD"]).trim().to_string()
    }

    /// Whether tracked files are unmodified.
    pub fn is_clean(&self) -> bool {
        self.git(&["status", "--porcelain", "--untracked-files=no"])
            .trim()
            .is_empty()
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> String {
        let full_path = self.path().join(path.as_ref());
        fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Failed to read file {}: {}", full_path.display(), e))
    }

    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.path().join(path.as_ref()).exists()
    }

    /// Write a file, creating parent directories.
    pub fn write_file(&self, path: impl AsRef<Path>, contents: impl AsRef<str>) {
        let full_path = self.path().join(path.as_ref());
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).ok();
        }
        fs::write(&full_path, contents.as_ref())
            .unwrap_or_else(|e| panic!("Failed to write file {}: {}", full_path.display(), e));
    }

    pub fn delete_file(&self, path: impl AsRef<Path>) {
        let full_path = self.path().join(path.as_ref());
        fs::remove_file(&full_path)
            .unwrap_or_else(|e| panic!("Failed to delete file {}: {}", full_path.display(), e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_tool() {
        assert!(!has_tool("definitely-not-a-real-program-vio"));
    }

    #[test]
    fn test_build_repository() {
        require_tool!("git");

        let repo = TestRepo::new()
            .with_tracked_file("src/lib.rs", "pub fn f() {}\n")
            .with_file("out/result.txt", "42")
            .build();

        assert!(repo.file_exists(".git"));
        assert!(repo.is_clean());
        assert!(!repo.head().is_empty());

        let tracked = repo.git(&["ls-files"]);
        assert!(tracked.contains("README"));
        assert!(tracked.contains("src/lib.rs"));
        assert!(!tracked.contains("out/result.txt"));
        assert_eq!(repo.read_file("out/result.txt"), "42");
    }

    #[test]
    fn test_dirty_after_tracked_edit() {
        require_tool!("git");

        let repo = TestRepo::new().build();
        repo.write_file("untracked", "x");
        assert!(repo.is_clean());

        repo.write_file("README", "changed");
        assert!(!repo.is_clean());

        repo.commit_all("update");
        assert!(repo.is_clean());
        repo.delete_file("untracked");
        assert!(!repo.file_exists("untracked"));
    }
}
