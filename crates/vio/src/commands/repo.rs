//! Repository command handlers.
//!
//! Handles init, commit, checkout, log, status, diff and verify.

use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use tracing::debug;
use vio_core::{
    check_dependencies, BackendKind, Config, InitOptions, Repository, SynchronizerKind,
};

/// clap value parser for `--backend`.
pub fn parse_backend(s: &str) -> Result<BackendKind, String> {
    BackendKind::parse(s).ok_or_else(|| format!("unknown backend '{s}' (expected: posix)"))
}

/// clap value parser for `--synchronizer`.
pub fn parse_synchronizer(s: &str) -> Result<SynchronizerKind, String> {
    SynchronizerKind::parse(s)
        .ok_or_else(|| format!("unknown synchronizer '{s}' (expected: rsync, local)"))
}

/// Directory a command operates on.
///
/// An explicit `--repo` wins. Otherwise the nearest ancestor of the current
/// directory holding a `.vioconfig` (or, failing that, a `.git`) is used, and
/// the current directory itself as a last resort.
pub fn repo_root(explicit: Option<PathBuf>, cwd: &Path) -> PathBuf {
    match explicit {
        Some(path) => vio_util::path::resolve(cwd, &path),
        None => vio_util::path::find_repo_root(cwd).unwrap_or_else(|| cwd.to_path_buf()),
    }
}

async fn open(root: &Path) -> anyhow::Result<Repository> {
    Repository::open(root)
        .await
        .with_context(|| format!("cannot open repository at {}", root.display()))
}

/// Handle `vio init`.
pub async fn handle_init(
    root: &Path,
    snapshots: Option<PathBuf>,
    backend: BackendKind,
    synchronizer: SynchronizerKind,
) -> anyhow::Result<()> {
    let probe = Config {
        synchronizer,
        ..Config::default()
    };
    check_dependencies(&probe).await?;

    let repo = Repository::init(
        root,
        InitOptions {
            snapshots_path: snapshots,
            backend,
            synchronizer,
        },
    )
    .await?;

    println!(
        "Initialized vio repository in {} (snapshots in {})",
        repo.root().display(),
        repo.config().snapshots_dir(repo.root()).display()
    );
    Ok(())
}

/// Handle `vio commit`.
pub async fn handle_commit(root: &Path, meta: Option<String>) -> anyhow::Result<()> {
    let repo = open(root).await?;
    check_dependencies(repo.config()).await?;

    let version = repo.commit(meta.as_deref().unwrap_or("")).await?;
    println!("{}", version.label());
    Ok(())
}

/// Handle `vio checkout`.
pub async fn handle_checkout(root: &Path, spec: &str) -> anyhow::Result<()> {
    let repo = open(root).await?;
    check_dependencies(repo.config()).await?;

    let version = repo.checkout(spec).await?;
    println!("Checked out {}", version.label());
    Ok(())
}

/// Handle `vio log`.
pub async fn handle_log(root: &Path) -> anyhow::Result<()> {
    let repo = open(root).await?;
    let log = repo.log().await?;

    if log.is_empty() {
        println!("No versions committed.");
    } else {
        print!("{log}");
    }
    Ok(())
}

/// Handle `vio status`.
pub async fn handle_status(root: &Path) -> anyhow::Result<()> {
    let repo = open(root).await?;
    let status = repo.status().await?;
    let count = repo.versions().await?.len();

    println!("{status} ({count} versions)");
    Ok(())
}

/// Handle `vio diff`.
pub async fn handle_diff(root: &Path, from: &str, to: &str, path: &Path) -> anyhow::Result<()> {
    let repo = open(root).await?;
    let diff = repo.diff(from, to, path).await?;
    print!("{diff}");
    Ok(())
}

/// Handle `vio verify`.
pub async fn handle_verify(root: &Path) -> anyhow::Result<()> {
    let repo = open(root).await?;
    let report = repo.verify().await?;
    debug!(
        missing = report.missing.len(),
        orphaned = report.orphaned.len(),
        "Verified repository"
    );

    for version in &report.missing {
        println!("missing snapshot: {}", version.label());
    }
    for (revision, epoch) in &report.orphaned {
        println!("orphaned snapshot: {revision}#{epoch}");
    }

    if !report.is_consistent() {
        bail!("{} indexed versions have no snapshot", report.missing.len());
    }
    println!("ok");
    Ok(())
}

/// Print version information.
pub fn print_version() {
    println!("vio {}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!(parse_backend("posix"), Ok(BackendKind::Posix));
        assert!(parse_backend("s3").unwrap_err().contains("unknown backend"));
        assert_eq!(parse_synchronizer("LOCAL"), Ok(SynchronizerKind::Local));
        assert!(parse_synchronizer("scp").is_err());
    }

    #[test]
    fn test_repo_root_explicit() {
        let cwd = Path::new("/work");
        assert_eq!(
            repo_root(Some(PathBuf::from("project")), cwd),
            PathBuf::from("/work/project")
        );
        assert_eq!(
            repo_root(Some(PathBuf::from("/abs")), cwd),
            PathBuf::from("/abs")
        );
    }

    #[test]
    fn test_repo_root_discovery() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".vioconfig"), "{}").unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(repo_root(None, &nested), dir.path());
    }
}
