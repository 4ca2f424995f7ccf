//! Tree synchronizers.
//!
//! A synchronizer copies a directory tree onto another, skipping paths that
//! match the exclusion rules of a [`Filter`]. Rules use rsync's exclude
//! syntax:
//! - a leading `/` anchors the pattern at the root of the copied tree
//! - a trailing `/` matches directories only
//! - a pattern without any `/` matches an entry of that name at any depth
//! - `*`, `?` and `[...]` are wildcards
//! - in a pattern holding a wildcard, a backslash makes the next character
//!   literal

use crate::{SnapshotError, SnapshotResult};
use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;
use vio_util::TimingGuard;
use walkdir::{DirEntry, WalkDir};

/// Exclusion rules for one copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    excludes: Vec<String>,
    exclude_from: Option<PathBuf>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// Exclude one path relative to the root of the copied tree.
    ///
    /// The path is matched literally, even when its name holds wildcard
    /// characters.
    pub fn exclude_path(self, relative: &str) -> Self {
        let relative = escape_wildcards(relative.trim_start_matches('/'));
        self.exclude(format!("/{relative}"))
    }

    /// Exclude one directory (and everything below it) relative to the root.
    pub fn exclude_dir(self, relative: &str) -> Self {
        let relative = escape_wildcards(relative.trim_matches('/'));
        self.exclude(format!("/{relative}/"))
    }

    /// Read additional exclude patterns, one per line, from `file`.
    pub fn exclude_from(mut self, file: impl Into<PathBuf>) -> Self {
        self.exclude_from = Some(file.into());
        self
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    pub fn exclude_file(&self) -> Option<&Path> {
        self.exclude_from.as_deref()
    }
}

/// Characters rsync treats as wildcards.
const WILDCARDS: [char; 3] = ['*', '?', '['];

/// Quote `literal` so it matches only itself as an exclude pattern.
///
/// rsync reads backslashes as escapes only in patterns holding a wildcard,
/// so a path without one is already literal and is returned unchanged.
fn escape_wildcards(literal: &str) -> String {
    if !literal.contains(WILDCARDS) {
        return literal.to_string();
    }
    let mut escaped = String::with_capacity(literal.len() * 2);
    for c in literal.chars() {
        if WILDCARDS.contains(&c) || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Translate an rsync pattern body into `glob` syntax.
fn glob_source(body: &str) -> String {
    if !body.contains(WILDCARDS) {
        return Pattern::escape(body);
    }
    let mut source = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let literal = chars.next().unwrap_or('\\');
                source.push_str(&Pattern::escape(literal.encode_utf8(&mut [0; 4])));
            }
            other => source.push(other),
        }
    }
    source
}

/// Copies a directory tree into another, honouring a [`Filter`].
///
/// Copies are recursive and archival: permissions are preserved and files
/// already present at the destination are overwritten.
#[async_trait]
pub trait TreeSync: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Copy the contents of `source` into `destination`.
    async fn copy(&self, source: &Path, destination: &Path, filter: &Filter)
        -> SnapshotResult<()>;
}

/// Synchronizer backed by the external `rsync` tool.
#[derive(Debug, Clone)]
pub struct Rsync {
    program: PathBuf,
}

impl Default for Rsync {
    fn default() -> Self {
        Self::new("rsync")
    }
}

impl Rsync {
    /// Use a specific `rsync` executable.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Build the argument vector for a copy.
    ///
    /// Each exclude is its own argument so patterns are never re-split.
    pub fn args(&self, source: &Path, destination: &Path, filter: &Filter) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-a".into()];

        for pattern in filter.excludes() {
            args.push(format!("--exclude={pattern}").into());
        }

        if let Some(file) = filter.exclude_file() {
            let mut arg = OsString::from("--exclude-from=");
            arg.push(file.as_os_str());
            args.push(arg);
        }

        // Trailing slash: copy the contents of source, not source itself
        let mut src = source.as_os_str().to_os_string();
        src.push("/");
        args.push(src);
        args.push(destination.as_os_str().to_os_string());

        args
    }

    /// Check that the executable can be run.
    pub async fn probe(&self) -> SnapshotResult<()> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                SnapshotError::sync(
                    "rsync",
                    format!("unable to execute {}: {e}", self.program.display()),
                )
            })?;
        if !output.status.success() {
            return Err(SnapshotError::sync(
                "rsync",
                format!("{} --version exited with {}", self.program.display(), output.status),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TreeSync for Rsync {
    fn name(&self) -> &'static str {
        "rsync"
    }

    async fn copy(
        &self,
        source: &Path,
        destination: &Path,
        filter: &Filter,
    ) -> SnapshotResult<()> {
        let _timing = TimingGuard::sync(self.name()).with_detail(destination.display());
        let args = self.args(source, destination, filter);
        debug!(program = %self.program.display(), ?args, "Running rsync");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                SnapshotError::sync(
                    self.name(),
                    format!("unable to execute {}: {e}", self.program.display()),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SnapshotError::sync(
                self.name(),
                format!("{}: {}", output.status, stderr.trim()),
            ));
        }

        Ok(())
    }
}

/// In-process synchronizer: a recursive copy with the same exclusion rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalSync;

#[async_trait]
impl TreeSync for LocalSync {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn copy(
        &self,
        source: &Path,
        destination: &Path,
        filter: &Filter,
    ) -> SnapshotResult<()> {
        let _timing = TimingGuard::sync(self.name()).with_detail(destination.display());
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();
        let filter = filter.clone();

        let copied = tokio::task::spawn_blocking(move || {
            let rules = Rules::load(&filter)?;
            copy_tree(&source, &destination, &rules)
        })
        .await
        .map_err(|e| SnapshotError::sync(self.name(), e.to_string()))??;

        debug!(files = copied, "Local copy finished");
        Ok(())
    }
}

/// One compiled exclude pattern.
#[derive(Debug)]
struct Rule {
    pattern: Pattern,
    anchored: bool,
    dir_only: bool,
}

impl Rule {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with('#') || raw.starts_with(';') {
            return None;
        }

        let (body, dir_only) = match raw.strip_suffix('/') {
            Some(body) => (body, true),
            None => (raw, false),
        };
        let (body, leading_slash) = match body.strip_prefix('/') {
            Some(body) => (body, true),
            None => (body, false),
        };
        if body.is_empty() {
            return None;
        }

        let pattern = Pattern::new(&glob_source(body))
            .or_else(|_| Pattern::new(&Pattern::escape(body)))
            .ok()?;

        Some(Self {
            pattern,
            anchored: leading_slash || body.contains('/'),
            dir_only,
        })
    }

    fn matches(&self, relative: &str, name: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        if self.anchored {
            self.pattern.matches_with(relative, options)
        } else {
            self.pattern.matches_with(name, options)
        }
    }
}

/// The full rule set of a [`Filter`].
#[derive(Debug, Default)]
struct Rules {
    rules: Vec<Rule>,
}

impl Rules {
    fn load(filter: &Filter) -> SnapshotResult<Self> {
        let mut rules: Vec<Rule> = filter
            .excludes()
            .iter()
            .filter_map(|pattern| Rule::parse(pattern))
            .collect();

        if let Some(file) = filter.exclude_file() {
            let content = fs::read_to_string(file).map_err(|e| SnapshotError::io(file, e))?;
            rules.extend(content.lines().filter_map(Rule::parse));
        }

        Ok(Self { rules })
    }

    fn excludes(&self, root: &Path, entry: &DirEntry) -> bool {
        let Ok(relative) = entry.path().strip_prefix(root) else {
            return false;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        let name = entry.file_name().to_string_lossy();
        let is_dir = entry.file_type().is_dir();

        self.rules
            .iter()
            .any(|rule| rule.matches(&relative, &name, is_dir))
    }
}

/// Copy `source` into `destination`, returning the number of files copied.
fn copy_tree(source: &Path, destination: &Path, rules: &Rules) -> SnapshotResult<usize> {
    fs::create_dir_all(destination).map_err(|e| SnapshotError::io(destination, e))?;

    let mut dirs = Vec::new();
    let mut copied = 0;

    let walker = WalkDir::new(source)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !rules.excludes(source, entry));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            SnapshotError::io(&path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| SnapshotError::sync("local", e.to_string()))?;
        let target = destination.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            make_way(&target, true)?;
            fs::create_dir_all(&target).map_err(|e| SnapshotError::io(&target, e))?;
            dirs.push((entry.path().to_path_buf(), target));
        } else if file_type.is_symlink() {
            make_way(&target, false)?;
            copy_symlink(entry.path(), &target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| SnapshotError::io(parent, e))?;
            }
            make_way(&target, false)?;
            // fs::copy carries the permission bits over
            fs::copy(entry.path(), &target).map_err(|e| SnapshotError::io(&target, e))?;
            copied += 1;
        }
    }

    // Deepest first, so read-only directories do not block their children
    for (src, target) in dirs.iter().rev() {
        let permissions = fs::metadata(src)
            .map_err(|e| SnapshotError::io(src, e))?
            .permissions();
        fs::set_permissions(target, permissions).map_err(|e| SnapshotError::io(target, e))?;
    }

    Ok(copied)
}

/// Clear `target` for an entry of the other kind, as rsync does.
///
/// Non-directories are removed, except a directory that is wanted.
/// Symlinks are never followed. A directory in the way of a file or link
/// is removed only when empty; a populated one fails the copy.
fn make_way(target: &Path, want_dir: bool) -> SnapshotResult<()> {
    let Ok(existing) = fs::symlink_metadata(target) else {
        return Ok(());
    };
    let result = match (existing.is_dir(), want_dir) {
        (true, true) => return Ok(()),
        (true, false) => fs::remove_dir(target),
        // Read-only files included
        (false, _) => fs::remove_file(target),
    };
    result.map_err(|e| SnapshotError::io(target, e))
}

#[cfg(unix)]
fn copy_symlink(source: &Path, target: &Path) -> SnapshotResult<()> {
    let link = fs::read_link(source).map_err(|e| SnapshotError::io(source, e))?;
    std::os::unix::fs::symlink(&link, target).map_err(|e| SnapshotError::io(target, e))
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, _target: &Path) -> SnapshotResult<()> {
    tracing::warn!(path = %source.display(), "Skipping symbolic link");
    Ok(())
}
