//! Path helpers.
//!
//! All helpers are lexical: they never touch the file system except
//! [`find_repo_root`], so they work for paths that do not exist yet.

use std::path::{Component, Path, PathBuf};

/// Name of the repository-local configuration file.
pub const CONFIG_FILE_NAME: &str = ".vioconfig";

/// Drop `.` components and fold `..` into their parent.
pub fn normalize(path: &Path) -> PathBuf {
    path.components()
        .fold(PathBuf::new(), |mut out, component| {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    out.pop();
                }
                other => out.push(other),
            }
            out
        })
}

/// `path` itself when absolute, otherwise `path` joined onto `base`.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// Location of `path` below `base` as a `/`-separated string.
///
/// `None` when `path` is `base` itself or lies outside it.
pub fn relative_inside(path: &Path, base: &Path) -> Option<String> {
    let path = normalize(path);
    let base = normalize(base);
    let relative = path.strip_prefix(&base).ok()?;

    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}

/// Walk up from `start` looking for the repository root.
///
/// The closest ancestor holding a [`CONFIG_FILE_NAME`] wins; when there is
/// none, the closest one holding a `.git` entry.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let ancestors = || start.ancestors();
    ancestors()
        .find(|dir| dir.join(CONFIG_FILE_NAME).exists())
        .or_else(|| ancestors().find(|dir| dir.join(".git").exists()))
        .map(Path::to_path_buf)
}
