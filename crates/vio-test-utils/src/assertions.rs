//! Assertion helpers for files and snapshot trees.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Assert that a file's content equals expected text exactly.
pub fn assert_file_equals(path: &Path, expected: &str) {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));

    assert_eq!(
        content,
        expected,
        "File {} content does not match expected.\nExpected:\n{}\nActual:\n{}",
        path.display(),
        expected,
        content
    );
}

/// Assert that nothing exists at `path`.
pub fn assert_missing(path: &Path) {
    assert!(
        std::fs::symlink_metadata(path).is_err(),
        "Expected {} not to exist",
        path.display()
    );
}

/// Every file and symlink below `root`, relative to it, sorted.
pub fn tree_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    files.sort();
    files
}

/// Assert that the files below `root` are exactly `expected`.
pub fn assert_tree_files(root: &Path, expected: &[&str]) {
    let actual = tree_files(root);
    let mut expected: Vec<PathBuf> = expected.iter().map(PathBuf::from).collect();
    expected.sort();

    assert_eq!(
        actual,
        expected,
        "Files below {} do not match.\nExpected: {:?}\nActual: {:?}",
        root.display(),
        expected,
        actual
    );
}
