//! Tests for the vio binary.

use std::path::Path;
use std::process::{Command, Output};
use vio_test_utils::assertions::assert_file_equals;
use vio_test_utils::{require_tool, TestRepo};

fn vio(repo: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vio"))
        .arg("-C")
        .arg(repo)
        .args(args)
        .env("VIO_SYNCHRONIZER", "local")
        .env_remove("VIO_SNAPSHOTS_PATH")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run vio")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_vio"))
        .arg("version")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        format!("vio {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_vio"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let help = stdout(&output);
    for command in ["init", "commit", "checkout", "log", "status", "diff", "verify"] {
        assert!(help.contains(command), "help is missing {command}:\n{help}");
    }
}

#[test]
fn test_uninitialized_repository() {
    let dir = tempfile::tempdir().unwrap();
    let output = vio(dir.path(), &["status"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("uninitialized repository"));
}

#[test]
fn test_init_commit_checkout() {
    require_tool!("git");
    let repo = TestRepo::new().with_file("results/out.txt", "42").build();

    let output = vio(repo.path(), &["init", "--synchronizer", "local"]);
    assert!(output.status.success(), "init failed: {}", stderr(&output));
    assert!(stdout(&output).contains("Initialized vio repository"));

    let output = vio(repo.path(), &["log"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "No versions committed.");

    let output = vio(repo.path(), &["commit", "-m", r#"{"run": "1"}"#]);
    assert!(output.status.success(), "commit failed: {}", stderr(&output));
    let label = stdout(&output).trim().to_string();
    assert!(label.starts_with(&format!("{}#", repo.head())));

    let output = vio(repo.path(), &["log"]);
    let log = stdout(&output);
    assert!(log.starts_with(&label));
    assert!(log.contains(r#"{"run":"1"}"#));

    repo.delete_file("results/out.txt");
    let output = vio(repo.path(), &["checkout", &label]);
    assert!(output.status.success(), "checkout failed: {}", stderr(&output));
    assert_file_equals(&repo.path().join("results/out.txt"), "42");

    let output = vio(repo.path(), &["status"]);
    assert_eq!(stdout(&output).trim(), "committed (1 versions)");

    let output = vio(repo.path(), &["verify"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "ok");
}

#[test]
fn test_failures_exit_non_zero() {
    require_tool!("git");
    let repo = TestRepo::new().build();
    assert!(vio(repo.path(), &["init", "--synchronizer", "local"])
        .status
        .success());

    let output = vio(repo.path(), &["checkout", "0000000"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("version not found"));

    let output = vio(repo.path(), &["diff", "a", "b", "path"]);
    assert!(!output.status.success());

    repo.write_file("README", "dirty");
    let output = vio(repo.path(), &["commit"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("uncommitted changes"));

    let output = vio(repo.path(), &["init"]);
    assert!(!output.status.success());
}
