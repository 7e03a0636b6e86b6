//! Integration tests for the command-line interface.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn linefix(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_linefix"))
        .args(args)
        .current_dir(dir)
        // Keep the host environment from pointing tests at a real oracle.
        .env_remove("URL_LLM")
        .env_remove("MODEL_LLM")
        .env_remove("TOKEN_LLM")
        .env("NO_COLOR", "1")
        .output()
        .unwrap()
}

/// Workspace with one Python file and recorded oracle replies.
fn setup_test_workspace() -> TempDir {
    let dir = TempDir::new().unwrap();

    fs::write(
        dir.path().join("sample.py"),
        "def f():\n  return 1\n  return 2\n",
    )
    .unwrap();

    fs::write(dir.path().join("defects.txt"), "2: returns the wrong value\n").unwrap();
    fs::write(dir.path().join("fixes.txt"), "2, заменить, return 10\n").unwrap();

    dir
}

#[test]
fn test_help() {
    let dir = TempDir::new().unwrap();
    let output = linefix(dir.path(), &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("repair"));
    assert!(stdout.contains("annotate"));
    assert!(stdout.contains("apply"));
}

#[test]
fn test_annotate_prints_numbered_lines() {
    let dir = setup_test_workspace();
    let output = linefix(dir.path(), &["annotate", "sample.py"]);

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "1: def f():\n2:   return 1\n3:   return 2\n"
    );
}

#[test]
fn test_annotate_compact() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("c.py"), "x   =  1  # one\n").unwrap();

    let output = linefix(dir.path(), &["annotate", "c.py", "--compact"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "1: x = 1\n");
}

#[test]
fn test_repair_with_replay() {
    let dir = setup_test_workspace();
    let output = linefix(
        dir.path(),
        &["repair", "sample.py", "--replay", "defects.txt", "fixes.txt"],
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("returns the wrong value"));
    assert!(stdout.contains("1 repaired"));

    let content = fs::read_to_string(dir.path().join("sample.py")).unwrap();
    assert_eq!(content, "def f():\n  return 10\n  return 2\n");
}

#[test]
fn test_repair_dry_run_keeps_file() {
    let dir = setup_test_workspace();
    let output = linefix(
        dir.path(),
        &[
            "repair",
            "sample.py",
            "--dry-run",
            "--diff",
            "--replay",
            "defects.txt",
            "fixes.txt",
        ],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DRY RUN"));
    assert!(stdout.contains("+  return 10"));

    let content = fs::read_to_string(dir.path().join("sample.py")).unwrap();
    assert_eq!(content, "def f():\n  return 1\n  return 2\n");
}

#[test]
fn test_repair_without_oracle_config_fails() {
    let dir = setup_test_workspace();
    let output = linefix(dir.path(), &["repair", "sample.py"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("oracle is not configured"));
}

#[test]
fn test_repair_directory_walks_extension() {
    let dir = setup_test_workspace();
    fs::create_dir_all(dir.path().join("pkg")).unwrap();
    fs::write(dir.path().join("pkg/notes.txt"), "not python\n").unwrap();
    fs::write(dir.path().join("defects-clean.txt"), "no defects\n").unwrap();

    // Only sample.py is picked up; it gets the "clean" reply.
    let output = linefix(dir.path(), &["repair", ".", "--replay", "defects-clean.txt"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("no defects found"));
    assert!(stdout.contains("1 clean"));
}

#[test]
fn test_apply_edits_file() {
    let dir = setup_test_workspace();
    fs::write(dir.path().join("edits.txt"), "2, добавить, x = 0\ngarbage\n").unwrap();

    let output = linefix(dir.path(), &["apply", "sample.py", "--edits", "edits.txt"]);

    assert!(output.status.success());
    let content = fs::read_to_string(dir.path().join("sample.py")).unwrap();
    assert_eq!(
        content,
        "def f():\n  x = 0\ndef f():\n  return 1\n  return 2\n"
    );
}

#[test]
fn test_apply_refuses_file_outside_workspace() {
    let dir = setup_test_workspace();
    let workspace = dir.path().join("ws");
    fs::create_dir_all(&workspace).unwrap();

    let output = linefix(
        dir.path(),
        &[
            "apply",
            "sample.py",
            "--edits",
            "fixes.txt",
            "--workspace",
            "ws",
        ],
    );

    assert!(!output.status.success());
    let content = fs::read_to_string(dir.path().join("sample.py")).unwrap();
    assert_eq!(content, "def f():\n  return 1\n  return 2\n");
}

#[test]
fn test_config_file_keywords() {
    let dir = setup_test_workspace();
    fs::write(
        dir.path().join("linefix.toml"),
        "[actions]\nreplace = \"replace\"\ninsert_before = \"insert\"\n",
    )
    .unwrap();
    fs::write(dir.path().join("edits.txt"), "3, replace, return 20\n").unwrap();

    let output = linefix(dir.path(), &["apply", "sample.py", "--edits", "edits.txt"]);

    assert!(output.status.success());
    let content = fs::read_to_string(dir.path().join("sample.py")).unwrap();
    assert_eq!(content, "def f():\n  return 1\n  return 20\n");
}

#[test]
fn test_check_config_reports_invalid_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("linefix.toml"), "[oracle]\ntemperature = 9.0\n").unwrap();

    let output = linefix(dir.path(), &["check-config"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("temperature"));
}
