//! Integration tests for the CLI interface

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn hearth(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hearth").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env_remove("HEARTH_INTERMEDIATES")
        .env_remove("HEARTH_MAX_THREADS")
        .env_remove("HEARTH_MAX_PROCESSES")
        .env("HEARTH_CONCURRENCY", "serial")
        .env("HEARTH_SCRATCH_DIR", dir.path());
    cmd
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = Command::cargo_bin("hearth").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("structure"));
}

#[test]
fn test_list_shows_builtins_with_contracts() {
    let dir = TempDir::new().unwrap();
    hearth(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("shout"))
        .stdout(predicate::str::contains("fingerprint  source -> count, digest"));
}

#[test]
fn test_structure_prints_nested_json() {
    let dir = TempDir::new().unwrap();
    let output = hearth(&dir).args(["structure", "shout"]).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["type"], "sequence");
    assert_eq!(value["name"], "shout");
    assert_eq!(value["steps"][0]["type"], "rename");
    assert_eq!(value["steps"][0]["base_step"]["name"], "copy");
}

#[test]
fn test_unknown_unit_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    hearth(&dir)
        .args(["structure", "nonesuch"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("nonesuch"));
}

#[test]
fn test_run_shout_end_to_end() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello there\n").unwrap();

    hearth(&dir)
        .args(["run", "shout", "--source", "notes.txt", "--target", "LOUD.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Running shout"))
        .stdout(predicate::str::contains("--source: notes.txt"))
        .stdout(predicate::str::contains("Finished! (took"));

    assert_eq!(
        std::fs::read_to_string(dir.path().join("LOUD.txt")).unwrap(),
        "HELLO THERE\n"
    );
}

#[test]
fn test_run_refuses_existing_output_without_overwrite() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("a.txt"), "new").unwrap();
    std::fs::write(dir.path().join("b.txt"), "old").unwrap();

    hearth(&dir)
        .args(["run", "copy", "--source", "a.txt", "--target", "b.txt"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("b.txt"));
    assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "old");

    hearth(&dir)
        .args(["run", "copy", "--source", "a.txt", "--target", "b.txt", "--overwrite"])
        .assert()
        .success();
    assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "new");
}

#[test]
fn test_run_missing_input_exits_with_execution_code() {
    let dir = TempDir::new().unwrap();
    hearth(&dir)
        .args(["run", "copy", "--source", "absent.txt", "--target", "out.txt"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("absent.txt"));
}

#[test]
fn test_run_missing_tag_flag_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    hearth(&dir)
        .args(["run", "copy", "--source", "a.txt"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--target"));
}

#[test]
fn test_run_set_tag_takes_several_paths() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("one.txt"), "1\n").unwrap();
    std::fs::write(dir.path().join("two.txt"), "2\n").unwrap();

    hearth(&dir)
        .args([
            "run", "concat", "--parts", "one.txt", "two.txt", "--joined", "both.txt",
        ])
        .assert()
        .success();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("both.txt")).unwrap(),
        "1\n2\n"
    );
}

#[test]
fn test_run_unit_help_lists_tags() {
    let dir = TempDir::new().unwrap();
    hearth(&dir)
        .args(["run", "fingerprint", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--source"))
        .stdout(predicate::str::contains("--digest"))
        .stdout(predicate::str::contains("--overwrite"));
}

#[test]
fn test_config_file_overrides_environment() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("in.txt"), "abc").unwrap();
    std::fs::write(
        dir.path().join("hearth.toml"),
        "concurrency = \"threads\"\nmax_threads = 2\n",
    )
    .unwrap();

    hearth(&dir)
        .args([
            "--config",
            "hearth.toml",
            "run",
            "fingerprint",
            "--source",
            "in.txt",
            "--digest",
            "in.sha256",
            "--count",
            "in.count",
        ])
        .assert()
        .success();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("in.count")).unwrap(),
        "1\n"
    );
}

#[test]
fn test_bad_config_file_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("hearth.toml"),
        "concurrency = \"processes\"\nintermediates = \"memory\"\n",
    )
    .unwrap();

    hearth(&dir)
        .args(["-c", "hearth.toml", "run", "copy", "--source", "a", "--target", "b"])
        .assert()
        .code(2);
}

#[test]
fn test_process_pool_from_environment() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("in.txt"), "one\ntwo\n").unwrap();

    hearth(&dir)
        .env("HEARTH_CONCURRENCY", "processes")
        .env("HEARTH_MAX_PROCESSES", "2")
        .args([
            "run",
            "fingerprint",
            "--source",
            "in.txt",
            "--digest",
            "in.sha256",
            "--count",
            "in.count",
        ])
        .assert()
        .success();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("in.count")).unwrap(),
        "2\n"
    );
}
