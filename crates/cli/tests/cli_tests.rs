//! End-to-end tests for the lineage binary
//!
//! Every test drives the CLI from a snapshot file, so no root privilege or
//! macOS host is needed. HOME points at a temp dir so a user config file
//! never leaks into the results.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SNAPSHOT: &str = r#"{
    "version": 1,
    "captured_at": "2024-05-01T10:00:00Z",
    "records": [
        {"pid": 1, "ppid": 0, "responsible_pid": 1, "path": "/sbin/launchd",
         "start_time": "2024-05-01T08:00:00Z"},
        {"pid": 100, "ppid": 1, "responsible_pid": 100,
         "path": "/Applications/Terminal.app/Contents/MacOS/Terminal",
         "start_time": "2024-05-01T09:00:00Z"},
        {"pid": 200, "ppid": 1, "responsible_pid": 100, "path": "/bin/zsh",
         "start_time": "2024-05-01T09:00:05Z"},
        {"pid": 300, "ppid": 1, "responsible_pid": 300, "path": "/usr/libexec/helperd",
         "start_time": "2024-05-01T08:30:00Z",
         "launchd": {"path": "(submitted by loginwindow.999)"}}
    ]
}"#;

struct Fixture {
    dir: TempDir,
    snapshot: PathBuf,
}

impl Fixture {
    fn new(content: &str) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let snapshot = dir.path().join("snapshot.json");
        fs::write(&snapshot, content).expect("write snapshot");
        Self { dir, snapshot }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("lineage").expect("binary built");
        cmd.env("HOME", self.dir.path())
            .env_remove("RUST_LOG")
            .current_dir(self.dir.path())
            .arg("--snapshot")
            .arg(&self.snapshot);
        cmd
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).expect("read output")
}

#[test]
fn test_help_exits_zero() {
    Command::cargo_bin("lineage")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--timeline"))
        .stdout(predicate::str::contains("--snapshot"));
}

#[test]
fn test_unknown_flag_is_rejected() {
    Command::cargo_bin("lineage")
        .unwrap()
        .arg("--nonsense")
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_snapshot_without_root_exits_three() {
    let fixture = Fixture::new(
        r#"{"version": 1, "captured_at": "2024-05-01T10:00:00Z", "records": [
            {"pid": 50, "ppid": 1, "responsible_pid": 50, "path": "/usr/bin/orphan",
             "start_time": "2024-05-01T09:00:00Z"}
        ]}"#,
    );
    fixture
        .cmd()
        .assert()
        .code(3)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Root process (PID 1) not found"));
}

#[test]
fn test_true_tree_output() {
    let fixture = Fixture::new(SNAPSHOT);
    let expected = "\
/sbin/launchd    1
┣╸/Applications/Terminal.app/Contents/MacOS/Terminal    100
┃ ┗╸/bin/zsh    200
┗╸/usr/libexec/helperd (true parent 999 \"loginwindow\" has terminated)    300
";
    fixture.cmd().assert().success().stdout(expected);
}

#[test]
fn test_sources_and_no_path() {
    let fixture = Fixture::new(SNAPSHOT);
    fixture
        .cmd()
        .args(["--sources", "--no-path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "zsh    200    Acquired parent from -> responsible-pid",
        ))
        .stdout(predicate::str::contains(
            "Acquired parent from -> submitted-by-terminated",
        ))
        .stdout(predicate::str::contains("/bin/zsh").not());
}

#[test]
fn test_standard_tree_uses_raw_parents() {
    let fixture = Fixture::new(SNAPSHOT);
    fixture
        .cmd()
        .args(["--standard", "--no-path"])
        .assert()
        .success()
        .stdout("launchd    1\n┣╸Terminal    100\n┣╸zsh    200\n┗╸helperd    300\n");
}

#[test]
fn test_timeline_orders_by_start_time() {
    let fixture = Fixture::new(SNAPSHOT);
    fixture
        .cmd()
        .args(["--timeline", "--no-path", "--timestamps"])
        .assert()
        .success()
        .stdout(
            "launchd    1    2024-05-01 08:00:00 +0000\n\
             helperd    300    2024-05-01 08:30:00 +0000\n\
             Terminal    100    2024-05-01 09:00:00 +0000\n\
             zsh    200    2024-05-01 09:00:05 +0000\n",
        );
}

#[test]
fn test_timeline_lists_duplicate_pid_once() {
    let fixture = Fixture::new(
        r#"{"version": 1, "captured_at": "2024-05-01T10:00:00Z", "records": [
            {"pid": 1, "ppid": 0, "responsible_pid": 1, "path": "/sbin/launchd",
             "start_time": "2024-05-01T08:00:00Z"},
            {"pid": 40, "ppid": 1, "responsible_pid": 40, "path": "/usr/bin/first",
             "start_time": "2024-05-01T09:00:00Z"},
            {"pid": 40, "ppid": 1, "responsible_pid": 40, "path": "/usr/bin/second",
             "start_time": "2024-05-01T07:00:00Z"}
        ]}"#,
    );
    fixture
        .cmd()
        .args(["--timeline", "--no-path"])
        .assert()
        .success()
        .stdout("launchd    1\nfirst    40\n");
}

#[test]
fn test_json_output() {
    let fixture = Fixture::new(SNAPSHOT);
    let output = fixture.cmd().arg("--json").output().unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["identity"]["value"], 1);
    assert_eq!(json["children"][0]["children"][0]["identity"]["value"], 200);
    assert_eq!(
        json["children"][0]["children"][0]["evidence"],
        "responsible-pid"
    );
}

#[test]
fn test_output_file_is_written_without_color() {
    let fixture = Fixture::new(SNAPSHOT);
    let target = fixture.path("tree.txt");
    fs::write(&target, "stale").unwrap();

    fixture
        .cmd()
        .arg("-o")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = read(&target);
    assert!(written.starts_with("/sbin/launchd    1\n"));
    assert!(!written.contains('\u{1b}'));
}

#[test]
fn test_bare_output_flag_writes_default_file() {
    let fixture = Fixture::new(SNAPSHOT);
    fixture.cmd().arg("-o").assert().success();
    assert!(read(&fixture.path("lineage_output.txt")).contains("/bin/zsh    200"));
}

#[test]
fn test_unwritable_output_keeps_exit_code() {
    let fixture = Fixture::new(SNAPSHOT);
    fixture
        .cmd()
        .arg("-o")
        .arg(fixture.path("missing/tree.txt"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Could not write output"));
}

#[test]
fn test_save_snapshot_round_trips() {
    let fixture = Fixture::new(SNAPSHOT);
    let saved = fixture.path("saved.json");
    let first = fixture
        .cmd()
        .arg("--save-snapshot")
        .arg(&saved)
        .output()
        .unwrap();
    assert!(first.status.success());

    let mut again = Command::cargo_bin("lineage").unwrap();
    again
        .env("HOME", fixture.dir.path())
        .arg("--snapshot")
        .arg(&saved)
        .assert()
        .success()
        .stdout(String::from_utf8(first.stdout).unwrap());
}

#[test]
fn test_config_file_enables_options() {
    let fixture = Fixture::new(SNAPSHOT);
    let config_dir = fixture.path(".lineage");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.toml"),
        "[output]\nno_pid = true\nno_path = true\n",
    )
    .unwrap();

    fixture
        .cmd()
        .assert()
        .success()
        .stdout(predicate::str::starts_with("launchd\n┣╸Terminal\n"));
}

#[test]
fn test_init_config_writes_sample() {
    let fixture = Fixture::new(SNAPSHOT);
    Command::cargo_bin("lineage")
        .unwrap()
        .env("HOME", fixture.dir.path())
        .arg("--init-config")
        .assert()
        .success();

    let written = read(&fixture.path(".lineage/config.toml"));
    assert!(written.contains("[output]"));
    assert!(written.contains("no_network = false"));
}
