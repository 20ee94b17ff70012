//! Integration tests for platform-macos
//!
//! These tests spawn real processes and read them back from the live system.
//! Tests that need root to see every process are marked with #[ignore].

#![cfg(target_os = "macos")]

use lineage_core::{build_true_tree, BuildOptions, Evidence, ProcessRecordSource};
use lineage_platform_macos::{get_bsd_info, get_image_path, LibprocSource};
use std::process::{Command, Stdio};

#[test]
fn test_spawned_child_reports_us_as_parent() {
    let mut child = Command::new("/bin/sleep")
        .arg("5")
        .stdout(Stdio::null())
        .spawn()
        .expect("Should spawn child process");

    let info = get_bsd_info(child.id()).expect("child should be readable");
    assert_eq!(info.ppid, std::process::id());

    let path = get_image_path(child.id()).expect("child path should be readable");
    assert!(path.ends_with("sleep"), "unexpected path {}", path);

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
#[ignore] // Requires root to read every process
fn test_live_tree_contains_spawned_child() {
    let mut child = Command::new("/bin/sleep")
        .arg("5")
        .spawn()
        .expect("Should spawn child process");

    let collection = LibprocSource::new().collect().expect("collection");
    let built = build_true_tree(&collection.records, &BuildOptions::default())
        .expect("launchd should be present");

    let child_id = built.forest.find_pid(child.id()).expect("child in forest");
    // Under a terminal the responsible application outranks the raw parent
    let evidence = built.forest.node(child_id).evidence;
    assert!(
        matches!(evidence, Evidence::RawPpid | Evidence::ResponsiblePid),
        "unexpected evidence {:?}",
        evidence
    );

    let _ = child.kill();
    let _ = child.wait();
}
