#![cfg(unix)]

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn skimrun(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_skimrun"))
        .args(args)
        .env("RUST_LOG", "off")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn skim_prints_ids_after_explicit_args() {
    let out = skimrun(&["skim", "first"], "# ID  STATE\ni-1 running\n\ni-2 stopped\n");
    assert!(out.status.success());
    assert_eq!(String::from_utf8(out.stdout).unwrap(), "first i-1 i-2\n");
}

#[test]
fn start_failure_still_drains_running_items() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().to_str().unwrap();
    let too_long = "x".repeat(300);

    let out = skimrun(
        &[
            "run", "-j", "4", "--json", "--out-dir", out_dir, "--", "sh", "-c",
            "sleep 0.3; echo {}",
        ],
        &format!("a\n{too_long}\nb\n"),
    );

    assert!(!out.status.success());
    assert_eq!(std::fs::read_to_string(dir.path().join("a")).unwrap(), "a\n");
    assert!(!dir.path().join("b").exists());

    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["submitted"], 1);
    assert_eq!(report["succeeded"], 1);
    assert_eq!(report["state"], "done");
}

#[test]
fn run_reports_failures_without_failing() {
    let dir = tempfile::tempdir().unwrap();
    let out = skimrun(
        &[
            "run", "-j", "2", "--json", "--out-dir", dir.path().to_str().unwrap(), "--",
            "sh", "-c", "test {} != bad && echo {}",
        ],
        "# NAME\nok-1\nbad\nok-2\n",
    );

    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["submitted"], 3);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["items"][1]["label"], "bad");
    assert_eq!(std::fs::read_to_string(dir.path().join("ok-2")).unwrap(), "ok-2\n");
}
