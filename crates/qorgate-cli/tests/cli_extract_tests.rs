//! Integration tests for `qorgate extract`.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

#[test]
fn prints_mapper_metrics_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("ifpga.log");
    fs::write(
        &log,
        "LUT fanins:1 numbers :3\nLUT fanins:2 numbers :4\nmax delay : 7\n",
    )
    .unwrap();

    let out = Command::cargo_bin("qorgate")
        .unwrap()
        .args(["extract", "--flow", "ifpga"])
        .arg(&log)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let metrics: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(metrics["level"], 7.0);
    assert_eq!(metrics["area"], 7.0);
}

#[test]
fn required_metric_missing_fails() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("yosys.log");
    fs::write(&log, "nothing useful\n").unwrap();

    Command::cargo_bin("qorgate")
        .unwrap()
        .args(["extract", "--flow", "yosys", "--metric", "lut"])
        .arg(&log)
        .assert()
        .failure()
        .stderr(predicate::str::contains("lut"));
}

#[test]
fn unknown_flow_fails() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("x.log");
    fs::write(&log, "").unwrap();

    Command::cargo_bin("qorgate")
        .unwrap()
        .args(["extract", "--flow", "vivado"])
        .arg(&log)
        .assert()
        .failure()
        .stderr(predicate::str::contains("vivado"));
}
