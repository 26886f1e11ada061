//! Integration tests for `qorgate regress`.

#![cfg(unix)]
#![allow(deprecated)]

mod common;

use assert_cmd::Command;
use common::Fixture;
use predicates::prelude::*;
use std::fs;

const BALANCE_OK: &str = "[flow]\nflow = \"balance\"\n[qor]\narea = 50\nlevel = 10\n";
const BALANCE_TIGHT: &str = "[flow]\nflow = \"balance\"\n[qor]\narea = 5\n";

#[test]
fn writes_rpt_json_and_case_logs() {
    let fx = Fixture::new();
    fx.case("adder", BALANCE_OK);
    fx.case("mult", BALANCE_TIGHT);
    let config = fx.config("");

    Command::cargo_bin("qorgate")
        .unwrap()
        .env("PATH", fx.path_env())
        .arg("regress")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total:  2"))
        .stdout(predicate::str::contains("Failed: 1"))
        .stdout(predicate::str::contains("Pass Rate: 50.00%"));

    let run = fx.run_dir();
    let rpt = fs::read_to_string(run.join("regression.rpt")).unwrap();
    let expected = format!(
        "Summary:\nTotal:  2\nFailed: 1\nPass Rate: 50.00%\nWORSE_QOR:\n    {}\n",
        run.join("mult").display()
    );
    assert_eq!(rpt, expected);

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(run.join("report.json")).unwrap()).unwrap();
    assert_eq!(report["schema"], "qorgate.regression.v1");
    assert_eq!(report["summary"]["total"], 2);
    assert_eq!(report["cases"].as_array().unwrap().len(), 2);

    let log = fs::read_to_string(run.join("adder").join("adder.log")).unwrap();
    assert!(log.contains("[INFO] DONE: finished with PASS"), "log was:\n{log}");
    assert!(run.join("adder").join("optimized.v").is_file());
    assert!(run.join("regression.log").is_file());
}

#[test]
fn failing_cases_do_not_change_exit_code() {
    let fx = Fixture::new();
    fx.tool("balance", "#!/bin/sh\necho boom >&2\nexit 3\n");
    fx.case("adder", BALANCE_OK);
    let config = fx.config("");

    Command::cargo_bin("qorgate")
        .unwrap()
        .env("PATH", fx.path_env())
        .args(["regress", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("ABNORMAL_EXIT:"));
}

#[test]
fn pruned_workspaces_keep_failures_only() {
    let fx = Fixture::new();
    fx.case("adder", BALANCE_OK);
    fx.case("mult", BALANCE_TIGHT);
    let config = fx.config("keep_workspace = false");

    Command::cargo_bin("qorgate")
        .unwrap()
        .env("PATH", fx.path_env())
        .args(["regress", "--config"])
        .arg(&config)
        .assert()
        .success();

    let run = fx.run_dir();
    assert!(!run.join("adder").exists());
    assert!(run.join("mult").join("mult.log").is_file());
}

#[test]
fn unknown_flow_is_a_configuration_error() {
    let fx = Fixture::new();
    fx.case("adder", "[flow]\nflow = \"vivado\"\n");
    let config = fx.config("");

    Command::cargo_bin("qorgate")
        .unwrap()
        .env("PATH", fx.path_env())
        .args(["regress", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("vivado"));
}

#[test]
fn missing_config_fails() {
    let fx = Fixture::new();
    Command::cargo_bin("qorgate")
        .unwrap()
        .args(["regress", "--config"])
        .arg(fx.path().join("nope.toml"))
        .assert()
        .failure();
}
