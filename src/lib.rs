//! Qorgate workspace-level test utilities.
//!
//! This crate exists solely to host workspace-level integration tests,
//! in particular the BDD/cucumber scenarios in `tests/cucumber.rs`.
//!
//! The functionality lives in the workspace member crates:
//! - `qorgate-types`: data model and JSON schemas
//! - `qorgate-domain`: metric extraction, QoR policy, scoring
//! - `qorgate-adapters`: process execution and workspace filesystem
//! - `qorgate-app`: case pipeline, scheduler, regression and benchmark use cases
//! - `qorgate` (qorgate-cli): command-line interface
