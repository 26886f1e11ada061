//! Application layer for qorgate.
//!
//! The app layer coordinates adapters and domain logic.
//! It does not parse CLI flags and it does not decide exit codes.

mod bench;
mod case;
mod flow;
mod postcheck;
mod regress;
mod render;
mod runner;
mod scheduler;

pub use bench::{BenchOutcome, BenchRequest, BenchUseCase};
pub use case::{Case, CaseError, parse_case_meta};
pub use flow::{
    CheckOutcome, EquivalenceCheck, FlowStrategy, MappingFlow, OperatorFlow, Plan, Script,
    SynthesisFlow, Verdict, strategy_for,
};
pub use postcheck::{AlwaysPass, PostCheck, RequiredFiles};
pub use regress::{RegressOutcome, RegressRequest, RegressUseCase};
pub use render::{bench_csv, bench_table, case_log, regression_rpt};
pub use runner::{CaseOutcome, CaseRunner, CommandRecord};
pub use scheduler::Scheduler;

use anyhow::Context;
use qorgate_types::{ConfigFile, DEFAULT_TIMEOUT_SECS, ToolsConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now_rfc3339(&self) -> String;

    /// `yymmdd-HHMMSS`, used to name per-run result directories.
    fn now_compact(&self) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        use time::format_description::well_known::Rfc3339;
        time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }

    fn now_compact(&self) -> String {
        let format = time::macros::format_description!(
            "[year repr:last_two][month][day]-[hour][minute][second]"
        );
        time::OffsetDateTime::now_utc()
            .format(&format)
            .unwrap_or_else(|_| "700101-000000".to_string())
    }
}

/// Resolved, read-only settings shared by every case in a run.
///
/// Built once from the [`ConfigFile`] and handed to the case runner; nothing
/// below this point reads configuration from anywhere else.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub tools: ToolsConfig,
    pub timeout: Duration,
    pub flow_override: Option<String>,
    /// LUT input bound used when reading the mapper's histogram.
    pub lut_inputs: usize,
    pub enable_formality: bool,
    /// Technology library for the formal check; required when formality is on.
    pub lut_def: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            tools: ToolsConfig::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            flow_override: None,
            lut_inputs: 6,
            enable_formality: false,
            lut_def: None,
        }
    }
}

impl RunSettings {
    /// Resolve a config file. Relative paths are taken against `base_dir`
    /// (normally the directory holding the config file).
    pub fn from_config(config: &ConfigFile, base_dir: &Path) -> anyhow::Result<Self> {
        let timeout = match &config.global.timeout {
            Some(raw) => parse_duration(raw).with_context(|| format!("global.timeout = {raw:?}"))?,
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        if let Some(flow) = &config.global.flow {
            qorgate_domain::parse_flow(flow).context("global.flow")?;
        }

        let lut_def = config.global.lut_def.as_ref().map(|p| base_dir.join(p));
        if config.global.enable_formality && lut_def.is_none() {
            anyhow::bail!("global.enable_formality requires global.lut_def");
        }

        Ok(Self {
            tools: config.tools.clone(),
            timeout,
            flow_override: config.global.flow.clone(),
            lut_inputs: config.bench.as_ref().map_or(6, |b| b.k),
            enable_formality: config.global.enable_formality,
            lut_def,
        })
    }
}

pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    humantime::parse_duration(s).with_context(|| format!("invalid duration: {s}"))
}
