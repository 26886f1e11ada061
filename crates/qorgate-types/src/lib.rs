//! Shared types for qorgate.
//!
//! Design goal: versioned, explicit, boring.
//! These structs describe cases, tool invocations, extracted metrics and the
//! reports produced once a batch has finished.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const REGRESSION_SCHEMA_V1: &str = "qorgate.regression.v1";
pub const BENCH_SCHEMA_V1: &str = "qorgate.bench.v1";

/// Name of the per-case metadata file.
pub const CASE_META_FILE: &str = "testinfo.toml";

/// Default per-command wall-clock limit (2 hours).
pub const DEFAULT_TIMEOUT_SECS: u64 = 2 * 60 * 60;

/// Marker printed by the combinational equivalence checker on a mismatch.
pub const NOT_EQUIVALENT_MARKER: &str = "Networks are NOT EQUIVALENT";

/// Marker printed by the formal verifier on success.
pub const FORMAL_SUCCESS_MARKER: &str = "Verification SUCCEEDED";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

// ----------------------------
// Case outcome
// ----------------------------

/// Terminal status of a case. Exactly one is assigned per case.
#[derive(
    Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Pass,
    AbnormalExit,
    Nonequivalent,
    WorseQor,
    WorsePerformance,
    PostCheckFailed,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Pass,
        Status::AbnormalExit,
        Status::Nonequivalent,
        Status::WorseQor,
        Status::WorsePerformance,
        Status::PostCheckFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pass => "PASS",
            Status::AbnormalExit => "ABNORMAL_EXIT",
            Status::Nonequivalent => "NONEQUIVALENT",
            Status::WorseQor => "WORSE_QOR",
            Status::WorsePerformance => "WORSE_PERFORMANCE",
            Status::PostCheckFailed => "POST_CHECK_FAILED",
        }
    }

    pub fn is_pass(self) -> bool {
        self == Status::Pass
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sequential phases of the per-case state machine.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    Running,
    Verifying,
    QorChecking,
    PostChecking,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Running => "running",
            Stage::Verifying => "verifying",
            Stage::QorChecking => "qor_checking",
            Stage::PostChecking => "post_checking",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// One line of a case's log trail.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct LogEntry {
    pub stage: Stage,
    pub level: LogLevel,
    pub message: String,
}

// ----------------------------
// Pipelines
// ----------------------------

/// Single optimization operators that can be exercised in isolation.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Balance,
    Rewrite,
    Refactor,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Balance => "balance",
            Operator::Rewrite => "rewrite",
            Operator::Refactor => "refactor",
        }
    }
}

/// Which pipeline variant drives a case.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    /// AIG optimization followed by LUT mapping.
    MappingFlow,
    /// RTL synthesis through a scripted synthesis tool.
    SynthesisFlow,
    /// One optimization operator run on its own.
    SingleOperatorFlow(Operator),
}

impl PipelineKind {
    pub fn label(self) -> String {
        match self {
            PipelineKind::MappingFlow => "mapping".to_string(),
            PipelineKind::SynthesisFlow => "synthesis".to_string(),
            PipelineKind::SingleOperatorFlow(op) => format!("operator:{}", op.as_str()),
        }
    }
}

// ----------------------------
// Process results and metrics
// ----------------------------

/// Outcome of one external command. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub wall_us: u64,
    #[serde(default)]
    pub timed_out: bool,
}

impl CommandResult {
    /// True when the command ran to completion with exit code 0.
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }

    /// stdout followed by stderr.
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    /// Ordered per-bucket counts, e.g. LUTs by fanin (index 0 = 1 input).
    Histogram(Vec<u64>),
}

impl MetricValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            MetricValue::Histogram(_) => None,
        }
    }

    pub fn as_histogram(&self) -> Option<&[u64]> {
        match self {
            MetricValue::Scalar(_) => None,
            MetricValue::Histogram(h) => Some(h),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Scalar(v) => write!(f, "{v}"),
            MetricValue::Histogram(h) => {
                let parts: Vec<String> = h.iter().map(u64::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

pub type MetricSet = BTreeMap<String, MetricValue>;

// ----------------------------
// Case metadata (testinfo.toml)
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct CaseMetaFile {
    #[serde(default)]
    pub flow: FlowSection,

    /// Metric name -> golden upper bound.
    #[serde(default)]
    pub qor: BTreeMap<String, i64>,

    #[serde(default)]
    pub performance: PerformanceSection,

    #[serde(default)]
    pub post_check: PostCheckSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct FlowSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,

    #[serde(default)]
    pub disable_verification: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct PerformanceSection {
    /// Wall-clock budget for the run stage, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wall_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct PostCheckSection {
    /// Files (relative to the case workspace) that must exist after the run.
    #[serde(default)]
    pub required_files: Vec<String>,
}

// ----------------------------
// Global config file
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bench: Option<BenchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct GlobalConfig {
    /// Directory holding one sub-directory per case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_dir: Option<String>,

    /// Root under which each batch creates a timestamped workspace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<String>,

    /// Overrides every case's own flow selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,

    /// Duration string parseable by humantime, e.g. "2h".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    #[serde(default)]
    pub enable_formality: bool,

    /// Technology library handed to the formal verifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lut_def: Option<String>,

    /// Retain per-case workspaces after the run (default: true).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_workspace: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ToolsConfig {
    #[serde(default = "ToolsConfig::default_abc")]
    pub abc: String,

    #[serde(default = "ToolsConfig::default_ifpga")]
    pub ifpga: String,

    #[serde(default = "ToolsConfig::default_yosys")]
    pub yosys: String,

    #[serde(default = "ToolsConfig::default_fm_shell")]
    pub fm_shell: String,
}

impl ToolsConfig {
    fn default_abc() -> String {
        "abc".to_string()
    }

    fn default_ifpga() -> String {
        "ifpga".to_string()
    }

    fn default_yosys() -> String {
        "yosys".to_string()
    }

    fn default_fm_shell() -> String {
        "fm_shell".to_string()
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            abc: Self::default_abc(),
            ifpga: Self::default_ifpga(),
            yosys: Self::default_yosys(),
            fm_shell: Self::default_fm_shell(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BenchConfig {
    /// Searched recursively for `*.aig` inputs.
    pub cases: String,

    pub workspace: String,

    /// LUT input bound.
    #[serde(default = "BenchConfig::default_k")]
    pub k: usize,

    pub lut_lib: String,

    /// Mapper configuration handed to the candidate tool.
    pub config_file: String,

    /// ABC optimization script applied before mapping.
    #[serde(default = "BenchConfig::default_opt_cmd")]
    pub opt_cmd: String,

    /// Skip the ABC optimization step.
    #[serde(default)]
    pub quick_run: bool,
}

impl BenchConfig {
    fn default_k() -> usize {
        6
    }

    fn default_opt_cmd() -> String {
        "&dch -v".to_string()
    }
}

// ----------------------------
// Regression report
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CaseRecord {
    pub name: String,
    pub workspace: String,
    pub pipeline: PipelineKind,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct StatusSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,

    /// Percentage in [0, 100]; 0 for an empty batch.
    pub pass_rate: f64,

    /// Every status, including empty buckets. Buckets sum to `total`.
    pub by_status: BTreeMap<Status, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RegressionReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub generated_at: String,
    pub workspace: String,
    pub summary: StatusSummary,
    pub cases: Vec<CaseRecord>,
}

// ----------------------------
// Benchmark report
// ----------------------------

/// QoR and resource figures one mapper produced for one case.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct ToolMetrics {
    /// LUT counts by fanin (index 0 = 1 input).
    pub luts: Vec<u64>,
    pub area: u64,
    pub level: u64,
    /// Mapping time reported by the tool itself, in seconds.
    pub map_time_s: f64,
    /// Wall-clock time of the whole invocation.
    pub wall_us: u64,
    pub memory_bytes: u64,
}

/// Baseline-over-candidate ratios, in percent. Higher favours the candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct CaseScores {
    pub map_time: f64,
    pub wall_time: f64,
    pub memory: f64,
    /// 30% area ratio + 70% level ratio.
    pub weighted: f64,
    /// area ratio * level ratio * 100.
    pub product: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BenchRow {
    pub name: String,
    pub baseline: ToolMetrics,
    pub candidate: ToolMetrics,
    pub scores: CaseScores,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SizeBucket {
    Small,
    Medium,
    Large,
}

impl SizeBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            SizeBucket::Small => "small",
            SizeBucket::Medium => "medium",
            SizeBucket::Large => "large",
        }
    }
}

/// Averages of each score family over one size bucket; all zero when empty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct BucketScores {
    pub cases: u32,
    pub map_time: f64,
    pub wall_time: f64,
    pub memory: f64,
    pub weighted: f64,
    pub product: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
pub struct BenchSummary {
    pub small: BucketScores,
    pub medium: BucketScores,
    pub large: BucketScores,
    pub area_score: f64,
    pub level_score: f64,
    pub qor_score: f64,
    pub worse_cases: Vec<String>,
    pub better_cases: Vec<String>,
    pub worse_rate: f64,
    pub better_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct BenchReport {
    pub schema: String,
    pub tool: ToolInfo,
    pub generated_at: String,
    pub lut_inputs: usize,
    pub rows: Vec<BenchRow>,
    pub summary: BenchSummary,

    /// Cases dropped because one of the tools produced no usable result.
    #[serde(default)]
    pub skipped: Vec<String>,
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn status_strategy() -> impl Strategy<Value = Status> {
        proptest::sample::select(Status::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn status_as_str_matches_serde(status in status_strategy()) {
            let json = serde_json::to_string(&status).unwrap();
            let back: Status = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, status);
            prop_assert_eq!(json.trim_matches('"'), status.as_str());
        }
    }
}
