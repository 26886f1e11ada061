//! Domain logic for qorgate.
//!
//! This crate is intentionally I/O-free: it parses text, applies policy and
//! does arithmetic. Processes and files live in `qorgate-adapters`.

mod extract;
mod lut;
mod qor;
mod score;
mod select;
mod summary;

pub use extract::{
    Aggregation, Coercion, ExtractError, MetricRule, MetricSpec, REGISTRY_VERSION, RuleKind,
    extract,
};
pub use lut::{MAX_LUT_INPUTS, count_lut_fanins, netlist_lut_area, weighted_lut_area};
pub use qor::{PerformanceRegression, QorCheck, QorRegression, check_performance, check_qor};
pub use score::{bucket_scores, case_scores, size_bucket, summarize_bench};
pub use select::{DEFAULT_FLOW, SelectError, parse_flow, select_pipeline};
pub use summary::summarize;
