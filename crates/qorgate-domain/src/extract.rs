//! Metric extraction from free-text tool logs.
//!
//! Every pattern the harness depends on lives in this file. When a tool changes
//! its output format, this registry is the only place that needs updating; bump
//! [`REGISTRY_VERSION`] when it does.

use crate::lut::{MAX_LUT_INPUTS, weighted_lut_area};
use qorgate_types::{MetricSet, MetricValue, PipelineKind};
use regex::Regex;

pub const REGISTRY_VERSION: &str = "qorgate.patterns.v1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("metric {metric:?} not found in tool output (pattern `{pattern}`)")]
    MetricNotFound { metric: String, pattern: String },

    #[error("metric {metric:?} is not defined in the {spec} pattern set")]
    UnknownMetric { metric: String, spec: String },

    #[error("metric {metric:?}: cannot parse {raw:?} as a number")]
    InvalidValue { metric: String, raw: String },

    #[error("metric {0:?} is a histogram, not a scalar")]
    NotScalar(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Integer,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Value of the first match.
    First,
    /// Largest value over every match in the text.
    Max,
}

#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Capture group 1 holds the value.
    Scalar {
        pattern: Regex,
        coercion: Coercion,
        aggregation: Aggregation,
    },
    /// Capture group 1 is the 1-based bucket, group 2 its count.
    /// The first occurrence of a bucket wins; unreported buckets are zero.
    Histogram { pattern: Regex },
    /// Weighted LUT area computed from another (histogram) rule.
    WeightedArea { histogram: &'static str },
}

#[derive(Debug, Clone)]
pub struct MetricRule {
    pub name: &'static str,
    pub kind: RuleKind,
}

/// A named, versioned table of metric rules for one tool's output.
#[derive(Debug, Clone)]
pub struct MetricSpec {
    tool: &'static str,
    lut_inputs: usize,
    rules: Vec<MetricRule>,
}

fn pattern(src: &str) -> Regex {
    // Registry patterns are literals; a failure here is a programming error
    // caught by the registry tests.
    Regex::new(src).expect("registry pattern must compile")
}

fn scalar(name: &'static str, src: &str, coercion: Coercion, aggregation: Aggregation) -> MetricRule {
    MetricRule {
        name,
        kind: RuleKind::Scalar {
            pattern: pattern(src),
            coercion,
            aggregation,
        },
    }
}

impl MetricSpec {
    /// Output of the LUT mapper (`ifpga`).
    pub fn mapper(lut_inputs: usize) -> Self {
        Self {
            tool: "ifpga",
            lut_inputs,
            rules: vec![
                MetricRule {
                    name: "luts",
                    kind: RuleKind::Histogram {
                        pattern: pattern(r"LUT fanins:\s*(\d+)\s*numbers\s*:\s*(\d+)"),
                    },
                },
                MetricRule {
                    name: "area",
                    kind: RuleKind::WeightedArea { histogram: "luts" },
                },
                scalar(
                    "level",
                    r"max delay\s*:\s*(\d+)",
                    Coercion::Integer,
                    Aggregation::First,
                ),
                scalar(
                    "memory",
                    r"Peak memory:\s*(\d+)\s*bytes",
                    Coercion::Integer,
                    Aggregation::First,
                ),
                scalar(
                    "map_time",
                    r"Mapping time:\s*([0-9][0-9.eE+\-]*)",
                    Coercion::Float,
                    Aggregation::First,
                ),
            ],
        }
    }

    /// Output of an ABC mapping script ending in `print_gates; print_level`.
    pub fn abc_mapping() -> Self {
        Self {
            tool: "abc",
            lut_inputs: 0,
            rules: vec![
                scalar(
                    "level",
                    r"Level\s*=\s*(\d+)",
                    Coercion::Integer,
                    Aggregation::Max,
                ),
                scalar(
                    "memory",
                    r"Peak memory:\s*(\d+)\s*bytes",
                    Coercion::Integer,
                    Aggregation::First,
                ),
                scalar(
                    "map_time",
                    r"Total time\s*=\s*([0-9][0-9.]*)",
                    Coercion::Float,
                    Aggregation::First,
                ),
            ],
        }
    }

    /// `stat` report of the synthesis tool.
    pub fn synthesis() -> Self {
        Self {
            tool: "yosys",
            lut_inputs: 0,
            rules: vec![scalar(
                "lut",
                r"\$lut\s+(\d+)",
                Coercion::Integer,
                Aggregation::First,
            )],
        }
    }

    /// Before/after summary printed by a single optimization operator.
    pub fn operator() -> Self {
        Self {
            tool: "operator",
            lut_inputs: 0,
            rules: vec![
                scalar(
                    "area",
                    r"area\(before/after\)\s*:\s*\d+/(\d+)",
                    Coercion::Integer,
                    Aggregation::First,
                ),
                scalar(
                    "level",
                    r"level\(before/after\)\s*:\s*\d+/(\d+)",
                    Coercion::Integer,
                    Aggregation::First,
                ),
            ],
        }
    }

    /// Registry for the tool whose log a pipeline's QoR gate reads.
    pub fn for_pipeline(kind: PipelineKind, lut_inputs: usize) -> Self {
        match kind {
            PipelineKind::MappingFlow => Self::mapper(lut_inputs),
            PipelineKind::SynthesisFlow => Self::synthesis(),
            PipelineKind::SingleOperatorFlow(_) => Self::operator(),
        }
    }

    pub fn tool(&self) -> &'static str {
        self.tool
    }

    pub fn version(&self) -> &'static str {
        REGISTRY_VERSION
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.name)
    }

    pub fn rule(&self, name: &str) -> Option<&MetricRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Every metric the text yields; missing ones are left out.
    pub fn extract_available(&self, text: &str) -> MetricSet {
        self.rules
            .iter()
            .filter_map(|r| {
                self.evaluate(text, r.name)
                    .ok()
                    .map(|v| (r.name.to_string(), v))
            })
            .collect()
    }

    fn evaluate(&self, text: &str, name: &str) -> Result<MetricValue, ExtractError> {
        let rule = self.rule(name).ok_or_else(|| ExtractError::UnknownMetric {
            metric: name.to_string(),
            spec: self.tool.to_string(),
        })?;

        match &rule.kind {
            RuleKind::Scalar {
                pattern,
                coercion,
                aggregation,
            } => {
                let mut best: Option<f64> = None;
                for caps in pattern.captures_iter(text) {
                    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let value = coerce(name, raw, *coercion)?;
                    match aggregation {
                        Aggregation::First => return Ok(MetricValue::Scalar(value)),
                        Aggregation::Max => {
                            best = Some(best.map_or(value, |b| b.max(value)));
                        }
                    }
                }
                best.map(MetricValue::Scalar)
                    .ok_or_else(|| not_found(name, pattern))
            }
            RuleKind::Histogram { pattern } => {
                let mut buckets: Vec<Option<u64>> = vec![None; self.lut_inputs];
                let mut matched = false;
                for caps in pattern.captures_iter(text) {
                    let raw_idx = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                    let raw_count = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                    let idx: usize = raw_idx.parse().map_err(|_| invalid(name, raw_idx))?;
                    let count: u64 = raw_count.parse().map_err(|_| invalid(name, raw_count))?;
                    if idx == 0 {
                        continue;
                    }
                    if idx > MAX_LUT_INPUTS {
                        return Err(invalid(name, raw_idx));
                    }
                    matched = true;
                    if idx > buckets.len() {
                        buckets.resize(idx, None);
                    }
                    buckets[idx - 1].get_or_insert(count);
                }
                if !matched {
                    return Err(not_found(name, pattern));
                }
                Ok(MetricValue::Histogram(
                    buckets.into_iter().map(|b| b.unwrap_or(0)).collect(),
                ))
            }
            RuleKind::WeightedArea { histogram } => match self.evaluate(text, histogram)? {
                MetricValue::Histogram(counts) => {
                    Ok(MetricValue::Scalar(weighted_lut_area(&counts) as f64))
                }
                MetricValue::Scalar(_) => Err(ExtractError::InvalidValue {
                    metric: name.to_string(),
                    raw: histogram.to_string(),
                }),
            },
        }
    }
}

fn coerce(metric: &str, raw: &str, coercion: Coercion) -> Result<f64, ExtractError> {
    match coercion {
        Coercion::Integer => raw
            .parse::<u64>()
            .map(|v| v as f64)
            .map_err(|_| invalid(metric, raw)),
        Coercion::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| invalid(metric, raw)),
    }
}

fn invalid(metric: &str, raw: &str) -> ExtractError {
    ExtractError::InvalidValue {
        metric: metric.to_string(),
        raw: raw.to_string(),
    }
}

fn not_found(metric: &str, pattern: &Regex) -> ExtractError {
    ExtractError::MetricNotFound {
        metric: metric.to_string(),
        pattern: pattern.as_str().to_string(),
    }
}

/// Extract exactly the `required` metrics from `text`.
///
/// Either every required metric is found or the call fails; a partial
/// [`MetricSet`] is never returned.
pub fn extract<S: AsRef<str>>(
    text: &str,
    spec: &MetricSpec,
    required: &[S],
) -> Result<MetricSet, ExtractError> {
    let mut set = MetricSet::new();
    for name in required {
        let name = name.as_ref();
        let value = spec.evaluate(text, name)?;
        set.insert(name.to_string(), value);
    }
    Ok(set)
}
