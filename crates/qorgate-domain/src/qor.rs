//! QoR and performance gating against golden bounds.

use crate::extract::ExtractError;
use qorgate_types::MetricSet;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct QorRegression {
    pub metric: String,
    pub value: f64,
    pub bound: i64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QorCheck {
    /// Metrics that passed, with their extracted value.
    pub passed: Vec<(String, f64)>,
    pub regressions: Vec<QorRegression>,
}

impl QorCheck {
    pub fn is_pass(&self) -> bool {
        self.regressions.is_empty()
    }
}

/// Compare extracted metrics against golden upper bounds.
///
/// A metric regresses when its value is strictly greater than the bound.
/// A golden metric absent from `metrics` is an extraction failure, not a regression.
pub fn check_qor(
    metrics: &MetricSet,
    golden: &BTreeMap<String, i64>,
) -> Result<QorCheck, ExtractError> {
    let mut check = QorCheck::default();

    for (metric, bound) in golden {
        let value = metrics
            .get(metric)
            .ok_or_else(|| ExtractError::MetricNotFound {
                metric: metric.clone(),
                pattern: "<not extracted>".to_string(),
            })?
            .as_scalar()
            .ok_or_else(|| ExtractError::NotScalar(metric.clone()))?;

        if value > *bound as f64 {
            check.regressions.push(QorRegression {
                metric: metric.clone(),
                value,
                bound: *bound,
            });
        } else {
            check.passed.push((metric.clone(), value));
        }
    }

    Ok(check)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerformanceRegression {
    pub wall_ms: u64,
    pub budget_ms: u64,
}

/// Check a run-stage wall time against an optional budget.
pub fn check_performance(wall_us: u64, budget_ms: Option<u64>) -> Option<PerformanceRegression> {
    let budget_ms = budget_ms?;
    let wall_ms = wall_us / 1000;
    (wall_ms > budget_ms).then_some(PerformanceRegression { wall_ms, budget_ms })
}
