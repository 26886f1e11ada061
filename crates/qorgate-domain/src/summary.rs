use qorgate_types::{Status, StatusSummary};
use std::collections::BTreeMap;

/// Bucket case identities by terminal status and compute the pass rate.
///
/// Every status gets a bucket (possibly empty), so bucket sizes always sum to
/// `total`. Within a bucket, input order is preserved.
pub fn summarize<S: AsRef<str>>(results: &[(S, Status)]) -> StatusSummary {
    let mut by_status: BTreeMap<Status, Vec<String>> =
        Status::ALL.iter().map(|s| (*s, Vec::new())).collect();

    for (name, status) in results {
        by_status
            .entry(*status)
            .or_default()
            .push(name.as_ref().to_string());
    }

    let total = results.len() as u32;
    let passed = by_status.get(&Status::Pass).map_or(0, Vec::len) as u32;
    let pass_rate = if total == 0 {
        0.0
    } else {
        100.0 * passed as f64 / total as f64
    };

    StatusSummary {
        total,
        passed,
        failed: total - passed,
        pass_rate,
        by_status,
    }
}
