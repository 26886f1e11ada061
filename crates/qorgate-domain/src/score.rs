//! Cross-tool scoring for the benchmarking harness.
//!
//! The baseline is the reference mapper and the candidate the mapper under
//! evaluation. Every ratio is baseline / candidate in percent, so values above
//! 100 favour the candidate.

use qorgate_types::{BenchRow, BenchSummary, BucketScores, CaseScores, SizeBucket, ToolMetrics};

const SMALL_LIMIT: u64 = 1000;
const LARGE_LIMIT: u64 = 5000;

const AREA_WEIGHT: f64 = 30.0;
const LEVEL_WEIGHT: f64 = 70.0;

/// small `< 1000`, medium `1000..=5000`, large `> 5000`.
pub fn size_bucket(elements: u64) -> SizeBucket {
    if elements < SMALL_LIMIT {
        SizeBucket::Small
    } else if elements <= LARGE_LIMIT {
        SizeBucket::Medium
    } else {
        SizeBucket::Large
    }
}

fn ratio_pct(baseline: f64, candidate: f64) -> f64 {
    if candidate <= 0.0 {
        0.0
    } else {
        baseline / candidate * 100.0
    }
}

/// Per-case scores, or `None` when the candidate reported zero area or level.
pub fn case_scores(baseline: &ToolMetrics, candidate: &ToolMetrics) -> Option<CaseScores> {
    if candidate.area == 0 || candidate.level == 0 {
        return None;
    }

    let area_ratio = baseline.area as f64 / candidate.area as f64;
    let level_ratio = baseline.level as f64 / candidate.level as f64;

    Some(CaseScores {
        map_time: ratio_pct(baseline.map_time_s, candidate.map_time_s),
        wall_time: ratio_pct(baseline.wall_us as f64, candidate.wall_us as f64),
        memory: ratio_pct(
            baseline.memory_bytes as f64,
            candidate.memory_bytes as f64,
        ),
        weighted: AREA_WEIGHT * area_ratio + LEVEL_WEIGHT * level_ratio,
        product: area_ratio * level_ratio * 100.0,
    })
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0u32), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn bucket_average(rows: &[&BenchRow]) -> BucketScores {
    if rows.is_empty() {
        return BucketScores::default();
    }
    BucketScores {
        cases: rows.len() as u32,
        // a zero map time means the tool did not report one
        map_time: mean(
            rows.iter()
                .map(|r| r.scores.map_time)
                .filter(|v| *v > 0.0),
        ),
        wall_time: mean(rows.iter().map(|r| r.scores.wall_time)),
        memory: mean(rows.iter().map(|r| r.scores.memory)),
        weighted: mean(rows.iter().map(|r| r.scores.weighted)),
        product: mean(rows.iter().map(|r| r.scores.product)),
    }
}

/// Average each score family per size bucket, sized by baseline area.
pub fn bucket_scores(rows: &[BenchRow]) -> [(SizeBucket, BucketScores); 3] {
    let pick = |bucket: SizeBucket| -> Vec<&BenchRow> {
        rows.iter()
            .filter(|r| size_bucket(r.baseline.area) == bucket)
            .collect()
    };
    [
        SizeBucket::Small,
        SizeBucket::Medium,
        SizeBucket::Large,
    ]
    .map(|b| (b, bucket_average(&pick(b))))
}

pub fn summarize_bench(rows: &[BenchRow]) -> BenchSummary {
    let [(_, small), (_, medium), (_, large)] = bucket_scores(rows);

    let area_score = mean(
        rows.iter()
            .map(|r| ratio_pct(r.baseline.area as f64, r.candidate.area as f64)),
    );
    let level_score = mean(
        rows.iter()
            .map(|r| ratio_pct(r.baseline.level as f64, r.candidate.level as f64)),
    );
    let qor_score = mean(rows.iter().map(|r| r.scores.product));

    let worse_cases: Vec<String> = rows
        .iter()
        .filter(|r| r.candidate.area > r.baseline.area && r.candidate.level > r.baseline.level)
        .map(|r| r.name.clone())
        .collect();
    let better_cases: Vec<String> = rows
        .iter()
        .filter(|r| r.candidate.area <= r.baseline.area && r.candidate.level <= r.baseline.level)
        .map(|r| r.name.clone())
        .collect();

    let rate = |n: usize| {
        if rows.is_empty() {
            0.0
        } else {
            n as f64 / rows.len() as f64
        }
    };

    BenchSummary {
        small,
        medium,
        large,
        area_score,
        level_score,
        qor_score,
        worse_rate: rate(worse_cases.len()),
        better_rate: rate(better_cases.len()),
        worse_cases,
        better_cases,
    }
}
