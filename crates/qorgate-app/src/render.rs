//! Plain-text renderings of case logs and reports.

use crate::runner::CaseOutcome;
use qorgate_types::{BenchReport, BenchRow, RegressionReport, Status, ToolMetrics};

/// The `regression.rpt` summary.
///
/// ```text
/// Summary:
/// Total:  3
/// Failed: 1
/// Pass Rate: 66.67%
/// WORSE_QOR:
///     /runs/240101-120000/adder
/// ```
pub fn regression_rpt(report: &RegressionReport) -> String {
    let s = &report.summary;
    let mut out = format!(
        "Summary:\nTotal:  {}\nFailed: {}\nPass Rate: {:.2}%\n",
        s.total, s.failed, s.pass_rate
    );

    for status in Status::ALL.iter().filter(|st| !st.is_pass()) {
        let Some(cases) = s.by_status.get(status).filter(|c| !c.is_empty()) else {
            continue;
        };
        out.push_str(&format!("{status}:\n"));
        for case in cases {
            out.push_str(&format!("    {case}\n"));
        }
    }

    out
}

/// A case's log trail followed by the raw output of every command it ran.
pub fn case_log(outcome: &CaseOutcome) -> String {
    let mut out = String::new();
    for entry in &outcome.log {
        out.push_str(&format!(
            "[{}] {}: {}\n",
            entry.level.as_str(),
            entry.stage,
            entry.message
        ));
    }

    for record in &outcome.commands {
        let r = &record.result;
        out.push_str(&format!(
            "\n---- {} `{}` (exit {}, {} us{})\n",
            record.stage,
            record.command,
            r.exit_code,
            r.wall_us,
            if r.timed_out { ", timed out" } else { "" }
        ));
        if !r.stdout.is_empty() {
            out.push_str("[stdout]\n");
            out.push_str(&r.stdout);
            if !r.stdout.ends_with('\n') {
                out.push('\n');
            }
        }
        if !r.stderr.is_empty() {
            out.push_str("[stderr]\n");
            out.push_str(&r.stderr);
            if !r.stderr.ends_with('\n') {
                out.push('\n');
            }
        }
    }

    out
}

fn header(k: usize) -> Vec<String> {
    let mut h = vec!["case_name".to_string()];
    for tool in ["abc", "ifpga"] {
        h.extend((1..=k).map(|i| format!("{tool}_lut{i}")));
        h.extend(
            ["area", "level", "maptime", "time", "mem"]
                .iter()
                .map(|m| format!("{tool}_{m}")),
        );
    }
    h.extend(
        ["maptime_score", "time_score", "mem_score", "score", "score2"]
            .iter()
            .map(|s| s.to_string()),
    );
    h
}

fn tool_cells(m: &ToolMetrics, k: usize) -> Vec<String> {
    let mut cells: Vec<String> = (0..k)
        .map(|i| m.luts.get(i).copied().unwrap_or(0).to_string())
        .collect();
    cells.extend([
        m.area.to_string(),
        m.level.to_string(),
        m.map_time_s.to_string(),
        m.wall_us.to_string(),
        m.memory_bytes.to_string(),
    ]);
    cells
}

fn row_cells(row: &BenchRow, k: usize) -> Vec<String> {
    let mut cells = vec![row.name.clone()];
    cells.extend(tool_cells(&row.baseline, k));
    cells.extend(tool_cells(&row.candidate, k));
    let s = &row.scores;
    cells.extend(
        [s.map_time, s.wall_time, s.memory, s.weighted, s.product]
            .iter()
            .map(|v| format!("{v:.2}")),
    );
    cells
}

fn table(report: &BenchReport) -> Vec<Vec<String>> {
    let k = report.lut_inputs;
    std::iter::once(header(k))
        .chain(report.rows.iter().map(|r| row_cells(r, k)))
        .collect()
}

/// Fixed-width per-case table followed by the aggregate scores.
pub fn bench_table(report: &BenchReport) -> String {
    let rows = table(report);
    let columns = rows.first().map_or(0, Vec::len);
    let widths: Vec<usize> = (0..columns)
        .map(|c| rows.iter().map(|r| r[c].len()).max().unwrap_or(0))
        .collect();

    let mut out = String::new();
    for row in &rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect();
        out.push_str(line.join(" ").trim_end());
        out.push('\n');
    }

    let s = &report.summary;
    let names = |v: &[String]| v.join(", ");
    out.push_str(&format!("worse cases: {}\n", names(&s.worse_cases)));
    out.push_str(&format!("worse rate: {:.4}\n", s.worse_rate));
    out.push_str(&format!("better cases: {}\n", names(&s.better_cases)));
    out.push_str(&format!("better rate: {:.4}\n", s.better_rate));
    for (label, bucket) in [("small", &s.small), ("medium", &s.medium), ("large", &s.large)] {
        out.push_str(&format!(
            "{label} ({} cases): maptime {:.2}, time {:.2}, memory {:.2}, score {:.2}, score2 {:.2}\n",
            bucket.cases, bucket.map_time, bucket.wall_time, bucket.memory, bucket.weighted, bucket.product
        ));
    }
    out.push_str(&format!("area score: {:.2}\n", s.area_score));
    out.push_str(&format!("level score: {:.2}\n", s.level_score));
    out.push_str(&format!("QoR score: {:.2}\n", s.qor_score));
    if !report.skipped.is_empty() {
        out.push_str(&format!("skipped: {}\n", names(&report.skipped)));
    }
    out
}

/// `bench.csv`: header, one row per case, then a space-separated line of
/// bucketed map-time, wall-time and memory scores (small, medium, large)
/// followed by the area, level and QoR scores.
pub fn bench_csv(report: &BenchReport) -> String {
    let mut out: String = table(report)
        .iter()
        .map(|r| r.join(","))
        .collect::<Vec<_>>()
        .join("\n");

    let s = &report.summary;
    let trailer = [
        s.small.map_time,
        s.medium.map_time,
        s.large.map_time,
        s.small.wall_time,
        s.medium.wall_time,
        s.large.wall_time,
        s.small.memory,
        s.medium.memory,
        s.large.memory,
        s.area_score,
        s.level_score,
        s.qor_score,
    ]
    .iter()
    .map(|v| format!("{v:.2}"))
    .collect::<Vec<_>>()
    .join(" ");

    out.push('\n');
    out.push_str(&trailer);
    out.push('\n');
    out
}
