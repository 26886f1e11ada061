//! Cross-tool benchmark: ABC mapping (baseline) against ifpga (candidate).

use crate::Clock;
use crate::scheduler::Scheduler;
use anyhow::{Context, bail};
use qorgate_adapters::fs::{find_with_extension, read_text};
use qorgate_adapters::{CommandSpec, ProcessRunner};
use qorgate_domain::{
    MetricSpec, case_scores, count_lut_fanins, extract, netlist_lut_area, summarize_bench,
};
use qorgate_types::{
    BENCH_SCHEMA_V1, BenchConfig, BenchReport, BenchRow, CommandResult, MetricSet, ToolInfo,
    ToolMetrics, ToolsConfig,
};
use shell_words::quote;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BenchRequest {
    pub tools: ToolsConfig,
    /// Searched recursively for `*.aig`.
    pub cases: PathBuf,
    pub workspace: PathBuf,
    pub lut_inputs: usize,
    pub lut_lib: PathBuf,
    pub mapper_config: PathBuf,
    pub opt_cmd: String,
    pub quick_run: bool,
    pub timeout: Duration,
    pub jobs: usize,
}

impl BenchRequest {
    /// Relative paths in `bench` are taken against `base_dir`.
    pub fn from_config(
        tools: ToolsConfig,
        bench: &BenchConfig,
        base_dir: &Path,
        timeout: Duration,
        jobs: usize,
    ) -> Self {
        Self {
            tools,
            cases: base_dir.join(&bench.cases),
            workspace: base_dir.join(&bench.workspace),
            lut_inputs: bench.k,
            lut_lib: base_dir.join(&bench.lut_lib),
            mapper_config: base_dir.join(&bench.config_file),
            opt_cmd: bench.opt_cmd.trim().trim_matches('"').to_string(),
            quick_run: bench.quick_run,
            timeout,
            jobs,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BenchOutcome {
    pub report: BenchReport,
}

enum Measured {
    Row(BenchRow),
    Skipped { name: String, reason: String },
}

pub struct BenchUseCase<R: ProcessRunner, C: Clock> {
    runner: R,
    clock: C,
    tool: ToolInfo,
}

impl<R: ProcessRunner + Sync, C: Clock> BenchUseCase<R, C> {
    pub fn new(runner: R, clock: C, tool: ToolInfo) -> Self {
        Self {
            runner,
            clock,
            tool,
        }
    }

    pub fn execute(&self, req: BenchRequest) -> anyhow::Result<BenchOutcome> {
        let sources = find_with_extension(&req.cases, "aig")?;

        let mut seen = BTreeSet::new();
        for src in &sources {
            let name = case_name(src)?;
            if !seen.insert(name.clone()) {
                bail!("two benchmark cases are named {name:?}; workspaces would collide");
            }
        }

        std::fs::create_dir_all(&req.workspace)
            .with_context(|| format!("create {}", req.workspace.display()))?;

        tracing::info!(
            cases = sources.len(),
            k = req.lut_inputs,
            quick_run = req.quick_run,
            "starting benchmark"
        );

        let measured = Scheduler::new(req.jobs).run(&sources, |src| self.measure(src, &req))?;

        let mut rows = Vec::new();
        let mut skipped = Vec::new();
        for m in measured {
            match m {
                Measured::Row(row) => rows.push(row),
                Measured::Skipped { name, reason } => {
                    tracing::warn!(case = %name, "skipped: {reason}");
                    skipped.push(name);
                }
            }
        }
        rows.sort_by(|a, b| a.scores.weighted.total_cmp(&b.scores.weighted));

        let summary = summarize_bench(&rows);
        tracing::info!(
            rows = rows.len(),
            skipped = skipped.len(),
            qor_score = summary.qor_score,
            "benchmark finished"
        );

        Ok(BenchOutcome {
            report: BenchReport {
                schema: BENCH_SCHEMA_V1.to_string(),
                tool: self.tool.clone(),
                generated_at: self.clock.now_rfc3339(),
                lut_inputs: req.lut_inputs,
                rows,
                summary,
                skipped,
            },
        })
    }

    fn measure(&self, source: &Path, req: &BenchRequest) -> Measured {
        let name = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        match self.try_measure(&name, source, req) {
            Ok(row) => Measured::Row(row),
            Err(reason) => Measured::Skipped { name, reason },
        }
    }

    fn try_measure(
        &self,
        name: &str,
        source: &Path,
        req: &BenchRequest,
    ) -> Result<BenchRow, String> {
        let dir = req.workspace.join(name);
        std::fs::create_dir_all(&dir).map_err(|e| format!("create {}: {e}", dir.display()))?;
        let aig = format!("{name}.aig");
        std::fs::copy(source, dir.join(&aig))
            .map_err(|e| format!("copy {}: {e}", source.display()))?;

        let abc = quote(&req.tools.abc);

        let mapped_input = if req.quick_run {
            tracing::debug!(case = name, "quick run, skipping ABC optimization");
            aig.clone()
        } else {
            let opt = format!("{name}.opt.aig");
            let script = format!("&read {aig}; {}; &write {opt}", req.opt_cmd);
            self.exec(&dir, &format!("{abc} -c {}", quote(&script)), req)?;
            opt
        };

        // baseline
        let netlist = format!("{name}.abc.v");
        let script = format!(
            "&read {mapped_input}; read_lut {}; &if -v -K {}; &put; sweep; write_verilog {netlist}; print_gates; print_level",
            req.lut_lib.display(),
            req.lut_inputs
        );
        let abc_run = self.exec(&dir, &format!("{abc} -c {}", quote(&script)), req)?;
        let text = read_text(&dir.join(&netlist)).map_err(|e| format!("{e:#}"))?;
        let luts = count_lut_fanins(&text, req.lut_inputs);
        let area = netlist_lut_area(&luts, req.lut_inputs);
        if area == 0 {
            return Err("baseline area is 0".to_string());
        }
        let abc_metrics = extract(
            &abc_run.combined_output(),
            &MetricSpec::abc_mapping(),
            &["level", "memory", "map_time"],
        )
        .map_err(|e| format!("abc output: {e}"))?;
        let baseline = ToolMetrics {
            luts,
            area,
            level: scalar(&abc_metrics, "level") as u64,
            map_time_s: scalar(&abc_metrics, "map_time"),
            wall_us: abc_run.wall_us,
            memory_bytes: scalar(&abc_metrics, "memory") as u64,
        };

        // candidate
        let command = format!(
            "{} -i {} -c {} -v {}",
            quote(&req.tools.ifpga),
            quote(&dir.to_string_lossy()),
            quote(&req.mapper_config.to_string_lossy()),
            quote(&format!("{name}.ifpga.v")),
        );
        let ifpga_run = self.exec(&dir, &command, req)?;
        let output = ifpga_run.combined_output();
        let spec = MetricSpec::mapper(req.lut_inputs);
        let metrics = extract(
            &output,
            &spec,
            &["luts", "area", "level", "memory", "map_time"],
        )
        .map_err(|e| format!("ifpga output: {e}"))?;
        let candidate = ToolMetrics {
            luts: metrics["luts"].as_histogram().unwrap_or_default().to_vec(),
            area: scalar(&metrics, "area") as u64,
            level: scalar(&metrics, "level") as u64,
            map_time_s: scalar(&metrics, "map_time"),
            wall_us: ifpga_run.wall_us,
            memory_bytes: scalar(&metrics, "memory") as u64,
        };

        let scores = case_scores(&baseline, &candidate)
            .ok_or_else(|| "candidate reported zero area or level".to_string())?;
        tracing::info!(
            case = name,
            baseline_area = baseline.area,
            baseline_level = baseline.level,
            candidate_area = candidate.area,
            candidate_level = candidate.level,
            "measured"
        );

        Ok(BenchRow {
            name: name.to_string(),
            baseline,
            candidate,
            scores,
        })
    }

    fn exec(&self, dir: &Path, command: &str, req: &BenchRequest) -> Result<CommandResult, String> {
        tracing::debug!(command, "run");
        let spec = CommandSpec::new(command).cwd(dir).timeout(req.timeout);
        let result = self
            .runner
            .run(&spec)
            .map_err(|e| format!("cannot start `{command}`: {e}"))?;
        if result.timed_out {
            return Err(format!("`{command}` timed out"));
        }
        if result.exit_code != 0 {
            return Err(format!("`{command}` exited with code {}", result.exit_code));
        }
        Ok(result)
    }
}

fn case_name(source: &Path) -> anyhow::Result<String> {
    source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", source.display()))
}

/// `metrics` came from a successful `extract` over `name`, so the value exists.
fn scalar(metrics: &MetricSet, name: &str) -> f64 {
    metrics
        .get(name)
        .and_then(|v| v.as_scalar())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qorgate_fake::{FakeProcessRunner, exit, ok};

    struct FixedClock;

    impl Clock for FixedClock {
        fn now_rfc3339(&self) -> String {
            "2026-01-01T00:00:00Z".to_string()
        }
        fn now_compact(&self) -> String {
            "260101-000000".to_string()
        }
    }

    const ABC_NETLIST: &str = "\
module top(a, b, c, y0, y1, y2);
  assign y0 = a & b;
  assign y1 = a | c;
  assign y2 = ~(a & b & c);
endmodule
";

    const ABC_LOG: &str = "\
Level = 2
Level = 4
Peak memory: 1000 bytes
Total time = 0.50 sec
";

    const IFPGA_LOG: &str = "\
LUT fanins:2 numbers :2
max delay : 4
Peak memory: 500 bytes
Mapping time: 0.25
";

    fn request(cases: &Path, workspace: &Path, quick_run: bool) -> BenchRequest {
        BenchRequest {
            tools: ToolsConfig::default(),
            cases: cases.to_path_buf(),
            workspace: workspace.to_path_buf(),
            lut_inputs: 6,
            lut_lib: PathBuf::from("/lib/k6.lib"),
            mapper_config: PathBuf::from("/cfg/ifpga.ini"),
            opt_cmd: "&dch -v".to_string(),
            quick_run,
            timeout: Duration::from_secs(60),
            jobs: 2,
        }
    }

    fn add_aig(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "aig").unwrap();
    }

    fn tool() -> ToolInfo {
        ToolInfo {
            name: "qorgate".to_string(),
            version: "0.0.0".to_string(),
        }
    }

    #[test]
    fn scores_every_case() {
        let cases = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        add_aig(cases.path(), "alu.aig");
        add_aig(cases.path(), "nested/mul.aig");

        let fake = FakeProcessRunner::new();
        fake.respond_with_files("write_verilog alu", ok(ABC_LOG), &[("alu.abc.v", ABC_NETLIST)]);
        fake.respond_with_files("write_verilog mul", ok(ABC_LOG), &[("mul.abc.v", ABC_NETLIST)]);
        fake.respond("-c /cfg/ifpga.ini", ok(IFPGA_LOG));

        let out = BenchUseCase::new(fake.clone(), FixedClock, tool())
            .execute(request(cases.path(), ws.path(), false))
            .unwrap();
        let report = out.report;

        assert_eq!(report.rows.len(), 2, "skipped: {:?}", report.skipped);
        let row = &report.rows[0];
        assert_eq!(row.baseline.luts, vec![0, 2, 1, 0, 0, 0]);
        assert_eq!(row.baseline.area, 3);
        assert_eq!(row.baseline.level, 4);
        assert_eq!(row.candidate.area, 2);
        assert_eq!(row.candidate.memory_bytes, 500);
        // 30 * 3/2 + 70 * 4/4
        assert!((row.scores.weighted - 115.0).abs() < 1e-9);
        assert_eq!(report.summary.small.cases, 2);
        assert_eq!(report.summary.better_cases.len(), 2);
        assert_eq!(fake.call_count_matching("&dch -v"), 2);
    }

    #[test]
    fn quick_run_maps_the_original_aig() {
        let cases = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        add_aig(cases.path(), "alu.aig");

        let fake = FakeProcessRunner::new();
        fake.respond_with_files("&if -v", ok(ABC_LOG), &[("alu.abc.v", ABC_NETLIST)]);
        fake.respond("-c /cfg/ifpga.ini", ok(IFPGA_LOG));

        let out = BenchUseCase::new(fake.clone(), FixedClock, tool())
            .execute(request(cases.path(), ws.path(), true))
            .unwrap();
        assert_eq!(out.report.rows.len(), 1);
        assert_eq!(fake.call_count_matching("&dch"), 0);
        assert_eq!(fake.call_count_matching("&read alu.aig; read_lut"), 1);
    }

    #[test]
    fn failing_candidate_is_skipped() {
        let cases = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        add_aig(cases.path(), "alu.aig");

        let fake = FakeProcessRunner::new();
        fake.respond_with_files("&if -v", ok(ABC_LOG), &[("alu.abc.v", ABC_NETLIST)]);
        fake.respond("-c /cfg/ifpga.ini", exit(1, "error: bad config"));

        let out = BenchUseCase::new(fake, FixedClock, tool())
            .execute(request(cases.path(), ws.path(), true))
            .unwrap();
        assert!(out.report.rows.is_empty());
        assert_eq!(out.report.skipped, vec!["alu".to_string()]);
        assert_eq!(out.report.summary.qor_score, 0.0);
    }

    #[test]
    fn unparsable_baseline_log_is_skipped() {
        let cases = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        add_aig(cases.path(), "alu.aig");

        let fake = FakeProcessRunner::new();
        fake.respond_with_files(
            "&if -v",
            ok("abc: unrecognised output\n"),
            &[("alu.abc.v", ABC_NETLIST)],
        );
        fake.respond("-c /cfg/ifpga.ini", ok(IFPGA_LOG));

        let out = BenchUseCase::new(fake.clone(), FixedClock, tool())
            .execute(request(cases.path(), ws.path(), true))
            .unwrap();
        assert!(out.report.rows.is_empty());
        assert_eq!(out.report.skipped, vec!["alu".to_string()]);
        assert!(out.report.summary.worse_cases.is_empty());
        assert!(out.report.summary.better_cases.is_empty());
        assert_eq!(fake.call_count_matching("ifpga.ini"), 0);
    }

    #[test]
    fn candidate_without_memory_report_is_skipped() {
        let cases = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        add_aig(cases.path(), "alu.aig");

        let fake = FakeProcessRunner::new();
        fake.respond_with_files("&if -v", ok(ABC_LOG), &[("alu.abc.v", ABC_NETLIST)]);
        fake.respond(
            "-c /cfg/ifpga.ini",
            ok("LUT fanins:2 numbers :2\nmax delay : 4\nMapping time: 0.25\n"),
        );

        let out = BenchUseCase::new(fake, FixedClock, tool())
            .execute(request(cases.path(), ws.path(), true))
            .unwrap();
        assert!(out.report.rows.is_empty());
        assert_eq!(out.report.skipped, vec!["alu".to_string()]);
    }

    #[test]
    fn k7_baseline_counts_seven_input_luts_twice() {
        let cases = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        add_aig(cases.path(), "wide.aig");

        let netlist = "\
module top(a, b, c, d, e, f, g, y0, y1);
  assign y0 = a & b;
  assign y1 = a & b & c & d & e & f & g;
endmodule
";
        let fake = FakeProcessRunner::new();
        fake.respond_with_files("&if -v", ok(ABC_LOG), &[("wide.abc.v", netlist)]);
        fake.respond("-c /cfg/ifpga.ini", ok(IFPGA_LOG));

        let mut req = request(cases.path(), ws.path(), true);
        req.lut_inputs = 7;
        let out = BenchUseCase::new(fake, FixedClock, tool()).execute(req).unwrap();
        assert_eq!(out.report.rows.len(), 1, "skipped: {:?}", out.report.skipped);
        let baseline = &out.report.rows[0].baseline;
        assert_eq!(baseline.luts, vec![0, 1, 0, 0, 0, 0, 1]);
        assert_eq!(baseline.area, 3);
    }

    #[test]
    fn empty_baseline_is_skipped() {
        let cases = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        add_aig(cases.path(), "const.aig");

        let fake = FakeProcessRunner::new();
        fake.respond_with_files("&if -v", ok(ABC_LOG), &[("const.abc.v", "assign y = 1'b0;\n")]);

        let out = BenchUseCase::new(fake.clone(), FixedClock, tool())
            .execute(request(cases.path(), ws.path(), true))
            .unwrap();
        assert_eq!(out.report.skipped, vec!["const".to_string()]);
        assert_eq!(fake.call_count_matching("ifpga.ini"), 0);
    }

    #[test]
    fn duplicate_case_names_are_rejected() {
        let cases = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        add_aig(cases.path(), "a/alu.aig");
        add_aig(cases.path(), "b/alu.aig");

        let err = BenchUseCase::new(FakeProcessRunner::new(), FixedClock, tool())
            .execute(request(cases.path(), ws.path(), true))
            .unwrap_err();
        assert!(err.to_string().contains("alu"));
    }
}
