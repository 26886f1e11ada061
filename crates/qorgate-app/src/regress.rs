//! Batch regression: discover cases, run them in parallel, summarize.

use crate::case::Case;
use crate::runner::{CaseOutcome, CaseRunner};
use crate::scheduler::Scheduler;
use crate::{Clock, RunSettings};
use anyhow::Context;
use qorgate_adapters::ProcessRunner;
use qorgate_adapters::fs::{list_case_dirs, prepare_workspace};
use qorgate_domain::summarize;
use qorgate_types::{REGRESSION_SCHEMA_V1, RegressionReport, ToolInfo};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RegressRequest {
    pub settings: RunSettings,
    /// One sub-directory per case.
    pub case_dir: PathBuf,
    /// Per-run directory; every case workspace is created inside it.
    pub run_dir: PathBuf,
    pub jobs: usize,
}

#[derive(Debug, Clone)]
pub struct RegressOutcome {
    pub report: RegressionReport,
    /// In case discovery order.
    pub cases: Vec<CaseOutcome>,
}

pub struct RegressUseCase<R: ProcessRunner, C: Clock> {
    runner: R,
    clock: C,
    tool: ToolInfo,
}

impl<R: ProcessRunner + Sync, C: Clock> RegressUseCase<R, C> {
    pub fn new(runner: R, clock: C, tool: ToolInfo) -> Self {
        Self {
            runner,
            clock,
            tool,
        }
    }

    /// Configuration problems (unreadable case directory, missing or invalid
    /// case metadata, unknown flow) fail the whole call before any case runs.
    /// Once scheduling starts, every case reaches a status and the report
    /// covers all of them.
    pub fn execute(&self, req: RegressRequest) -> anyhow::Result<RegressOutcome> {
        let sources = list_case_dirs(&req.case_dir)?;
        let override_flow = req.settings.flow_override.as_deref();

        let cases = sources
            .iter()
            .map(|source| Case::load(source, &req.run_dir, override_flow))
            .collect::<Result<Vec<_>, _>>()
            .context("invalid case set")?;

        tracing::info!(
            cases = cases.len(),
            jobs = req.jobs,
            run_dir = %req.run_dir.display(),
            "starting regression"
        );

        for case in &cases {
            prepare_workspace(&case.source, &req.run_dir)
                .with_context(|| format!("prepare workspace for case {}", case.name))?;
        }

        let runner = CaseRunner::new(&self.runner, req.settings);
        let outcomes = Scheduler::new(req.jobs).run(&cases, |case| runner.run(case))?;

        let keyed: Vec<(String, _)> = outcomes
            .iter()
            .map(|o| (o.workspace.display().to_string(), o.status))
            .collect();
        let summary = summarize(&keyed);

        tracing::info!(
            total = summary.total,
            failed = summary.failed,
            pass_rate = summary.pass_rate,
            "regression finished"
        );

        let report = RegressionReport {
            schema: REGRESSION_SCHEMA_V1.to_string(),
            tool: self.tool.clone(),
            generated_at: self.clock.now_rfc3339(),
            workspace: req.run_dir.display().to_string(),
            summary,
            cases: outcomes.iter().map(CaseOutcome::record).collect(),
        };

        Ok(RegressOutcome {
            report,
            cases: outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qorgate_fake::{FakeProcessRunner, ok};
    use qorgate_types::{CASE_META_FILE, Status};
    use std::path::Path;

    struct FixedClock;

    impl Clock for FixedClock {
        fn now_rfc3339(&self) -> String {
            "2026-01-01T00:00:00Z".to_string()
        }
        fn now_compact(&self) -> String {
            "260101-000000".to_string()
        }
    }

    fn tool() -> ToolInfo {
        ToolInfo {
            name: "qorgate".to_string(),
            version: "0.0.0".to_string(),
        }
    }

    fn add_case(root: &Path, name: &str, meta: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CASE_META_FILE), meta).unwrap();
        std::fs::write(dir.join(format!("{name}.aig")), "aig").unwrap();
    }

    #[test]
    fn ten_cases_on_four_workers() {
        let cases = tempfile::tempdir().unwrap();
        let runs = tempfile::tempdir().unwrap();
        for i in 0..10 {
            let meta = if i % 3 == 0 {
                "[flow]\nflow = \"balance\"\n[qor]\narea = 5\n"
            } else {
                "[flow]\nflow = \"balance\"\n[qor]\narea = 50\n"
            };
            add_case(cases.path(), &format!("case{i:02}"), meta);
        }

        let fake = FakeProcessRunner::new();
        fake.respond("balance 1", ok("area(before/after) : 20/10\n"));

        let usecase = RegressUseCase::new(fake, FixedClock, tool());
        let run_dir = runs.path().join("260101-000000");
        let out = usecase
            .execute(RegressRequest {
                settings: RunSettings::default(),
                case_dir: cases.path().to_path_buf(),
                run_dir: run_dir.clone(),
                jobs: 4,
            })
            .unwrap();

        let summary = &out.report.summary;
        assert_eq!(summary.total, 10);
        let bucketed: usize = summary.by_status.values().map(Vec::len).sum();
        assert_eq!(bucketed, 10);
        assert_eq!(summary.by_status[&Status::WorseQor].len(), 4);
        assert_eq!(summary.passed, 6);
        assert_eq!(out.cases.len(), 10);
        assert_eq!(out.cases[0].name, "case00");
        assert!(run_dir.join("case03").join("case03.aig").is_file());
        assert_eq!(out.report.generated_at, "2026-01-01T00:00:00Z");
    }

    #[test]
    fn bad_case_metadata_aborts_before_running() {
        let cases = tempfile::tempdir().unwrap();
        let runs = tempfile::tempdir().unwrap();
        add_case(cases.path(), "good", "[flow]\nflow = \"balance\"\n");
        add_case(cases.path(), "bad", "[flow]\nflow = \"vivado\"\n");

        let fake = FakeProcessRunner::new();
        let usecase = RegressUseCase::new(fake.clone(), FixedClock, tool());
        let err = usecase
            .execute(RegressRequest {
                settings: RunSettings::default(),
                case_dir: cases.path().to_path_buf(),
                run_dir: runs.path().join("r"),
                jobs: 2,
            })
            .unwrap_err();

        assert!(format!("{err:#}").contains("vivado"), "got {err:#}");
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn empty_case_dir_reports_zero() {
        let cases = tempfile::tempdir().unwrap();
        let runs = tempfile::tempdir().unwrap();
        let usecase = RegressUseCase::new(FakeProcessRunner::new(), FixedClock, tool());
        let out = usecase
            .execute(RegressRequest {
                settings: RunSettings::default(),
                case_dir: cases.path().to_path_buf(),
                run_dir: runs.path().join("r"),
                jobs: 4,
            })
            .unwrap();
        assert_eq!(out.report.summary.total, 0);
        assert_eq!(out.report.summary.pass_rate, 0.0);
    }
}
