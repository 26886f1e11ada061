//! The per-case state machine.
//!
//! `INIT -> RUNNING -> VERIFYING -> QOR_CHECKING -> POST_CHECKING -> DONE`.
//! The first failing stage decides the status; nothing is retried.

use crate::RunSettings;
use crate::case::Case;
use crate::flow::{CheckOutcome, FlowStrategy, Script, strategy_for};
use crate::postcheck::{PostCheck, RequiredFiles};
use qorgate_adapters::{CommandSpec, ProcessRunner};
use qorgate_domain::{check_performance, check_qor, extract};
use qorgate_types::{
    CaseRecord, CommandResult, LogEntry, LogLevel, MetricSet, PipelineKind, Stage, Status,
};
use std::path::PathBuf;

/// One external command issued while driving a case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub stage: Stage,
    pub command: String,
    pub result: CommandResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseOutcome {
    pub name: String,
    pub workspace: PathBuf,
    pub pipeline: PipelineKind,
    pub status: Status,
    pub log: Vec<LogEntry>,
    pub commands: Vec<CommandRecord>,
    /// Metrics read from the run stage, when it got that far.
    pub metrics: MetricSet,
    /// Sum of wall time over the run-stage commands.
    pub run_wall_us: u64,
}

impl CaseOutcome {
    pub fn record(&self) -> CaseRecord {
        CaseRecord {
            name: self.name.clone(),
            workspace: self.workspace.display().to_string(),
            pipeline: self.pipeline,
            status: self.status,
        }
    }
}

struct Trail<'a> {
    case: &'a str,
    log: Vec<LogEntry>,
    commands: Vec<CommandRecord>,
    metrics: MetricSet,
    run_wall_us: u64,
}

impl<'a> Trail<'a> {
    fn new(case: &'a str) -> Self {
        Self {
            case,
            log: Vec::new(),
            commands: Vec::new(),
            metrics: MetricSet::new(),
            run_wall_us: 0,
        }
    }

    fn note(&mut self, stage: Stage, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        let case = self.case;
        let stage_name = stage.as_str();
        match level {
            LogLevel::Debug => tracing::debug!(case, stage = stage_name, "{message}"),
            LogLevel::Info => tracing::info!(case, stage = stage_name, "{message}"),
            LogLevel::Warn => tracing::warn!(case, stage = stage_name, "{message}"),
            LogLevel::Error => tracing::error!(case, stage = stage_name, "{message}"),
        }
        self.log.push(LogEntry {
            stage,
            level,
            message,
        });
    }
}

pub struct CaseRunner<R: ProcessRunner> {
    runner: R,
    settings: RunSettings,
    post_check: Box<dyn PostCheck>,
}

impl<R: ProcessRunner> CaseRunner<R> {
    /// Post-checking defaults to [`RequiredFiles`], which passes for cases
    /// that list none.
    pub fn new(runner: R, settings: RunSettings) -> Self {
        Self {
            runner,
            settings,
            post_check: Box::new(RequiredFiles),
        }
    }

    pub fn with_post_check(mut self, check: impl PostCheck + 'static) -> Self {
        self.post_check = Box::new(check);
        self
    }

    /// Drive `case` to exactly one terminal status.
    ///
    /// The workspace must already hold the case's files.
    pub fn run(&self, case: &Case) -> CaseOutcome {
        let mut trail = Trail::new(&case.name);
        trail.note(
            Stage::Init,
            LogLevel::Info,
            format!(
                "start {} case from {}",
                case.kind.label(),
                case.source.display()
            ),
        );

        let strategy = strategy_for(case.kind);
        let status = self.drive(case, strategy.as_ref(), &mut trail);

        let level = if status.is_pass() {
            LogLevel::Info
        } else {
            LogLevel::Error
        };
        trail.note(Stage::Done, level, format!("finished with {status}"));

        CaseOutcome {
            name: case.name.clone(),
            workspace: case.workspace.clone(),
            pipeline: case.kind,
            status,
            log: trail.log,
            commands: trail.commands,
            metrics: trail.metrics,
            run_wall_us: trail.run_wall_us,
        }
    }

    fn drive(&self, case: &Case, strategy: &dyn FlowStrategy, trail: &mut Trail<'_>) -> Status {
        // RUNNING
        let plan = strategy.run_plan(case, &self.settings);
        if !self.write_scripts(case, Stage::Running, &plan.scripts, trail) {
            return Status::AbnormalExit;
        }

        let mut output = String::new();
        for command in &plan.steps {
            let Some(result) = self.exec(case, Stage::Running, command, trail) else {
                return Status::AbnormalExit;
            };
            trail.run_wall_us += result.wall_us;
            if result.timed_out {
                trail.note(
                    Stage::Running,
                    LogLevel::Error,
                    format!(
                        "`{command}` timed out after {}",
                        humantime::format_duration(self.settings.timeout)
                    ),
                );
                return Status::AbnormalExit;
            }
            if result.exit_code != 0 {
                trail.note(
                    Stage::Running,
                    LogLevel::Error,
                    format!("`{command}` failed with exit code {}", result.exit_code),
                );
                return Status::AbnormalExit;
            }
            output.push_str(&result.combined_output());
            output.push('\n');
        }

        // VERIFYING
        if case.verification_disabled() {
            trail.note(Stage::Verifying, LogLevel::Info, "verification disabled, skipped");
        } else {
            let plan = strategy.verify_plan(case, &self.settings);
            if !self.write_scripts(case, Stage::Verifying, &plan.scripts, trail) {
                return Status::AbnormalExit;
            }
            for check in &plan.steps {
                let Some(result) = self.exec(case, Stage::Verifying, &check.command, trail) else {
                    return Status::AbnormalExit;
                };
                match check.judge(&result) {
                    CheckOutcome::Equivalent => trail.note(
                        Stage::Verifying,
                        LogLevel::Info,
                        format!("{}: equivalent", check.label),
                    ),
                    // Known risk: a crashed or timed-out check counts as a pass.
                    CheckOutcome::Inconclusive(reason) => trail.note(
                        Stage::Verifying,
                        LogLevel::Warn,
                        format!("{reason}; inconclusive, treated as pass"),
                    ),
                    CheckOutcome::NotEquivalent(reason) => {
                        trail.note(
                            Stage::Verifying,
                            LogLevel::Error,
                            format!("not equivalent: {reason}"),
                        );
                        return Status::Nonequivalent;
                    }
                }
            }
            trail.note(
                Stage::Verifying,
                LogLevel::Info,
                "equivalence verification passed",
            );
        }

        // QOR_CHECKING
        let spec = strategy.metric_spec(&self.settings);
        let golden = case.golden();
        let required: Vec<&str> = golden.keys().map(String::as_str).collect();
        trail.metrics = spec.extract_available(&output);

        let metrics = match extract(&output, &spec, &required) {
            Ok(metrics) => metrics,
            Err(err) => {
                trail.note(
                    Stage::QorChecking,
                    LogLevel::Error,
                    format!("metric extraction failed ({}): {err}", spec.version()),
                );
                return Status::AbnormalExit;
            }
        };
        let check = match check_qor(&metrics, golden) {
            Ok(check) => check,
            Err(err) => {
                trail.note(Stage::QorChecking, LogLevel::Error, err.to_string());
                return Status::AbnormalExit;
            }
        };
        trail.metrics.extend(metrics);

        for (metric, value) in &check.passed {
            trail.note(
                Stage::QorChecking,
                LogLevel::Info,
                format!("{metric} = {value} (golden {})", golden[metric]),
            );
        }
        if !check.is_pass() {
            for r in &check.regressions {
                trail.note(
                    Stage::QorChecking,
                    LogLevel::Error,
                    format!("worse {}: {} > golden {}", r.metric, r.value, r.bound),
                );
            }
            return Status::WorseQor;
        }

        if let Some(p) = check_performance(trail.run_wall_us, case.meta.performance.max_wall_ms) {
            trail.note(
                Stage::QorChecking,
                LogLevel::Error,
                format!(
                    "worse performance: run took {} ms, budget {} ms",
                    p.wall_ms, p.budget_ms
                ),
            );
            return Status::WorsePerformance;
        }
        trail.note(Stage::QorChecking, LogLevel::Info, "QoR check passed");

        // POST_CHECKING
        match self.post_check.check(case) {
            Ok(()) => trail.note(Stage::PostChecking, LogLevel::Info, "post check passed"),
            Err(reason) => {
                trail.note(
                    Stage::PostChecking,
                    LogLevel::Error,
                    format!("post check failed: {reason}"),
                );
                return Status::PostCheckFailed;
            }
        }

        Status::Pass
    }

    fn exec(
        &self,
        case: &Case,
        stage: Stage,
        command: &str,
        trail: &mut Trail<'_>,
    ) -> Option<CommandResult> {
        trail.note(stage, LogLevel::Info, format!("run `{command}`"));
        let spec = CommandSpec::new(command)
            .cwd(&case.workspace)
            .timeout(self.settings.timeout);

        match self.runner.run(&spec) {
            Ok(result) => {
                trail.note(
                    stage,
                    LogLevel::Debug,
                    format!(
                        "`{command}` exit {} in {} us",
                        result.exit_code, result.wall_us
                    ),
                );
                trail.commands.push(CommandRecord {
                    stage,
                    command: command.to_string(),
                    result: result.clone(),
                });
                Some(result)
            }
            Err(err) => {
                trail.note(
                    stage,
                    LogLevel::Error,
                    format!("cannot start `{command}`: {err}"),
                );
                None
            }
        }
    }

    fn write_scripts(
        &self,
        case: &Case,
        stage: Stage,
        scripts: &[Script],
        trail: &mut Trail<'_>,
    ) -> bool {
        for script in scripts {
            let path = case.workspace.join(&script.file);
            if let Err(err) = qorgate_adapters::fs::write_text(&path, &script.contents) {
                trail.note(stage, LogLevel::Error, format!("{err:#}"));
                return false;
            }
            trail.note(stage, LogLevel::Debug, format!("wrote {}", script.file));
        }
        true
    }
}
