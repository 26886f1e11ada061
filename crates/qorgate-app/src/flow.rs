//! Per-pipeline strategies.
//!
//! A strategy only *plans*: it returns the scripts to write and the command
//! lines to run for each stage. Executing the plan is the case runner's job,
//! so every strategy is testable without touching a filesystem.

use crate::RunSettings;
use crate::case::Case;
use qorgate_domain::MetricSpec;
use qorgate_types::{
    CommandResult, FORMAL_SUCCESS_MARKER, NOT_EQUIVALENT_MARKER, Operator, PipelineKind,
};
use shell_words::quote;

/// A file the stage needs in the workspace before its commands run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Relative to the case workspace.
    pub file: String,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan<T> {
    pub scripts: Vec<Script>,
    pub steps: Vec<T>,
}

impl<T> Default for Plan<T> {
    fn default() -> Self {
        Self {
            scripts: Vec::new(),
            steps: Vec::new(),
        }
    }
}

/// How the output of an equivalence command is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Fails only if the marker appears. A run without it (crash, timeout,
    /// unexpected text) is inconclusive and passes.
    FailOnMarker(&'static str),
    /// Passes only if the command exits 0 and prints the marker.
    RequireMarker(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Equivalent,
    Inconclusive(String),
    NotEquivalent(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquivalenceCheck {
    /// What is compared, e.g. `adder.aig vs merged.v`.
    pub label: String,
    pub command: String,
    pub verdict: Verdict,
}

impl EquivalenceCheck {
    fn cec(abc: &str, left: &str, right: &str) -> Self {
        Self {
            label: format!("{left} vs {right}"),
            command: format!("{} -q {}", quote(abc), quote(&format!("cec {left} {right}"))),
            verdict: Verdict::FailOnMarker(NOT_EQUIVALENT_MARKER),
        }
    }

    fn formal(fm_shell: &str, script: &str, label: String) -> Self {
        Self {
            label,
            command: format!("{} -file {}", quote(fm_shell), quote(script)),
            verdict: Verdict::RequireMarker(FORMAL_SUCCESS_MARKER),
        }
    }

    /// The marker is looked for in stdout and stderr regardless of exit code.
    pub fn judge(&self, result: &CommandResult) -> CheckOutcome {
        let printed = |marker: &str| result.stdout.contains(marker) || result.stderr.contains(marker);

        match self.verdict {
            Verdict::FailOnMarker(marker) => {
                if printed(marker) {
                    CheckOutcome::NotEquivalent(format!("{}: {marker:?}", self.label))
                } else if result.succeeded() {
                    CheckOutcome::Equivalent
                } else if result.timed_out {
                    CheckOutcome::Inconclusive(format!("{}: check timed out", self.label))
                } else {
                    CheckOutcome::Inconclusive(format!(
                        "{}: check exited with code {}",
                        self.label, result.exit_code
                    ))
                }
            }
            Verdict::RequireMarker(marker) => {
                if result.succeeded() && printed(marker) {
                    CheckOutcome::Equivalent
                } else {
                    CheckOutcome::NotEquivalent(format!("{}: no {marker:?}", self.label))
                }
            }
        }
    }
}

pub trait FlowStrategy: Send + Sync {
    fn kind(&self) -> PipelineKind;

    /// Commands of the run stage, in order. Their combined output is what the
    /// QoR gate extracts metrics from.
    fn run_plan(&self, case: &Case, settings: &RunSettings) -> Plan<String>;

    fn verify_plan(&self, case: &Case, settings: &RunSettings) -> Plan<EquivalenceCheck>;

    fn metric_spec(&self, settings: &RunSettings) -> MetricSpec;
}

pub fn strategy_for(kind: PipelineKind) -> Box<dyn FlowStrategy> {
    match kind {
        PipelineKind::MappingFlow => Box::new(MappingFlow),
        PipelineKind::SynthesisFlow => Box::new(SynthesisFlow),
        PipelineKind::SingleOperatorFlow(op) => Box::new(OperatorFlow(op)),
    }
}

/// AIG optimization with abc, then LUT mapping with ifpga.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappingFlow;

impl FlowStrategy for MappingFlow {
    fn kind(&self) -> PipelineKind {
        PipelineKind::MappingFlow
    }

    fn run_plan(&self, case: &Case, settings: &RunSettings) -> Plan<String> {
        let tools = &settings.tools;
        let opt = format!(
            "&read {}; &dch -v; &write {}",
            case.artifact(".aig"),
            case.artifact(".opt.aig")
        );
        Plan {
            scripts: Vec::new(),
            steps: vec![
                format!("{} -c {}", quote(&tools.abc), quote(&opt)),
                format!(
                    "{} -i {} -v {} -l {}",
                    quote(&tools.ifpga),
                    quote(&case.workspace.to_string_lossy()),
                    quote(&case.artifact(".synthed.v")),
                    quote(&case.artifact(".lut.v")),
                ),
            ],
        }
    }

    fn verify_plan(&self, case: &Case, settings: &RunSettings) -> Plan<EquivalenceCheck> {
        let abc = &settings.tools.abc;
        let aig = case.artifact(".aig");
        let synthed = case.artifact(".synthed.v");

        let mut plan = Plan {
            scripts: Vec::new(),
            steps: vec![
                EquivalenceCheck::cec(abc, &aig, "merged.v"),
                EquivalenceCheck::cec(abc, "merged.v", "choice.v"),
                EquivalenceCheck::cec(abc, "choice.v", &synthed),
            ],
        };

        if settings.enable_formality
            && let Some(lut_def) = &settings.lut_def
        {
            let script = case.artifact(".fm");
            let lut = case.artifact(".lut.v");
            plan.scripts.push(Script {
                file: script.clone(),
                contents: format!(
                    "read_verilog -r {synthed}\n\
                     set_top -auto\n\
                     read_verilog -i {lut}\n\
                     read_verilog -technology_library -i {}\n\
                     set_top -auto\n\
                     match\n\
                     verify\n\
                     exit\n",
                    lut_def.display()
                ),
            });
            plan.steps.push(EquivalenceCheck::formal(
                &settings.tools.fm_shell,
                &script,
                format!("{synthed} vs {lut}"),
            ));
        }

        plan
    }

    fn metric_spec(&self, settings: &RunSettings) -> MetricSpec {
        MetricSpec::mapper(settings.lut_inputs)
    }
}

/// RTL synthesis through a generated yosys script.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesisFlow;

impl FlowStrategy for SynthesisFlow {
    fn kind(&self) -> PipelineKind {
        PipelineKind::SynthesisFlow
    }

    fn run_plan(&self, case: &Case, settings: &RunSettings) -> Plan<String> {
        let script = case.artifact(".yos");
        Plan {
            scripts: vec![Script {
                file: script.clone(),
                contents: format!(
                    "# yosys synthesis flow\n\
                     read_verilog {}\n\
                     hierarchy -check\n\
                     proc; opt\n\
                     techmap; opt\n\
                     write_verilog -noattr {}\n\
                     abc -lut 6\n\
                     write_verilog -noattr {}\n\
                     clean\n\
                     # report\n\
                     stat\n",
                    case.artifact(".v"),
                    case.artifact("_before_abc.v"),
                    case.artifact("_after_abc.v"),
                ),
            }],
            steps: vec![format!(
                "{} -s {}",
                quote(&settings.tools.yosys),
                quote(&script)
            )],
        }
    }

    fn verify_plan(&self, case: &Case, settings: &RunSettings) -> Plan<EquivalenceCheck> {
        let script = case.artifact(".fm");
        let reference = case.artifact(".v");
        let implementation = case.artifact("_after_abc.v");
        Plan {
            scripts: vec![Script {
                file: script.clone(),
                contents: format!(
                    "read_verilog -r {reference}\n\
                     set_top -auto\n\
                     read_verilog -i {implementation}\n\
                     set_top -auto\n\
                     match\n\
                     verify\n\
                     exit\n"
                ),
            }],
            steps: vec![EquivalenceCheck::formal(
                &settings.tools.fm_shell,
                &script,
                format!("{reference} vs {implementation}"),
            )],
        }
    }

    fn metric_spec(&self, _settings: &RunSettings) -> MetricSpec {
        MetricSpec::synthesis()
    }
}

/// One optimization operator, run as `<op> 1 <case>.aig optimized.v`.
#[derive(Debug, Clone, Copy)]
pub struct OperatorFlow(pub Operator);

impl FlowStrategy for OperatorFlow {
    fn kind(&self) -> PipelineKind {
        PipelineKind::SingleOperatorFlow(self.0)
    }

    fn run_plan(&self, case: &Case, _settings: &RunSettings) -> Plan<String> {
        Plan {
            scripts: Vec::new(),
            steps: vec![format!(
                "{} 1 {} optimized.v",
                self.0.as_str(),
                quote(&case.artifact(".aig"))
            )],
        }
    }

    fn verify_plan(&self, case: &Case, settings: &RunSettings) -> Plan<EquivalenceCheck> {
        Plan {
            scripts: Vec::new(),
            steps: vec![EquivalenceCheck::cec(
                &settings.tools.abc,
                &case.artifact(".aig"),
                "optimized.v",
            )],
        }
    }

    fn metric_spec(&self, _settings: &RunSettings) -> MetricSpec {
        MetricSpec::operator()
    }
}
