use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use qorgate_adapters::fs::{copy_dir_all, read_text, write_text};
use qorgate_adapters::{StdProcessRunner, default_jobs, locate_tool};
use qorgate_app::{
    BenchRequest, BenchUseCase, Case, CaseRunner, Clock, RegressRequest, RegressUseCase,
    RunSettings, SystemClock, bench_csv, bench_table, case_log, regression_rpt,
};
use qorgate_domain::{MetricSpec, extract, parse_flow};
use qorgate_types::{ConfigFile, Status, ToolInfo, ToolsConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[command(
    name = "qorgate",
    version,
    about = "QoR regression gate and mapper benchmarks for logic synthesis"
)]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every case under the case directory and write a regression report.
    Regress {
        #[arg(long)]
        config: PathBuf,

        /// Overrides global.case_dir
        #[arg(long)]
        case_dir: Option<PathBuf>,

        /// Overrides global.results
        #[arg(long)]
        results: Option<PathBuf>,

        /// Worker threads (default: global.jobs, then available parallelism)
        #[arg(long)]
        jobs: Option<usize>,

        /// Overrides every case's flow, e.g. "yosys"
        #[arg(long)]
        flow: Option<String>,

        /// Pretty-print report.json
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },

    /// Run a single case; exits 0 on PASS and 1 otherwise.
    Case {
        /// Case directory holding testinfo.toml
        source: PathBuf,

        /// Directory to run in; must not exist yet
        workspace: PathBuf,

        #[arg(long)]
        config: PathBuf,
    },

    /// Compare ABC LUT mapping against ifpga over a set of AIGs.
    Bench {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        jobs: Option<usize>,

        #[arg(long, default_value_t = false)]
        pretty: bool,
    },

    /// Print the metrics a saved tool log yields, as JSON.
    Extract {
        /// Flow whose registry to use, or "abc" for the baseline mapper log
        #[arg(long)]
        flow: String,

        /// LUT input bound for histogram metrics
        #[arg(long, default_value_t = 6)]
        k: usize,

        /// Metric that must be present. Repeatable; default prints all found.
        #[arg(long)]
        metric: Vec<String>,

        log: PathBuf,
    },
}

fn main() -> ExitCode {
    match real_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn real_main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Regress {
            config,
            case_dir,
            results,
            jobs,
            flow,
            pretty,
        } => {
            let (mut file, base_dir) = load_config(&config)?;
            if flow.is_some() {
                file.global.flow = flow;
            }
            let settings = RunSettings::from_config(&file, &base_dir)?;

            let case_dir = case_dir
                .or_else(|| file.global.case_dir.as_ref().map(|d| base_dir.join(d)))
                .context("no case directory: set global.case_dir or pass --case-dir")?;
            let results = results.unwrap_or_else(|| {
                base_dir.join(file.global.results.as_deref().unwrap_or("results"))
            });
            let jobs = jobs.or(file.global.jobs).unwrap_or_else(default_jobs);

            let clock = SystemClock;
            let run_dir = absolute(&results)?.join(clock.now_compact());
            if run_dir.exists() {
                bail!("run directory {} already exists", run_dir.display());
            }
            fs::create_dir_all(&run_dir)
                .with_context(|| format!("create dir {}", run_dir.display()))?;
            init_tracing(cli.verbose, Some(&run_dir.join("regression.log")))?;
            warn_missing_tools(&settings.tools);

            let usecase = RegressUseCase::new(StdProcessRunner, clock, tool_info());
            let outcome = usecase.execute(RegressRequest {
                settings,
                case_dir: absolute(&case_dir)?,
                run_dir: run_dir.clone(),
                jobs,
            })?;

            for case in &outcome.cases {
                write_text(
                    &case.workspace.join(format!("{}.log", case.name)),
                    &case_log(case),
                )?;
            }
            let rpt = regression_rpt(&outcome.report);
            atomic_write(&run_dir.join("regression.rpt"), rpt.as_bytes())?;
            write_json(&run_dir.join("report.json"), &outcome.report, pretty)?;

            if file.global.keep_workspace == Some(false) {
                for case in outcome.cases.iter().filter(|c| c.status.is_pass()) {
                    fs::remove_dir_all(&case.workspace).with_context(|| {
                        format!("remove workspace {}", case.workspace.display())
                    })?;
                }
            }

            print!("{rpt}");
            Ok(ExitCode::SUCCESS)
        }

        Command::Case {
            source,
            workspace,
            config,
        } => {
            init_tracing(cli.verbose, None)?;
            let (file, base_dir) = load_config(&config)?;
            let settings = RunSettings::from_config(&file, &base_dir)?;
            warn_missing_tools(&settings.tools);

            let workspace = absolute(&workspace)?;
            let parent = workspace.parent().unwrap_or_else(|| Path::new("/"));
            let mut case = Case::load(&source, parent, settings.flow_override.as_deref())?;
            case.workspace = workspace;

            if case.workspace.exists() {
                bail!("workspace {} already exists", case.workspace.display());
            }
            copy_dir_all(&source, &case.workspace)?;

            let outcome = CaseRunner::new(StdProcessRunner, settings).run(&case);
            write_text(
                &case.workspace.join(format!("{}.log", case.name)),
                &case_log(&outcome),
            )?;

            println!("{}: {}", outcome.name, outcome.status);
            Ok(if outcome.status == Status::Pass {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }

        Command::Bench {
            config,
            jobs,
            pretty,
        } => {
            init_tracing(cli.verbose, None)?;
            let (file, base_dir) = load_config(&config)?;
            let settings = RunSettings::from_config(&file, &base_dir)?;
            let bench = file
                .bench
                .as_ref()
                .context("config has no [bench] section")?;
            warn_missing_tools(&settings.tools);

            let jobs = jobs.or(file.global.jobs).unwrap_or_else(default_jobs);
            let base_dir = absolute(&base_dir)?;
            let req = BenchRequest::from_config(
                settings.tools.clone(),
                bench,
                &base_dir,
                settings.timeout,
                jobs,
            );
            let workspace = req.workspace.clone();

            let usecase = BenchUseCase::new(StdProcessRunner, SystemClock, tool_info());
            let outcome = usecase.execute(req)?;

            atomic_write(
                &workspace.join("bench.csv"),
                bench_csv(&outcome.report).as_bytes(),
            )?;
            write_json(&workspace.join("bench.json"), &outcome.report, pretty)?;

            let table = bench_table(&outcome.report);
            tracing::info!("benchmark results\n{table}");
            Ok(ExitCode::SUCCESS)
        }

        Command::Extract {
            flow,
            k,
            metric,
            log,
        } => {
            let spec = if flow == "abc" {
                MetricSpec::abc_mapping()
            } else {
                MetricSpec::for_pipeline(parse_flow(&flow)?, k)
            };
            let text = read_text(&log)?;
            let metrics = if metric.is_empty() {
                spec.extract_available(&text)
            } else {
                extract(&text, &spec, &metric)
                    .with_context(|| format!("extract from {}", log.display()))?
            };
            println!("{}", serde_json::to_string_pretty(&metrics)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn tool_info() -> ToolInfo {
    ToolInfo {
        name: "qorgate".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Logs go to stderr and, when given, to `log_file` without colors.
fn init_tracing(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let default = if verbose { "qorgate=debug" } else { "qorgate=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let file_layer = match log_file {
        Some(path) => {
            let file =
                fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .context("install log subscriber")?;
    Ok(())
}

fn warn_missing_tools(tools: &ToolsConfig) {
    for tool in [&tools.abc, &tools.ifpga, &tools.yosys, &tools.fm_shell] {
        if locate_tool(tool).is_none() {
            tracing::warn!(tool = %tool, "tool not found on PATH");
        }
    }
}

/// Returns the config and the directory its relative paths resolve against.
fn load_config(path: &Path) -> anyhow::Result<(ConfigFile, PathBuf)> {
    let text = read_text(path)?;
    let config: ConfigFile =
        toml::from_str(&text).with_context(|| format!("parse config {}", path.display()))?;
    let base_dir = absolute(path)?
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((config, base_dir))
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("resolve {}", path.display()))
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T, pretty: bool) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
    }

    let bytes = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };

    atomic_write(path, &bytes)
}

fn atomic_write(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    use std::io::Write;

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    let mut tmp = parent.to_path_buf();
    tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4()));

    {
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("create temp {}", tmp.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("write temp {}", tmp.display()))?;
        f.sync_all().ok();
    }

    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
