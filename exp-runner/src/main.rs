//! Benchmark sweep driver.
//!
//! Runs the solver binary against every allow-listed instance file, twenty
//! times each by default, strictly one run at a time.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use exp_runner::core::allow_list::AllowList;
use exp_runner::core::types::ExitPolicy;
use exp_runner::driver::{DriveRequest, SolverRunFailedError, plan_sweep, run_all};
use exp_runner::exit_codes;
use exp_runner::io::config::{DEFAULT_CONFIG_FILE, SweepConfig, load_config};
use exp_runner::io::run_log::RunLog;
use exp_runner::io::solver::ProcessSolver;
use exp_runner::logging;

#[derive(Parser)]
#[command(
    name = "exp-runner",
    version,
    about = "Run a solver over allow-listed benchmark instances"
)]
struct Cli {
    /// Config file (TOML). A missing file means built-in defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the solver over every matched instance.
    Run {
        #[command(flatten)]
        sweep: SweepArgs,
        #[command(flatten)]
        solver: SolverArgs,
        /// Append one JSON line per solver run to this file.
        #[arg(long, value_name = "PATH")]
        record: Option<PathBuf>,
    },
    /// Print matched instances and the invocation count without running anything.
    Plan {
        #[command(flatten)]
        sweep: SweepArgs,
    },
}

#[derive(Args, Debug, Default, Clone)]
struct SweepArgs {
    /// Directory holding instance files.
    #[arg(long, value_name = "DIR")]
    instances_dir: Option<PathBuf>,
    /// Runs per matched instance.
    #[arg(long)]
    repetitions: Option<u32>,
    /// Allow-listed filename. Repeat to build the list; replaces the configured list.
    #[arg(long = "allow", value_name = "FILENAME")]
    allow: Vec<String>,
}

#[derive(Args, Debug, Default, Clone)]
struct SolverArgs {
    /// Solver executable.
    #[arg(long, value_name = "PATH")]
    solver: Option<PathBuf>,
    /// Kill a solver run after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Collect solver output instead of passing it through.
    #[arg(long)]
    capture: bool,
    /// Stop at the first solver run that does not exit 0.
    #[arg(long)]
    strict: bool,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        let code = if err.downcast_ref::<SolverRunFailedError>().is_some() {
            exit_codes::SOLVER_FAILED
        } else {
            exit_codes::INVALID
        };
        std::process::exit(code);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let base = load_config(&cli.config).context("load config")?;
    match cli.command {
        Command::Run {
            sweep,
            solver,
            record,
        } => {
            let cfg = apply_overrides(base, &sweep, &solver)?;
            cmd_run(&cfg, record.as_deref())
        }
        Command::Plan { sweep } => {
            let cfg = apply_overrides(base, &sweep, &SolverArgs::default())?;
            cmd_plan(&cfg)
        }
    }
}

/// Apply command-line overrides on top of the loaded config.
fn apply_overrides(
    mut base: SweepConfig,
    sweep: &SweepArgs,
    solver: &SolverArgs,
) -> Result<SweepConfig> {
    if let Some(dir) = &sweep.instances_dir {
        base.instances_dir = dir.clone();
    }
    if let Some(repetitions) = sweep.repetitions {
        base.repetitions = repetitions;
    }
    if !sweep.allow.is_empty() {
        base.allow_list = AllowList::new(sweep.allow.iter().cloned());
    }
    if let Some(program) = &solver.solver {
        base.solver = program.clone();
    }
    if let Some(timeout_secs) = solver.timeout_secs {
        base.run_timeout_secs = Some(timeout_secs);
    }
    if solver.capture {
        base.capture_output = true;
    }
    if solver.strict {
        base.exit_policy = ExitPolicy::Strict;
    }
    base.validate()?;
    Ok(base)
}

fn cmd_run(cfg: &SweepConfig, record: Option<&Path>) -> Result<()> {
    let solver = ProcessSolver {
        program: cfg.solver.clone(),
        streams: cfg.stream_mode(),
        timeout: cfg.run_timeout(),
    };
    let mut run_log = record.map(RunLog::open).transpose()?;

    let stdout = std::io::stdout();
    let mut progress = stdout.lock();
    let outcome = run_all(
        &DriveRequest {
            instances_dir: &cfg.instances_dir,
            allow_list: &cfg.allow_list,
            repetitions: cfg.repetitions,
            exit_policy: cfg.exit_policy,
        },
        &solver,
        &mut progress,
        |run| {
            if !run.succeeded()
                && let Some(captured) = &run.captured
                && !captured.stderr.is_empty()
            {
                let stderr = String::from_utf8_lossy(&captured.stderr);
                warn!(
                    instance = %run.instance,
                    repetition = run.repetition,
                    stderr = %stderr.trim_end(),
                    "solver stderr"
                );
            }
            if let Some(log) = run_log.as_mut() {
                log.append(run)?;
            }
            Ok(())
        },
    )?;

    info!(
        runs = outcome.runs.len(),
        failed = outcome.failed_runs().count(),
        "done"
    );
    Ok(())
}

fn cmd_plan(cfg: &SweepConfig) -> Result<()> {
    let plan = plan_sweep(&cfg.instances_dir, &cfg.allow_list, cfg.repetitions)?;
    for instance in &plan.instances {
        println!("{} {}", instance.name, instance.arg.display());
    }
    println!(
        "plan: instances={} repetitions={} invocations={}",
        plan.instances.len(),
        plan.repetitions,
        plan.invocation_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::parse_from(["exp-runner", "run"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        let Command::Run {
            sweep,
            solver,
            record,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert!(sweep.allow.is_empty());
        assert!(!solver.strict);
        assert!(record.is_none());
    }

    #[test]
    fn parse_repeated_allow() {
        let cli = Cli::parse_from([
            "exp-runner",
            "plan",
            "--allow",
            "att48.tsp",
            "--allow",
            "eil51.tsp",
        ]);
        let Command::Plan { sweep } = cli.command else {
            panic!("expected plan");
        };
        assert_eq!(sweep.allow, vec!["att48.tsp", "eil51.tsp"]);
    }

    #[test]
    fn overrides_replace_config_values() {
        let sweep = SweepArgs {
            instances_dir: Some(PathBuf::from("data")),
            repetitions: Some(2),
            allow: vec!["x.tsp".to_string()],
        };
        let solver = SolverArgs {
            solver: Some(PathBuf::from("/opt/mlp")),
            timeout_secs: Some(30),
            capture: true,
            strict: true,
        };
        let cfg = apply_overrides(SweepConfig::default(), &sweep, &solver).expect("merge");
        assert_eq!(cfg.instances_dir, PathBuf::from("data"));
        assert_eq!(cfg.repetitions, 2);
        assert_eq!(cfg.allow_list, AllowList::new(["x.tsp"]));
        assert_eq!(cfg.solver, PathBuf::from("/opt/mlp"));
        assert_eq!(cfg.run_timeout_secs, Some(30));
        assert!(cfg.capture_output);
        assert_eq!(cfg.exit_policy, ExitPolicy::Strict);
    }

    #[test]
    fn no_overrides_keep_config() {
        let base = SweepConfig::default();
        let cfg = apply_overrides(base.clone(), &SweepArgs::default(), &SolverArgs::default())
            .expect("merge");
        assert_eq!(cfg, base);
    }

    #[test]
    fn zero_timeout_override_is_rejected() {
        let solver = SolverArgs {
            timeout_secs: Some(0),
            ..SolverArgs::default()
        };
        assert!(apply_overrides(SweepConfig::default(), &SweepArgs::default(), &solver).is_err());
    }
}
