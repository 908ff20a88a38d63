//! Sequential sweep over allow-listed instances.
//!
//! Lists the instance directory, keeps exact allow-list matches, and runs the
//! solver `repetitions` times per match. Every run is awaited before the next
//! one starts, so at most one solver process exists at any time.

use std::fmt;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::allow_list::AllowList;
use crate::core::plan::SweepPlan;
use crate::core::types::{DriveOutcome, ExitPolicy, RunRecord};
use crate::io::listing::list_entry_names;
use crate::io::solver::{SolveRequest, Solver};

/// Inputs for [`run_all`].
#[derive(Debug, Clone, Copy)]
pub struct DriveRequest<'a> {
    pub instances_dir: &'a Path,
    pub allow_list: &'a AllowList,
    pub repetitions: u32,
    pub exit_policy: ExitPolicy,
}

/// Returned (inside `anyhow::Error`) when [`ExitPolicy::Strict`] stops a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverRunFailedError {
    pub instance: String,
    pub repetition: u32,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Runs finished before the sweep stopped, including the failing one.
    pub runs_completed: usize,
}

impl fmt::Display for SolverRunFailedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timed_out {
            write!(
                f,
                "solver timed out on {} (repetition {})",
                self.instance, self.repetition
            )
        } else {
            write!(
                f,
                "solver failed on {} (repetition {}) with exit code {:?}",
                self.instance, self.repetition, self.exit_code
            )
        }
    }
}

impl std::error::Error for SolverRunFailedError {}

/// List `instances_dir` and build the sweep plan without running anything.
pub fn plan_sweep(dir: &Path, allow_list: &AllowList, repetitions: u32) -> Result<SweepPlan> {
    if allow_list.is_empty() {
        warn!("allow-list is empty, no instance can match");
    }
    let listing =
        list_entry_names(dir).with_context(|| format!("list instances in {}", dir.display()))?;
    for name in &listing {
        if !allow_list.contains(name) {
            debug!(name, "skipping entry outside allow-list");
        }
    }
    debug!(
        entries = listing.len(),
        allowed = allow_list.len(),
        "directory listed"
    );
    Ok(SweepPlan::build(dir, listing, allow_list, repetitions))
}

/// Run the solver over every allow-listed instance in `request.instances_dir`.
///
/// Progress markers go to `progress`: the instance name, then one line per
/// repetition index. `on_run` sees each record as soon as its run ends.
///
/// Stops at the first error: unreadable directory, solver that cannot be
/// spawned, or (under [`ExitPolicy::Strict`]) a run that did not succeed.
pub fn run_all<S, W, F>(
    request: &DriveRequest<'_>,
    solver: &S,
    progress: &mut W,
    on_run: F,
) -> Result<DriveOutcome>
where
    S: Solver,
    W: Write,
    F: FnMut(&RunRecord) -> Result<()>,
{
    let plan = plan_sweep(request.instances_dir, request.allow_list, request.repetitions)?;
    run_plan(&plan, request.exit_policy, solver, progress, on_run)
}

/// Execute an already built plan.
#[instrument(skip_all, fields(instances = plan.instances.len(), repetitions = plan.repetitions))]
pub fn run_plan<S, W, F>(
    plan: &SweepPlan,
    exit_policy: ExitPolicy,
    solver: &S,
    progress: &mut W,
    mut on_run: F,
) -> Result<DriveOutcome>
where
    S: Solver,
    W: Write,
    F: FnMut(&RunRecord) -> Result<()>,
{
    info!(invocations = plan.invocation_count(), "sweep started");
    let mut outcome = DriveOutcome::default();

    for instance in &plan.instances {
        writeln!(progress, "{}", instance.name).context("write progress")?;
        for repetition in 0..plan.repetitions {
            writeln!(progress, "{repetition}").context("write progress")?;
            progress.flush().context("flush progress")?;

            let record = solver.solve(&SolveRequest {
                instance: &instance.name,
                repetition,
                arg: &instance.arg,
            })?;
            on_run(&record)?;

            let failed = exit_policy == ExitPolicy::Strict && !record.succeeded();
            let failure = failed.then(|| SolverRunFailedError {
                instance: record.instance.clone(),
                repetition: record.repetition,
                exit_code: record.exit_code,
                timed_out: record.timed_out,
                runs_completed: outcome.runs.len() + 1,
            });
            outcome.runs.push(record);
            if let Some(failure) = failure {
                return Err(failure.into());
            }
        }
    }

    info!(
        runs = outcome.runs.len(),
        failed = outcome.failed_runs().count(),
        "sweep finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_support::{RecordingSolver, instance_dir};

    #[test]
    fn prints_name_then_repetition_indices() {
        let dir = instance_dir(&["att48.tsp", "notes.md"]);
        let allow = AllowList::default();
        let solver = RecordingSolver::succeeding();
        let mut progress = Vec::new();

        run_all(
            &DriveRequest {
                instances_dir: dir.path(),
                allow_list: &allow,
                repetitions: 3,
                exit_policy: ExitPolicy::Ignore,
            },
            &solver,
            &mut progress,
            |_| Ok(()),
        )
        .expect("run");

        assert_eq!(String::from_utf8(progress).expect("utf8"), "att48.tsp\n0\n1\n2\n");
    }

    #[test]
    fn ignore_policy_continues_past_failing_runs() {
        let dir = instance_dir(&["att48.tsp"]);
        let allow = AllowList::default();
        let solver = RecordingSolver::with_exit_code(Some(7));

        let outcome = run_all(
            &DriveRequest {
                instances_dir: dir.path(),
                allow_list: &allow,
                repetitions: 4,
                exit_policy: ExitPolicy::Ignore,
            },
            &solver,
            &mut std::io::sink(),
            |_| Ok(()),
        )
        .expect("run");

        assert_eq!(outcome.runs.len(), 4);
        assert_eq!(outcome.failed_runs().count(), 4);
        assert!(outcome.runs.iter().all(|r| r.exit_code == Some(7)));
    }

    #[test]
    fn strict_policy_stops_at_first_failure() {
        let dir = instance_dir(&["att48.tsp", "berlin52.tsp"]);
        let allow = AllowList::default();
        let solver = RecordingSolver::with_exit_code(Some(2));

        let err = run_all(
            &DriveRequest {
                instances_dir: dir.path(),
                allow_list: &allow,
                repetitions: 5,
                exit_policy: ExitPolicy::Strict,
            },
            &solver,
            &mut std::io::sink(),
            |_| Ok(()),
        )
        .unwrap_err();

        let failure = err
            .downcast_ref::<SolverRunFailedError>()
            .expect("typed failure");
        assert_eq!(failure.instance, "att48.tsp");
        assert_eq!(failure.repetition, 0);
        assert_eq!(failure.exit_code, Some(2));
        assert_eq!(failure.runs_completed, 1);
        assert_eq!(solver.calls().len(), 1);
    }

    #[test]
    fn on_run_error_aborts_sweep() {
        let dir = instance_dir(&["att48.tsp"]);
        let allow = AllowList::default();
        let solver = RecordingSolver::succeeding();

        let err = run_all(
            &DriveRequest {
                instances_dir: dir.path(),
                allow_list: &allow,
                repetitions: 5,
                exit_policy: ExitPolicy::Ignore,
            },
            &solver,
            &mut std::io::sink(),
            |_| Err(anyhow::anyhow!("disk full")),
        )
        .unwrap_err();

        assert!(err.to_string().contains("disk full"));
        assert_eq!(solver.calls().len(), 1);
    }

    #[test]
    fn missing_directory_fails_before_any_run() {
        let dir = instance_dir(&[]);
        let missing = dir.path().join("gone");
        let allow = AllowList::default();
        let solver = RecordingSolver::succeeding();
        let mut progress = Vec::new();

        let err = run_all(
            &DriveRequest {
                instances_dir: &missing,
                allow_list: &allow,
                repetitions: 20,
                exit_policy: ExitPolicy::Ignore,
            },
            &solver,
            &mut progress,
            |_| Ok(()),
        )
        .unwrap_err();

        assert!(format!("{err:#}").contains("list instances"));
        assert!(solver.calls().is_empty());
        assert!(progress.is_empty());
    }

    #[test]
    fn plan_sweep_sorts_matches() {
        let dir = instance_dir(&["pr107.tsp", "eil51.tsp", "readme"]);
        fs::create_dir(dir.path().join("sub")).expect("subdir");
        let plan = plan_sweep(dir.path(), &AllowList::default(), 2).expect("plan");
        let names: Vec<_> = plan.instances.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["eil51.tsp", "pr107.tsp"]);
        assert_eq!(plan.invocation_count(), 4);
    }
}
