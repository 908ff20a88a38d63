//! Solver abstraction.
//!
//! The [`Solver`] trait decouples the sweep loop from the external solver
//! binary. Tests use recording solvers that return canned records without
//! spawning processes.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::core::types::{RunRecord, StreamMode};
use crate::io::process::run_command;

/// Parameters for one solver invocation.
#[derive(Debug, Clone, Copy)]
pub struct SolveRequest<'a> {
    pub instance: &'a str,
    pub repetition: u32,
    /// Sole argument passed to the solver.
    pub arg: &'a Path,
}

/// Abstraction over solver backends.
pub trait Solver {
    /// Run one repetition to completion. Must not return before the run has ended.
    ///
    /// An `Err` means the solver could not be run at all; a run that exits
    /// non-zero is still `Ok` and reports its exit code in the record.
    fn solve(&self, request: &SolveRequest<'_>) -> Result<RunRecord>;
}

/// Solver that spawns an external executable with the instance path as its only argument.
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    pub program: PathBuf,
    pub streams: StreamMode,
    /// `None` waits for as long as the child runs.
    pub timeout: Option<Duration>,
}

impl ProcessSolver {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            streams: StreamMode::Inherit,
            timeout: None,
        }
    }
}

impl Solver for ProcessSolver {
    #[instrument(skip_all, fields(instance = request.instance, repetition = request.repetition))]
    fn solve(&self, request: &SolveRequest<'_>) -> Result<RunRecord> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(request.arg);

        let started_at = Utc::now().to_rfc3339();
        let output = run_command(cmd, self.streams, self.timeout).with_context(|| {
            format!(
                "run solver {} {}",
                self.program.display(),
                request.arg.display()
            )
        })?;

        let exit_code = output.status.code();
        if output.timed_out {
            warn!(timeout = ?self.timeout, "solver timed out");
        } else if !output.status.success() {
            warn!(exit_code = ?exit_code, "solver exited unsuccessfully");
        }
        debug!(elapsed_ms = output.elapsed.as_millis() as u64, "solver finished");

        Ok(RunRecord {
            instance: request.instance.to_string(),
            repetition: request.repetition,
            arg: request.arg.to_path_buf(),
            exit_code,
            timed_out: output.timed_out,
            started_at,
            duration_ms: output.elapsed.as_millis() as u64,
            captured: output.captured,
        })
    }
}
