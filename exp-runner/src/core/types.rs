//! Shared types for sweep orchestration.
//!
//! These types define stable contracts between the driver, the solver
//! backends and the run log. They hold no I/O handles.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What the driver does when a solver run does not exit cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitPolicy {
    /// Record the exit code and continue with the next repetition.
    #[default]
    Ignore,
    /// Stop the sweep at the first non-zero exit, signal or timeout.
    Strict,
}

/// How the solver's standard streams are wired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamMode {
    /// Child shares the driver's stdout/stderr.
    #[default]
    Inherit,
    /// Child output is collected, keeping at most `limit_bytes` per stream.
    Capture { limit_bytes: usize },
}

/// Bounded copy of a child's stdout/stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
}

/// Observation of one finished solver invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub instance: String,
    pub repetition: u32,
    pub arg: PathBuf,
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub started_at: String,
    pub duration_ms: u64,
    pub captured: Option<CapturedOutput>,
}

impl RunRecord {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Everything `run_all` observed, in invocation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveOutcome {
    pub runs: Vec<RunRecord>,
}

impl DriveOutcome {
    pub fn failed_runs(&self) -> impl Iterator<Item = &RunRecord> {
        self.runs.iter().filter(|run| !run.succeeded())
    }
}
