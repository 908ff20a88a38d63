//! Test-only helpers: fake solvers and scratch instance directories.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::types::RunRecord;
use crate::io::solver::{SolveRequest, Solver};

/// One call observed by [`RecordingSolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolveCall {
    pub instance: String,
    pub repetition: u32,
    pub arg: PathBuf,
}

/// Solver that records every request and returns a canned exit code.
///
/// Overlap between runs is checked with the stub from [`write_stub_solver`].
pub struct RecordingSolver {
    exit_code: Option<i32>,
    spawn_error: bool,
    calls: RefCell<Vec<SolveCall>>,
}

impl RecordingSolver {
    pub fn succeeding() -> Self {
        Self::with_exit_code(Some(0))
    }

    pub fn with_exit_code(exit_code: Option<i32>) -> Self {
        Self {
            exit_code,
            spawn_error: false,
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Behaves like a solver binary that does not exist: every call fails.
    pub fn unspawnable() -> Self {
        Self {
            spawn_error: true,
            ..Self::succeeding()
        }
    }

    pub fn calls(&self) -> Vec<SolveCall> {
        self.calls.borrow().clone()
    }
}

impl Solver for RecordingSolver {
    fn solve(&self, request: &SolveRequest<'_>) -> Result<RunRecord> {
        self.calls.borrow_mut().push(SolveCall {
            instance: request.instance.to_string(),
            repetition: request.repetition,
            arg: request.arg.to_path_buf(),
        });
        if self.spawn_error {
            return Err(anyhow!("spawn command: No such file or directory"));
        }

        Ok(RunRecord {
            instance: request.instance.to_string(),
            repetition: request.repetition,
            arg: request.arg.to_path_buf(),
            exit_code: self.exit_code,
            timed_out: false,
            started_at: String::new(),
            duration_ms: 0,
            captured: None,
        })
    }
}

/// Temp directory containing one empty file per name.
pub fn instance_dir(names: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    for name in names {
        fs::write(dir.path().join(name), "").expect("write instance");
    }
    dir
}

/// Paths used by a stub solver written with [`write_stub_solver`].
#[derive(Debug, Clone)]
pub struct StubSolver {
    pub program: PathBuf,
    /// One line per invocation: the solver's first argument.
    pub calls_log: PathBuf,
    /// Written if an invocation starts while another is still running.
    pub overlap_log: PathBuf,
}

impl StubSolver {
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(&self.calls_log)
            .map(|contents| contents.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn overlapped(&self) -> bool {
        self.overlap_log.exists()
    }
}

/// Write an executable shell script into `dir` that logs its argument and exits with `exit_code`.
#[cfg(unix)]
pub fn write_stub_solver(dir: &Path, exit_code: i32) -> StubSolver {
    use std::os::unix::fs::PermissionsExt;

    let program = dir.join("stub-solver.sh");
    let calls_log = dir.join("calls.log");
    let overlap_log = dir.join("overlap.log");
    let lock = dir.join("running.lock");
    let script = format!(
        "#!/bin/sh\n\
         if [ -e '{lock}' ]; then echo overlap >> '{overlap}'; fi\n\
         touch '{lock}'\n\
         echo \"$1\" >> '{calls}'\n\
         sleep 0.05\n\
         rm -f '{lock}'\n\
         exit {exit_code}\n",
        lock = lock.display(),
        overlap = overlap_log.display(),
        calls = calls_log.display(),
    );
    fs::write(&program, script).expect("write stub solver");
    let mut perms = fs::metadata(&program).expect("stub metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&program, perms).expect("chmod stub solver");

    StubSolver {
        program,
        calls_log,
        overlap_log,
    }
}
