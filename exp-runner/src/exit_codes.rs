//! Stable exit codes for exp-runner CLI commands.

/// Sweep (or plan) finished.
pub const OK: i32 = 0;
/// Invalid config, unreadable instance directory, solver could not be spawned, or other errors.
pub const INVALID: i32 = 1;
/// `exp-runner run --strict` stopped on a solver run that did not succeed.
pub const SOLVER_FAILED: i32 = 2;
