//! Sequential benchmark sweep driver.
//!
//! Runs an external solver binary against every allow-listed instance file in
//! a directory, a fixed number of times each, one run at a time.
//!
//! - **[`core`]**: Pure, deterministic logic (allow-list membership, listing
//!   filter, invocation planning). No I/O.
//! - **[`io`]**: Side-effecting operations (directory listing, process
//!   execution, config, run log).
//!
//! [`driver`] coordinates the two to implement `exp-runner run`.

pub mod core;
pub mod driver;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
