//! I/O helpers for sweep commands.

pub mod config;
pub mod listing;
pub mod process;
pub mod run_log;
pub mod solver;
