//! Deterministic, pure logic for the sweep.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod allow_list;
pub mod plan;
pub mod types;
