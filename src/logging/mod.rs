//! Structured logging with run context.
//!
//! Provides logging macros and utilities that include run_id and item_id
//! in every log message for easy correlation.

pub mod structured;

pub use structured::*;
