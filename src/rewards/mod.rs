//! Public-layer telemetry rewards.
//!
//! Scores single submissions and keeps each device's cumulative state.

pub mod engine;
pub mod scoring;
pub mod validation;

pub use engine::*;
pub use scoring::*;
pub use validation::*;
