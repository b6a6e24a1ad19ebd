//! Injected runtime dependencies: time and identifiers.

pub mod clock;
pub mod ids;

pub use clock::*;
pub use ids::*;
