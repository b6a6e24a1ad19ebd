//! Aggregation and anonymization bridge.
//!
//! Moves telemetry from the public layer to the permissioned layer: buffer
//! per region, aggregate per window, anonymize, then migrate with per-item
//! retries.

pub mod aggregate;
pub mod buffer;
pub mod context;
pub mod integrity;
pub mod migration;
pub mod region;
pub mod retry;
pub mod rollup;
pub mod scheduler;
pub mod store;

pub use aggregate::*;
pub use buffer::*;
pub use context::*;
pub use integrity::*;
pub use migration::*;
pub use region::*;
pub use retry::*;
pub use rollup::*;
pub use scheduler::*;
pub use store::*;
