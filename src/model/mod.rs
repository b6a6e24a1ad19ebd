//! Record types shared by every service.
//!
//! Field names serialize in camelCase and status enums in SCREAMING_SNAKE_CASE,
//! matching the JSON records exchanged with the permissioned layer.

pub mod aggregate;
pub mod agreement;
pub mod contract;
pub mod device;
pub mod geo;
pub mod lifecycle;

pub use aggregate::*;
pub use agreement::*;
pub use contract::*;
pub use device::*;
pub use geo::*;
pub use lifecycle::*;
