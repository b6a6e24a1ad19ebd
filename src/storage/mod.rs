//! Storage module.
//!
//! Repository abstraction for id-keyed records, the per-id versioned registry
//! used by the lifecycle engines, and the in-memory permissioned ledger.

pub mod ledger;
pub mod repository;
pub mod versioned;

pub use ledger::*;
pub use repository::*;
pub use versioned::*;
