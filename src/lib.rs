//! DePINfinity Core - two-ledger network services
//!
//! Devices earn rewards for network-quality telemetry on a public layer.
//! Telemetry is aggregated and anonymized per region, then migrated to a
//! permissioned layer where roaming agreements and infrastructure contracts
//! run their lifecycles against the regional data.
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `rewards` - Device registry, telemetry validation and reward scoring
//! - `bridge` - Buffering, aggregation, anonymization and migration runs
//! - `agreements` - Roaming agreement and infrastructure contract state machines
//! - `settlement` - Revenue sharing and infrastructure cost formulas
//! - `insights` - Density, trend and recommendations over regional aggregates
//! - `storage` - Repositories, versioned registries and the permissioned ledger
//! - `events` - Observer bus for state changes
//! - `network` - Facade wiring every service behind one handle
//! - `logging` - Structured logging with run context

pub mod agreements;
pub mod bridge;
pub mod config;
pub mod error;
pub mod events;
pub mod insights;
pub mod logging;
pub mod model;
pub mod network;
pub mod rewards;
pub mod runtime;
pub mod settlement;
pub mod storage;

pub use config::NetworkConfig;
pub use error::{CoreError, CoreResult, EntityKind};
pub use events::{EventBus, Listener, NetworkEvent, QueueListener};
pub use network::DepinNetwork;
pub use runtime::{Clock, IdGenerator, ManualClock, SequentialIdGenerator, SystemClock, UuidIdGenerator};

/// Initialize the process-wide logger.
///
/// Defaults to `info`; `RUST_LOG` overrides. Safe to call more than once.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
