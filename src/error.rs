//! Error types for the core services.
//!
//! Every rejection carries the offending id and a human-readable reason so the
//! caller can report it without re-deriving context.

use thiserror::Error;

/// Entity kinds that can be looked up by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Device,
    Agreement,
    Contract,
    Aggregate,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Device => "device",
            EntityKind::Agreement => "agreement",
            EntityKind::Contract => "contract",
            EntityKind::Aggregate => "aggregate",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("device {id} is not active")]
    InactiveDevice { id: String },

    #[error("invalid state for {id}: {reason}")]
    InvalidState { id: String, reason: String },

    #[error("validation failed for {id}: {reason}")]
    Validation { id: String, reason: String },

    #[error("region mismatch: expected {expected}, found {found}")]
    RegionMismatch { expected: String, found: String },

    #[error("insufficient reward vault: required {required}, available {available}")]
    InsufficientVault { required: u64, available: i64 },

    #[error("program is paused")]
    ProgramPaused,

    #[error("caller does not own device {id}")]
    OwnerMismatch { id: String },

    #[error("permissioned ledger error: {0}")]
    Ledger(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn not_found(kind: EntityKind, id: &str) -> Self {
        CoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(id: &str, reason: impl Into<String>) -> Self {
        CoreError::InvalidState {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn validation(id: &str, reason: impl Into<String>) -> Self {
        CoreError::Validation {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}
