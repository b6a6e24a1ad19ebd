//! Identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

pub trait IdGenerator: Send + Sync {
    /// Produce a fresh id such as `agr-1a2b3c4d`.
    fn next_id(&self, prefix: &str) -> String;
}

/// Random short ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, &Uuid::new_v4().to_string()[..8])
    }
}

/// Deterministic ids for tests and replays: `agr-1`, `agr-2`, ...
#[derive(Debug, Default)]
pub struct SequentialIdGenerator {
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_ids_are_prefixed_and_short() {
        let id = UuidIdGenerator.next_id("run");
        assert!(id.starts_with("run-"));
        assert_eq!(id.len(), "run-".len() + 8);
    }

    #[test]
    fn test_sequential_ids() {
        let ids = SequentialIdGenerator::new();
        assert_eq!(ids.next_id("agr"), "agr-1");
        assert_eq!(ids.next_id("ctr"), "ctr-2");
    }
}
