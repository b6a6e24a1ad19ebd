//! Versioned records with single-writer-per-id discipline.
//!
//! Each id owns a history of immutable versions behind its own mutex. A command
//! locks only its id, reads the current version, derives exactly one successor
//! and appends it. Commands on different ids never contend beyond the brief
//! map lookup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{CoreError, CoreResult, EntityKind};

/// A record stored as a chain of versions sharing one id.
pub trait Versioned: Clone + Send + Sync {
    fn id(&self) -> &str;
    fn version(&self) -> u64;
}

type History<T> = Arc<Mutex<Vec<T>>>;

#[derive(Debug)]
pub struct VersionedRegistry<T> {
    kind: EntityKind,
    entries: RwLock<HashMap<String, History<T>>>,
}

impl<T: Versioned> VersionedRegistry<T> {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store the first version of a new record.
    pub fn insert(&self, first: T) -> CoreResult<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(first.id()) {
            return Err(CoreError::validation(first.id(), "id already exists"));
        }
        entries.insert(first.id().to_string(), Arc::new(Mutex::new(vec![first])));
        Ok(())
    }

    pub fn current(&self, id: &str) -> Option<T> {
        let history = self.entries.read().get(id).cloned()?;
        let versions = history.lock();
        versions.last().cloned()
    }

    pub fn history(&self, id: &str) -> Option<Vec<T>> {
        let history = self.entries.read().get(id).cloned()?;
        let versions = history.lock();
        Some(versions.clone())
    }

    /// Current version of every record, in no particular order.
    pub fn list_current(&self) -> Vec<T> {
        let histories: Vec<History<T>> = self.entries.read().values().cloned().collect();
        histories
            .iter()
            .filter_map(|h| h.lock().last().cloned())
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run a command against the current version of `id` while holding that
    /// id's lock. `step` must return the successor version; it is appended only
    /// if `step` succeeds, so a rejected command leaves the prior version current.
    pub fn apply<E, F>(&self, id: &str, step: F) -> CoreResult<(T, E)>
    where
        F: FnOnce(&T) -> CoreResult<(T, E)>,
    {
        let history = self
            .entries
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(self.kind, id))?;

        let mut versions = history.lock();
        let current = versions
            .last()
            .ok_or_else(|| CoreError::not_found(self.kind, id))?;

        let (next, effects) = step(current)?;

        if next.id() != current.id() || next.version() != current.version() + 1 {
            return Err(CoreError::invalid_state(
                id,
                format!(
                    "successor must keep id and bump version (got {}@{}, expected {}@{})",
                    next.id(),
                    next.version(),
                    current.id(),
                    current.version() + 1
                ),
            ));
        }

        versions.push(next.clone());
        Ok((next, effects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        id: String,
        version: u64,
        value: u64,
    }

    impl Versioned for Counter {
        fn id(&self) -> &str {
            &self.id
        }
        fn version(&self) -> u64 {
            self.version
        }
    }

    fn counter(id: &str) -> Counter {
        Counter {
            id: id.to_string(),
            version: 1,
            value: 0,
        }
    }

    fn bump(c: &Counter) -> CoreResult<(Counter, ())> {
        Ok((
            Counter {
                id: c.id.clone(),
                version: c.version + 1,
                value: c.value + 1,
            },
            (),
        ))
    }

    #[test]
    fn test_apply_appends_version() {
        let registry = VersionedRegistry::new(EntityKind::Agreement);
        registry.insert(counter("a")).unwrap();

        let (next, ()) = registry.apply("a", bump).unwrap();
        assert_eq!(next.version, 2);
        assert_eq!(registry.current("a").unwrap().value, 1);
        assert_eq!(registry.history("a").unwrap().len(), 2);
    }

    #[test]
    fn test_rejected_step_keeps_prior_version() {
        let registry = VersionedRegistry::new(EntityKind::Agreement);
        registry.insert(counter("a")).unwrap();

        let result: CoreResult<(Counter, ())> =
            registry.apply("a", |_| Err(CoreError::invalid_state("a", "nope")));
        assert!(result.is_err());
        assert_eq!(registry.current("a").unwrap().version, 1);
        assert_eq!(registry.history("a").unwrap().len(), 1);
    }

    #[test]
    fn test_successor_must_bump_version() {
        let registry = VersionedRegistry::new(EntityKind::Contract);
        registry.insert(counter("a")).unwrap();

        let result = registry.apply("a", |c| Ok((c.clone(), ())));
        assert!(matches!(result, Err(CoreError::InvalidState { .. })));
    }

    #[test]
    fn test_unknown_id_and_duplicate_insert() {
        let registry = VersionedRegistry::new(EntityKind::Contract);
        assert!(matches!(
            registry.apply("missing", bump),
            Err(CoreError::NotFound { kind: EntityKind::Contract, .. })
        ));

        registry.insert(counter("a")).unwrap();
        assert!(registry.insert(counter("a")).is_err());
    }

    #[test]
    fn test_concurrent_commands_on_same_id_are_serialized() {
        let registry = Arc::new(VersionedRegistry::new(EntityKind::Agreement));
        registry.insert(counter("a")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..50 {
                        registry.apply("a", bump).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let current = registry.current("a").unwrap();
        assert_eq!(current.value, 400);
        assert_eq!(current.version, 401);
    }
}
