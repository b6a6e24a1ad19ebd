//! Id-keyed key-value repository.
//!
//! Callers get explicit `get/put/delete`; `list` makes no ordering promise.

use std::collections::HashMap;

use parking_lot::RwLock;

pub trait Repository<V>: Send + Sync {
    fn get(&self, id: &str) -> Option<V>;
    fn put(&self, id: &str, value: V);
    fn delete(&self, id: &str) -> Option<V>;
    fn contains(&self, id: &str) -> bool;
    /// All values, in no particular order.
    fn list(&self) -> Vec<V>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory repository backed by a `HashMap`.
#[derive(Debug)]
pub struct MemoryRepository<V> {
    entries: RwLock<HashMap<String, V>>,
}

impl<V> Default for MemoryRepository<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<V> MemoryRepository<V> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: Clone + Send + Sync> Repository<V> for MemoryRepository<V> {
    fn get(&self, id: &str) -> Option<V> {
        self.entries.read().get(id).cloned()
    }

    fn put(&self, id: &str, value: V) {
        self.entries.write().insert(id.to_string(), value);
    }

    fn delete(&self, id: &str) -> Option<V> {
        self.entries.write().remove(id)
    }

    fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    fn list(&self) -> Vec<V> {
        self.entries.read().values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put_delete() {
        let repo: MemoryRepository<u32> = MemoryRepository::new();
        assert!(repo.is_empty());

        repo.put("a", 1);
        repo.put("b", 2);
        assert_eq!(repo.get("a"), Some(1));
        assert!(repo.contains("b"));
        assert_eq!(repo.len(), 2);

        repo.put("a", 10);
        assert_eq!(repo.get("a"), Some(10));

        assert_eq!(repo.delete("a"), Some(10));
        assert_eq!(repo.get("a"), None);
        assert_eq!(repo.delete("a"), None);

        let mut all = repo.list();
        all.sort();
        assert_eq!(all, vec![2]);
    }
}
