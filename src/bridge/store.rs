//! Migrated aggregates, queryable by region and time.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::model::{RegionLabel, RegionalAggregate, StoredAggregate};
use crate::storage::{MemoryRepository, Repository};

pub struct AggregateStore {
    records: Arc<dyn Repository<StoredAggregate>>,
}

impl Default for AggregateStore {
    fn default() -> Self {
        Self::new(Arc::new(MemoryRepository::new()))
    }
}

impl AggregateStore {
    pub fn new(records: Arc<dyn Repository<StoredAggregate>>) -> Self {
        Self { records }
    }

    pub fn put(&self, stored: StoredAggregate) {
        self.records.put(&stored.record_id.clone(), stored);
    }

    pub fn get(&self, record_id: &str) -> Option<StoredAggregate> {
        self.records.get(record_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Aggregates of `region` stamped inside `[start, end)`, oldest first.
    pub fn query(
        &self,
        region: &RegionLabel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<RegionalAggregate> {
        let mut found: Vec<RegionalAggregate> = self
            .records
            .list()
            .into_iter()
            .map(|s| s.aggregate)
            .filter(|a| &a.label() == region && a.timestamp >= start && a.timestamp < end)
            .collect();
        found.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        found
    }

    pub fn regions(&self) -> Vec<RegionLabel> {
        let mut labels: Vec<RegionLabel> = self.records.list().iter().map(|s| s.aggregate.label()).collect();
        labels.sort();
        labels.dedup();
        labels
    }
}
