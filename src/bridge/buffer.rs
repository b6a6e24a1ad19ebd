//! Per-region telemetry buffer.
//!
//! Ingestion appends; the scheduler drains. `drain_before` reads and evicts
//! under one lock, so every record is handed out exactly once.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::model::{RegionLabel, TelemetryRecord};

#[derive(Debug, Default)]
pub struct TelemetryBuffer {
    regions: Mutex<BTreeMap<RegionLabel, Vec<TelemetryRecord>>>,
}

impl TelemetryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, region: RegionLabel, record: TelemetryRecord) {
        self.regions.lock().entry(region).or_default().push(record);
    }

    /// Remove and return every record with `timestamp < cutoff`, grouped by
    /// region in label order. Records at or after the cutoff stay buffered.
    pub fn drain_before(&self, cutoff: DateTime<Utc>) -> Vec<(RegionLabel, Vec<TelemetryRecord>)> {
        let mut regions = self.regions.lock();
        let mut drained = Vec::new();

        for (label, records) in regions.iter_mut() {
            let (taken, kept): (Vec<_>, Vec<_>) =
                records.drain(..).partition(|r| r.timestamp < cutoff);
            *records = kept;
            if !taken.is_empty() {
                drained.push((label.clone(), taken));
            }
        }
        regions.retain(|_, records| !records.is_empty());
        drained
    }

    pub fn len(&self) -> usize {
        self.regions.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn region_count(&self) -> usize {
        self.regions.lock().len()
    }
}
