//! Periodic migration runs.
//!
//! A run drains every buffered record older than `now`, aggregates per region,
//! and migrates the aggregates together with whatever the previous run left
//! behind. Only one run executes at a time; an overlapping request is rejected.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use chrono::Duration;
use parking_lot::{Condvar, Mutex};

use crate::config::BridgeConfig;
use crate::events::{EventBus, NetworkEvent};
use crate::model::{RegionLabel, RegionalAggregate, TelemetryRecord};
use crate::runtime::{Clock, IdGenerator};
use crate::storage::PermissionedLedger;
use crate::logging::structured::LogContext;
use crate::{log_debug, log_error, log_info, log_warn};

use super::aggregate::{SimpleMeanAggregator, TimeWindow};
use super::buffer::TelemetryBuffer;
use super::context::RunContext;
use super::integrity::check_integrity;
use super::migration::{MigrationResult, Migrator};
use super::region::RegionResolver;
use super::store::AggregateStore;

#[derive(Debug, Clone, PartialEq)]
pub struct MigrationReport {
    pub run_id: String,
    pub window: TimeWindow,
    pub records: usize,
    /// Aggregates built from this run's records.
    pub aggregates: usize,
    /// Aggregates carried over from earlier runs.
    pub retried: usize,
    pub integrity_failures: usize,
    pub result: MigrationResult,
    /// Aggregates kept for the next run.
    pub pending: usize,
    /// Oldest unmigrated aggregates discarded to stay under the pending cap.
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(MigrationReport),
    /// Nothing buffered and nothing pending; no aggregate was created.
    Skipped,
    /// Another run was in progress.
    Rejected,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct MigrationScheduler {
    config: BridgeConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    resolver: Arc<dyn RegionResolver>,
    events: Arc<EventBus>,
    store: Arc<AggregateStore>,
    aggregator: SimpleMeanAggregator,
    migrator: Migrator,
    buffer: TelemetryBuffer,
    pending: Mutex<Vec<RegionalAggregate>>,
    running: AtomicBool,
    cancel: Arc<AtomicBool>,
}

impl MigrationScheduler {
    pub fn new(
        config: BridgeConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        resolver: Arc<dyn RegionResolver>,
        ledger: Arc<dyn PermissionedLedger>,
        store: Arc<AggregateStore>,
        events: Arc<EventBus>,
    ) -> Self {
        let aggregator = SimpleMeanAggregator::new(&config.source_tag, config.schema_version);
        let migrator = Migrator::new(ledger, clock.clone(), config.retry.clone());
        Self {
            config,
            clock,
            ids,
            resolver,
            events,
            store,
            aggregator,
            migrator,
            buffer: TelemetryBuffer::new(),
            pending: Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Buffer an accepted record under its region.
    pub fn ingest(&self, record: TelemetryRecord) -> RegionLabel {
        let label = self.resolver.resolve(&record.location);
        self.buffer.push(label.clone(), record);
        label
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn store(&self) -> &Arc<AggregateStore> {
        &self.store
    }

    pub fn run_once(&self) -> RunOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log_warn!(
                LogContext::new("scheduler"),
                "MIGRATION_RUN_REJECTED",
                reason = "run already in progress"
            );
            return RunOutcome::Rejected;
        }
        let _guard = RunningGuard(&self.running);
        self.cancel.store(false, Ordering::SeqCst);

        let now = self.clock.now();
        let interval = self.config.interval();
        let drained = self.buffer.drain_before(now);
        let carried: Vec<RegionalAggregate> = std::mem::take(&mut *self.pending.lock());

        if drained.is_empty() && carried.is_empty() {
            log_debug!(LogContext::new("scheduler"), "MIGRATION_RUN_SKIPPED", reason = "no records");
            return RunOutcome::Skipped;
        }

        // Records that arrived late or missed a run still get aggregated: the
        // window stretches back to the oldest drained record.
        let earliest = drained
            .iter()
            .flat_map(|(_, records)| records.iter().map(|r| r.timestamp))
            .min();
        let nominal_start = now - interval;
        let start = earliest.map_or(nominal_start, |e| e.min(nominal_start));
        let window = TimeWindow::new(start, now);

        let ctx = RunContext::new(
            &self.ids.next_id("run"),
            now,
            now + interval,
            window,
            self.cancel.clone(),
        );
        let log_ctx = ctx.log_context();
        let records: usize = drained.iter().map(|(_, r)| r.len()).sum();
        log_info!(
            log_ctx,
            "MIGRATION_RUN_START",
            records = records,
            regions = drained.len(),
            carried = carried.len()
        );

        let max_age = Duration::hours(self.config.freshness_max_age_hours as i64);
        let mut integrity_failures = 0;
        let mut fresh = Vec::with_capacity(drained.len());
        for (label, region_records) in &drained {
            let aggregate = self.aggregator.aggregate(label, region_records, None, &window);
            if aggregate.is_empty() {
                continue;
            }
            let report = check_integrity(&aggregate, now, max_age);
            if !report.passed() {
                integrity_failures += 1;
                log_warn!(
                    ctx.region_context(label),
                    "INTEGRITY_CHECK_FAILED",
                    failures = report.failures()
                );
            }
            fresh.push(aggregate);
        }

        let retried = carried.len();
        let aggregates = fresh.len();
        let mut batch = carried;
        batch.extend(fresh);

        let outcome = self.migrator.migrate_batch(&ctx, batch);
        for stored in outcome.migrated {
            log_debug!(
                ctx.region_context(&stored.aggregate.label()),
                "AGGREGATE_STORED",
                record_id = stored.record_id
            );
            self.store.put(stored);
        }

        let (pending, dropped) = {
            let mut pending = self.pending.lock();
            pending.extend(outcome.unmigrated);
            let dropped = pending.len().saturating_sub(self.config.max_pending_aggregates);
            if dropped > 0 {
                pending.sort_by_key(|a| a.timestamp);
                let kept = pending.split_off(dropped);
                *pending = kept;
            }
            (pending.len(), dropped)
        };
        if dropped > 0 {
            log_warn!(
                log_ctx,
                "PENDING_QUEUE_TRIMMED",
                dropped = dropped,
                cap = self.config.max_pending_aggregates
            );
        }

        log_info!(
            log_ctx,
            "MIGRATION_RUN_COMPLETE",
            succeeded = outcome.result.success_count,
            failed = outcome.result.failure_count,
            deferred = outcome.result.deferred_count,
            pending = pending
        );
        self.events.emit(NetworkEvent::MigrationCompleted {
            run_id: ctx.run_id.clone(),
            success_count: outcome.result.success_count,
            failure_count: outcome.result.failure_count,
            deferred_count: outcome.result.deferred_count,
        });

        RunOutcome::Completed(MigrationReport {
            run_id: ctx.run_id,
            window,
            records,
            aggregates,
            retried,
            integrity_failures,
            result: outcome.result,
            pending,
            dropped,
        })
    }

    /// Run every configured interval on a background thread.
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let period = self
            .config
            .interval()
            .to_std()
            .unwrap_or(StdDuration::from_secs(3600));
        self.start_with_period(period)
    }

    pub fn start_with_period(self: &Arc<Self>, period: StdDuration) -> SchedulerHandle {
        let signal = Arc::new((Mutex::new(false), Condvar::new()));
        let scheduler = Arc::clone(self);
        let thread_signal = Arc::clone(&signal);

        let thread = thread::spawn(move || {
            let (stopped, wake) = &*thread_signal;
            loop {
                {
                    let mut stopped = stopped.lock();
                    if !*stopped {
                        wake.wait_for(&mut stopped, period);
                    }
                    if *stopped {
                        break;
                    }
                }
                scheduler.run_once();
            }
            log_info!(LogContext::new("scheduler"), "MIGRATION_SCHEDULER_STOPPED");
        });

        log_info!(
            LogContext::new("scheduler"),
            "MIGRATION_SCHEDULER_STARTED",
            period_ms = period.as_millis()
        );
        SchedulerHandle {
            signal,
            cancel: Arc::clone(&self.cancel),
            thread: Some(thread),
        }
    }
}

/// Stops the background thread when `stop` is called or the handle drops.
/// An in-flight run finishes its current item; the rest stay pending.
pub struct SchedulerHandle {
    signal: Arc<(Mutex<bool>, Condvar)>,
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let (stopped, wake) = &*self.signal;
        *stopped.lock() = true;
        self.cancel.store(true, Ordering::SeqCst);
        wake.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log_error!(LogContext::new("scheduler"), "MIGRATION_SCHEDULER_PANICKED");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::region::ConfiguredRegionResolver;
    use crate::bridge::retry::RetryPolicy;
    use crate::events::QueueListener;
    use crate::model::{Location, NamedRegion};
    use crate::runtime::{ManualClock, SequentialIdGenerator};
    use crate::storage::InMemoryLedger;
    use chrono::{DateTime, TimeZone, Utc};

    struct Harness {
        scheduler: Arc<MigrationScheduler>,
        clock: Arc<ManualClock>,
        ledger: Arc<InMemoryLedger>,
        store: Arc<AggregateStore>,
        events: Arc<QueueListener>,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
    }

    fn harness(max_attempts: u32) -> Harness {
        harness_with_cap(max_attempts, BridgeConfig::default().max_pending_aggregates)
    }

    fn harness_with_cap(max_attempts: u32, max_pending_aggregates: usize) -> Harness {
        let config = BridgeConfig {
            migration_interval_hours: 1,
            retry: RetryPolicy::immediate(max_attempts),
            max_pending_aggregates,
            named_regions: vec![NamedRegion {
                country: "IN".to_string(),
                city: "Pune".to_string(),
                latitude: 18.52,
                longitude: 73.86,
                radius_m: 25_000.0,
            }],
            ..BridgeConfig::default()
        };
        let clock = Arc::new(ManualClock::new(t0()));
        let ids: Arc<dyn IdGenerator> = Arc::new(SequentialIdGenerator::new());
        let ledger = Arc::new(InMemoryLedger::new(ids.clone()));
        let store = Arc::new(AggregateStore::default());
        let bus = Arc::new(EventBus::new());
        let events = Arc::new(QueueListener::new());
        bus.subscribe(events.clone());
        let resolver = Arc::new(ConfiguredRegionResolver::new(
            config.named_regions.clone(),
            config.region_grid_degrees,
        ));
        let scheduler = Arc::new(MigrationScheduler::new(
            config,
            clock.clone(),
            ids,
            resolver,
            ledger.clone(),
            store.clone(),
            bus,
        ));
        Harness {
            scheduler,
            clock,
            ledger,
            store,
            events,
        }
    }

    fn record(device: &str, lat: f64, lon: f64, at: DateTime<Utc>) -> TelemetryRecord {
        TelemetryRecord {
            device_id: device.to_string(),
            signal_strength: -66,
            latency: 30,
            throughput: 6_000_000,
            availability: 0.98,
            location: Location::new(lat, lon, 4.0),
            timestamp: at,
        }
    }

    #[test]
    fn test_run_with_no_records_is_skipped() {
        let h = harness(1);
        assert_eq!(h.scheduler.run_once(), RunOutcome::Skipped);
        assert!(h.store.is_empty());
        assert!(h.events.is_empty());
    }

    #[test]
    fn test_run_aggregates_per_region_and_evicts() {
        let h = harness(1);
        let label = h.scheduler.ingest(record("d1", 18.52, 73.85, t0() + Duration::minutes(5)));
        assert_eq!(label, RegionLabel::new("IN", "Pune"));
        h.scheduler.ingest(record("d2", 18.53, 73.86, t0() + Duration::minutes(10)));
        h.scheduler.ingest(record("d3", 40.0, -3.7, t0() + Duration::minutes(20)));
        h.clock.advance(Duration::hours(1));

        let report = match h.scheduler.run_once() {
            RunOutcome::Completed(report) => report,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(report.records, 3);
        assert_eq!(report.aggregates, 2);
        assert_eq!(report.result.success_count, 2);
        assert_eq!(report.pending, 0);
        assert_eq!(report.window.end, h.clock.now());
        assert_eq!(h.scheduler.buffered(), 0);
        assert_eq!(h.ledger.aggregate_count(), 2);

        let pune = h
            .store
            .query(&RegionLabel::new("IN", "Pune"), t0(), h.clock.now() + Duration::seconds(1));
        assert_eq!(pune.len(), 1);
        assert_eq!(pune[0].metrics.device_count, 2);

        // Each record was aggregated exactly once.
        assert_eq!(h.scheduler.run_once(), RunOutcome::Skipped);
        assert_eq!(h.events.len(), 1);
    }

    #[test]
    fn test_late_records_extend_the_window() {
        let h = harness(1);
        h.scheduler.ingest(record("d1", 18.52, 73.85, t0()));
        h.clock.advance(Duration::hours(5));

        match h.scheduler.run_once() {
            RunOutcome::Completed(report) => {
                assert_eq!(report.window.start, t0());
                assert_eq!(report.result.success_count, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_failed_aggregates_retried_next_run() {
        let h = harness(2);
        h.scheduler.ingest(record("d1", 18.52, 73.85, t0()));
        h.clock.advance(Duration::hours(1));
        h.ledger.set_unavailable(true);

        match h.scheduler.run_once() {
            RunOutcome::Completed(report) => {
                assert_eq!(report.result.failure_count, 1);
                assert_eq!(report.pending, 1);
            }
            other => panic!("unexpected {:?}", other),
        }

        h.ledger.set_unavailable(false);
        h.clock.advance(Duration::hours(1));
        match h.scheduler.run_once() {
            RunOutcome::Completed(report) => {
                assert_eq!(report.retried, 1);
                assert_eq!(report.aggregates, 0);
                assert_eq!(report.result.success_count, 1);
                assert_eq!(report.pending, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(h.store.len(), 1);
    }

    #[test]
    fn test_pending_queue_keeps_newest_under_cap() {
        let h = harness_with_cap(1, 2);
        h.ledger.set_unavailable(true);

        // One region per run so each run leaves one more unmigrated aggregate.
        let sites = [(18.52, 73.85), (40.0, -3.7), (51.5, -0.12)];
        let mut last = None;
        for (lat, lon) in sites {
            h.scheduler.ingest(record("d1", lat, lon, h.clock.now()));
            h.clock.advance(Duration::hours(1));
            last = Some(h.scheduler.run_once());
        }
        match last {
            Some(RunOutcome::Completed(report)) => {
                assert_eq!(report.retried, 2);
                assert_eq!(report.pending, 2);
                assert_eq!(report.dropped, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(h.scheduler.pending(), 2);

        h.ledger.set_unavailable(false);
        h.clock.advance(Duration::hours(1));
        match h.scheduler.run_once() {
            RunOutcome::Completed(report) => {
                assert_eq!(report.result.success_count, 2);
                assert_eq!(report.dropped, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
        // The Pune aggregate was the oldest and was discarded.
        let pune = h
            .store
            .query(&RegionLabel::new("IN", "Pune"), t0(), h.clock.now() + Duration::seconds(1));
        assert!(pune.is_empty());
        assert_eq!(h.store.len(), 2);
    }

    #[test]
    fn test_overlapping_run_rejected() {
        let h = harness(1);
        h.scheduler.running.store(true, Ordering::SeqCst);
        assert_eq!(h.scheduler.run_once(), RunOutcome::Rejected);
        h.scheduler.running.store(false, Ordering::SeqCst);
        assert_eq!(h.scheduler.run_once(), RunOutcome::Skipped);
    }

    #[test]
    fn test_background_thread_runs_and_stops() {
        let h = harness(1);
        h.scheduler.ingest(record("d1", 18.52, 73.85, t0()));
        h.clock.advance(Duration::hours(1));

        let handle = h.scheduler.start_with_period(StdDuration::from_millis(5));
        let deadline = std::time::Instant::now() + StdDuration::from_secs(5);
        while h.store.is_empty() && std::time::Instant::now() < deadline {
            thread::sleep(StdDuration::from_millis(5));
        }
        handle.stop();

        assert_eq!(h.store.len(), 1);
        assert!(!h.scheduler.is_running());
    }
}
