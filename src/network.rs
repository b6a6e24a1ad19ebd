//! Service facade wiring every component behind one handle.
//!
//! Inbound device traffic goes to the reward engine; accepted telemetry is fed
//! to the migration scheduler; B2B commands go to the registries. Every
//! state change is published on the event bus.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::agreements::{AgreementRegistry, ContractRegistry, NewAgreement, NewContract};
use crate::bridge::{
    anonymize, rollup, AggregateStore, ConfiguredRegionResolver, MigrationScheduler, RunOutcome,
    SchedulerHandle,
};
use crate::config::NetworkConfig;
use crate::error::{CoreError, CoreResult, EntityKind};
use crate::events::{EventBus, Listener, NetworkEvent};
use crate::insights::{network_insights, NetworkInsights};
use crate::log_info;
use crate::logging::structured::LogContext;
use crate::model::{
    AgreementTerms, AggregateMetrics, Device, DeviceType, InfrastructureContract, Location,
    NetworkDataSnapshot, NetworkQualityData, Region, RegionLabel, RegionalAggregate,
    RoamingAgreement, StoredAggregate,
};
use crate::rewards::{ProgramState, RewardEngine};
use crate::runtime::{Clock, IdGenerator};
use crate::settlement::{
    revenue_sharing, usage_cost, DataUsage, InfrastructureCostResult, InfrastructureUsage,
    RevenueSharingResult,
};
use crate::storage::{InMemoryLedger, MemoryRepository, PermissionedLedger};

pub struct DepinNetwork {
    config: NetworkConfig,
    clock: Arc<dyn Clock>,
    ledger: Arc<dyn PermissionedLedger>,
    events: Arc<EventBus>,
    rewards: RewardEngine,
    scheduler: Arc<MigrationScheduler>,
    store: Arc<AggregateStore>,
    agreements: AgreementRegistry,
    contracts: ContractRegistry,
}

impl DepinNetwork {
    pub fn new(
        config: NetworkConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        ledger: Arc<dyn PermissionedLedger>,
    ) -> CoreResult<Self> {
        config.validate()?;

        let events = Arc::new(EventBus::new());
        let store = Arc::new(AggregateStore::default());
        let resolver = Arc::new(ConfiguredRegionResolver::new(
            config.bridge.named_regions.clone(),
            config.bridge.region_grid_degrees,
        ));
        let scheduler = Arc::new(MigrationScheduler::new(
            config.bridge.clone(),
            clock.clone(),
            ids.clone(),
            resolver,
            ledger.clone(),
            store.clone(),
            events.clone(),
        ));
        let rewards = RewardEngine::new(
            config.reward.clone(),
            clock.clone(),
            Arc::new(MemoryRepository::<Device>::new()),
        );

        log_info!(
            LogContext::new("network"),
            "NETWORK_INITIALIZED",
            interval_hours = config.bridge.migration_interval_hours,
            named_regions = config.bridge.named_regions.len(),
            vault_floor = config.reward.enforce_vault_floor
        );

        Ok(Self {
            agreements: AgreementRegistry::new(ledger.clone(), clock.clone(), ids.clone()),
            contracts: ContractRegistry::new(ledger.clone(), clock.clone(), ids),
            config,
            clock,
            ledger,
            events,
            rewards,
            scheduler,
            store,
        })
    }

    /// A network backed by the in-memory ledger, which is returned for
    /// inspection and failure injection.
    pub fn simulated(
        config: NetworkConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> CoreResult<(Self, Arc<InMemoryLedger>)> {
        let ledger = Arc::new(InMemoryLedger::new(ids.clone()));
        let network = Self::new(config, clock, ids, ledger.clone())?;
        Ok((network, ledger))
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn subscribe(&self, listener: Arc<dyn Listener>) {
        self.events.subscribe(listener);
    }

    // Public layer

    pub fn register_device(
        &self,
        id: &str,
        device_type: DeviceType,
        location: Location,
        owner: &str,
    ) -> CoreResult<Device> {
        let device = self.rewards.register_device(id, device_type, location, owner)?;
        self.events.emit(NetworkEvent::DeviceRegistered {
            device_id: device.id.clone(),
            owner: device.owner.clone(),
        });
        Ok(device)
    }

    /// Score and credit a submission, then buffer it for migration. Returns
    /// the reward.
    pub fn submit_telemetry(&self, device_id: &str, data: &NetworkQualityData) -> CoreResult<u64> {
        match self.rewards.submit(device_id, data) {
            Ok(receipt) => {
                let region = self.scheduler.ingest(receipt.record);
                self.events.emit(NetworkEvent::TelemetryAccepted {
                    device_id: device_id.to_string(),
                    reward: receipt.reward,
                    region,
                });
                Ok(receipt.reward)
            }
            Err(e) => {
                self.events.emit(NetworkEvent::TelemetryRejected {
                    device_id: device_id.to_string(),
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn update_device_location(&self, owner: &str, device_id: &str, location: Location) -> CoreResult<Device> {
        self.rewards.update_location(owner, device_id, location)
    }

    pub fn toggle_device_status(&self, owner: &str, device_id: &str) -> CoreResult<Device> {
        self.rewards.toggle_status(owner, device_id)
    }

    pub fn pause(&self) {
        self.rewards.pause();
    }

    pub fn resume(&self) {
        self.rewards.resume();
    }

    pub fn program_state(&self) -> ProgramState {
        self.rewards.program_state()
    }

    pub fn device(&self, id: &str) -> CoreResult<Device> {
        self.rewards
            .device(id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Device, id))
    }

    // Bridge

    pub fn run_migration(&self) -> RunOutcome {
        self.scheduler.run_once()
    }

    pub fn start_scheduler(&self) -> SchedulerHandle {
        self.scheduler.start()
    }

    pub fn buffered_records(&self) -> usize {
        self.scheduler.buffered()
    }

    pub fn pending_aggregates(&self) -> usize {
        self.scheduler.pending()
    }

    /// Record caller-supplied regional metrics on the permissioned layer. The
    /// aggregate is anonymized before it leaves.
    pub fn create_network_data_record(&self, region: Region, metrics: AggregateMetrics) -> CoreResult<String> {
        if !(region.radius >= 0.0) {
            return Err(CoreError::validation(
                &region.label().to_string(),
                format!("radius {} must be >= 0", region.radius),
            ));
        }
        let aggregate = anonymize(RegionalAggregate {
            region,
            metrics,
            timestamp: self.clock.now(),
            source: self.config.bridge.source_tag.clone(),
            version: self.config.bridge.schema_version,
        });
        let content_hash = aggregate.content_hash()?;
        let record_id = self.ledger.create_network_data_record(&aggregate, &content_hash)?;
        self.store.put(StoredAggregate {
            record_id: record_id.clone(),
            content_hash,
            aggregate,
        });
        Ok(record_id)
    }

    pub fn aggregates(&self, region: &RegionLabel, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<RegionalAggregate> {
        self.store.query(region, start, end)
    }

    /// Every migrated aggregate of a region rolled into one.
    pub fn region_rollup(&self, region: &RegionLabel) -> CoreResult<RegionalAggregate> {
        let all = self
            .store
            .query(region, DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MAX_UTC);
        if all.is_empty() {
            return Err(CoreError::not_found(EntityKind::Aggregate, &region.to_string()));
        }
        rollup(&all)
    }

    // Permissioned layer

    pub fn create_roaming_agreement(&self, request: NewAgreement) -> CoreResult<RoamingAgreement> {
        let agreement = self.agreements.create(request)?;
        self.agreement_changed(&agreement);
        Ok(agreement)
    }

    /// Create an agreement whose region and network snapshot come from the
    /// region's migrated aggregates.
    pub fn create_roaming_agreement_for_region(
        &self,
        partner_id: &str,
        region: &RegionLabel,
        terms: AgreementTerms,
    ) -> CoreResult<RoamingAgreement> {
        let rolled = self.region_rollup(region)?;
        self.create_roaming_agreement(NewAgreement {
            partner_id: partner_id.to_string(),
            network_data: NetworkDataSnapshot::from_aggregate(&rolled),
            region: rolled.region,
            terms,
        })
    }

    pub fn activate_agreement(&self, id: &str) -> CoreResult<RoamingAgreement> {
        let agreement = self.agreements.activate(id)?;
        self.agreement_changed(&agreement);
        Ok(agreement)
    }

    pub fn suspend_agreement(&self, id: &str) -> CoreResult<RoamingAgreement> {
        let agreement = self.agreements.suspend(id)?;
        self.agreement_changed(&agreement);
        Ok(agreement)
    }

    /// Returns the revenue computed for this execution.
    pub fn execute_agreement(&self, id: &str) -> CoreResult<f64> {
        let (agreement, revenue) = self.agreements.execute(id)?;
        self.agreement_changed(&agreement);
        Ok(revenue)
    }

    pub fn terminate_agreement(&self, id: &str) -> CoreResult<RoamingAgreement> {
        let agreement = self.agreements.terminate(id)?;
        self.agreement_changed(&agreement);
        Ok(agreement)
    }

    pub fn agreement(&self, id: &str) -> CoreResult<RoamingAgreement> {
        self.agreements.get(id)
    }

    pub fn agreement_history(&self, id: &str) -> CoreResult<Vec<RoamingAgreement>> {
        self.agreements.history(id)
    }

    pub fn create_infrastructure_contract(&self, request: NewContract) -> CoreResult<InfrastructureContract> {
        let contract = self.contracts.create(request)?;
        self.contract_changed(&contract);
        Ok(contract)
    }

    pub fn activate_contract(&self, id: &str) -> CoreResult<InfrastructureContract> {
        let contract = self.contracts.activate(id)?;
        self.contract_changed(&contract);
        Ok(contract)
    }

    pub fn suspend_contract(&self, id: &str) -> CoreResult<InfrastructureContract> {
        let contract = self.contracts.suspend(id)?;
        self.contract_changed(&contract);
        Ok(contract)
    }

    /// Returns the infrastructure cost computed for this execution.
    pub fn execute_contract(&self, id: &str) -> CoreResult<f64> {
        let (contract, cost) = self.contracts.execute(id)?;
        self.contract_changed(&contract);
        Ok(cost)
    }

    pub fn settle_contract(&self, id: &str, usage: InfrastructureUsage) -> CoreResult<InfrastructureCostResult> {
        let (contract, settlement) = self.contracts.settle(id, usage)?;
        self.contract_changed(&contract);
        Ok(settlement)
    }

    pub fn terminate_contract(&self, id: &str) -> CoreResult<InfrastructureContract> {
        let contract = self.contracts.terminate(id)?;
        self.contract_changed(&contract);
        Ok(contract)
    }

    pub fn contract(&self, id: &str) -> CoreResult<InfrastructureContract> {
        self.contracts.get(id)
    }

    pub fn contract_history(&self, id: &str) -> CoreResult<Vec<InfrastructureContract>> {
        self.contracts.history(id)
    }

    /// Persist EXPIRED on every record whose duration has elapsed. Returns the
    /// expired agreement ids and contract ids.
    pub fn sweep_expired(&self) -> (Vec<String>, Vec<String>) {
        let now = self.clock.now();
        let agreements = self.agreements.sweep_expired(now);
        let contracts = self.contracts.sweep_expired(now);
        for id in &agreements {
            if let Ok(agreement) = self.agreements.get(id) {
                self.agreement_changed(&agreement);
            }
        }
        for id in &contracts {
            if let Ok(contract) = self.contracts.get(id) {
                self.contract_changed(&contract);
            }
        }
        (agreements, contracts)
    }

    // Queries

    pub fn get_network_insights(
        &self,
        region: &RegionLabel,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> NetworkInsights {
        let aggregates = self.store.query(region, start, end);
        network_insights(
            region,
            start,
            end,
            &aggregates,
            self.config.insights.trend_chunk_size,
        )
    }

    pub fn get_active_agreements(&self) -> Vec<RoamingAgreement> {
        self.agreements.active(self.clock.now())
    }

    pub fn get_active_contracts(&self) -> Vec<InfrastructureContract> {
        self.contracts.active(self.clock.now())
    }

    pub fn calculate_revenue_sharing(&self, agreement_id: &str, usage: &DataUsage) -> CoreResult<RevenueSharingResult> {
        let agreement = self.agreements.get(agreement_id)?;
        Ok(revenue_sharing(&agreement, usage))
    }

    pub fn calculate_infrastructure_costs(
        &self,
        contract_id: &str,
        usage: &InfrastructureUsage,
    ) -> CoreResult<InfrastructureCostResult> {
        let contract = self.contracts.get(contract_id)?;
        Ok(usage_cost(&contract, usage))
    }

    fn agreement_changed(&self, agreement: &RoamingAgreement) {
        self.events.emit(NetworkEvent::AgreementChanged {
            agreement_id: agreement.id.clone(),
            version: agreement.version,
            status: agreement.status,
        });
    }

    fn contract_changed(&self, contract: &InfrastructureContract) {
        self.events.emit(NetworkEvent::ContractChanged {
            contract_id: contract.id.clone(),
            version: contract.version,
            status: contract.status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::QueueListener;
    use crate::model::{ContractType, LifecycleStatus};
    use crate::runtime::{ManualClock, SequentialIdGenerator};
    use crate::settlement::fixtures;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn network() -> (DepinNetwork, Arc<ManualClock>, Arc<InMemoryLedger>, Arc<QueueListener>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let (network, ledger) = DepinNetwork::simulated(
            NetworkConfig::development(),
            clock.clone(),
            Arc::new(SequentialIdGenerator::new()),
        )
        .unwrap();
        let listener = Arc::new(QueueListener::new());
        network.subscribe(listener.clone());
        (network, clock, ledger, listener)
    }

    fn sample(signal: i32) -> NetworkQualityData {
        NetworkQualityData {
            signal_strength: signal,
            latency: 25,
            throughput: 5_000_000,
            availability: 0.99,
            location: Location::new(37.7749, -122.4194, 5.0),
        }
    }

    fn accepted_region(events: &[NetworkEvent]) -> RegionLabel {
        events
            .iter()
            .find_map(|e| match e {
                NetworkEvent::TelemetryAccepted { region, .. } => Some(region.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = NetworkConfig::default();
        config.bridge.migration_interval_hours = 0;
        let result = DepinNetwork::simulated(
            config,
            Arc::new(ManualClock::new(t0())),
            Arc::new(SequentialIdGenerator::new()),
        );
        assert!(matches!(result, Err(CoreError::Configuration(_))));
    }

    #[test]
    fn test_submission_flows_into_migration() {
        let (network, clock, ledger, listener) = network();
        network
            .register_device("dev-1", DeviceType::Hotspot, Location::new(37.77, -122.42, 3.0), "alice")
            .unwrap();
        let reward = network.submit_telemetry("dev-1", &sample(-50)).unwrap();
        assert!(reward > 0);
        assert_eq!(network.buffered_records(), 1);
        assert_eq!(network.program_state().total_rewards_distributed, reward);

        clock.advance(Duration::seconds(1));
        match network.run_migration() {
            RunOutcome::Completed(report) => {
                assert_eq!(report.records, 1);
                assert_eq!(report.result.success_count, 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(ledger.aggregate_count(), 1);
        assert_eq!(network.buffered_records(), 0);

        let events = listener.drain();
        let region = accepted_region(&events);
        assert!(matches!(events[0], NetworkEvent::DeviceRegistered { .. }));
        assert!(events
            .iter()
            .any(|e| matches!(e, NetworkEvent::MigrationCompleted { success_count: 1, .. })));

        let insights = network.get_network_insights(&region, t0(), t0() + Duration::days(1));
        assert_eq!(insights.aggregate_count, 1);
        assert_eq!(insights.total_data_points, 1);
    }

    #[test]
    fn test_rejected_submission_emits_event() {
        let (network, _clock, _ledger, listener) = network();
        let err = network.submit_telemetry("ghost", &sample(-60)).unwrap_err();
        assert_eq!(err, CoreError::not_found(EntityKind::Device, "ghost"));
        assert!(matches!(
            listener.drain().as_slice(),
            [NetworkEvent::TelemetryRejected { .. }]
        ));
        assert_eq!(network.buffered_records(), 0);
    }

    #[test]
    fn test_agreement_from_migrated_region() {
        let (network, clock, _ledger, listener) = network();
        network
            .register_device("dev-1", DeviceType::Router, Location::new(37.77, -122.42, 3.0), "alice")
            .unwrap();
        network.submit_telemetry("dev-1", &sample(-55)).unwrap();
        let region = accepted_region(&listener.drain());

        // Nothing migrated yet.
        assert!(matches!(
            network.create_roaming_agreement_for_region("carrier-a", &region, fixtures::agreement_terms()),
            Err(CoreError::NotFound { kind: EntityKind::Aggregate, .. })
        ));

        clock.advance(Duration::seconds(1));
        network.run_migration();
        let agreement = network
            .create_roaming_agreement_for_region("carrier-a", &region, fixtures::agreement_terms())
            .unwrap();
        assert_eq!(agreement.status, LifecycleStatus::Pending);
        assert_eq!(agreement.region.label(), region);
        assert_eq!(agreement.network_data.device_count, 1);

        network.activate_agreement(&agreement.id).unwrap();
        clock.advance(Duration::hours(1));
        let revenue = network.execute_agreement(&agreement.id).unwrap();
        assert!(revenue > 0.0);
        assert_eq!(network.get_active_agreements().len(), 1);
        assert_eq!(network.agreement_history(&agreement.id).unwrap().len(), 3);

        let changes = listener
            .drain()
            .into_iter()
            .filter(|e| matches!(e, NetworkEvent::AgreementChanged { .. }))
            .count();
        assert_eq!(changes, 3);
    }

    #[test]
    fn test_contract_settlement_and_costs() {
        let (network, clock, ledger, _listener) = network();
        let contract = network
            .create_infrastructure_contract(NewContract {
                partner_id: "towerco".to_string(),
                contract_type: ContractType::TowerSharing,
                terms: fixtures::contract_terms(),
                network_requirements: fixtures::requirements(),
            })
            .unwrap();
        network.activate_contract(&contract.id).unwrap();
        clock.advance(Duration::days(1));

        let usage = InfrastructureUsage {
            tower_hours: 100.0,
            ..InfrastructureUsage::default()
        };
        let settlement = network.settle_contract(&contract.id, usage).unwrap();
        assert_eq!(settlement.base_cost, 2_000.0);
        assert!((settlement.usage_cost - 10.0).abs() < 1e-9);
        assert_eq!(ledger.settlement_records().len(), 1);

        let quoted = network.calculate_infrastructure_costs(&contract.id, &usage).unwrap();
        assert_eq!(quoted, settlement);
        assert!(matches!(
            network.calculate_infrastructure_costs("ctr-missing", &usage),
            Err(CoreError::NotFound { kind: EntityKind::Contract, .. })
        ));
        assert!(matches!(
            network.calculate_revenue_sharing("agr-missing", &DataUsage { data_usage_mb: 1.0, cost_per_mb: 1.0 }),
            Err(CoreError::NotFound { kind: EntityKind::Agreement, .. })
        ));
    }

    #[test]
    fn test_sweep_expires_both_kinds() {
        let (network, clock, _ledger, _listener) = network();
        let mut terms = fixtures::agreement_terms();
        terms.duration = 1;
        let agreement = network
            .create_roaming_agreement(NewAgreement {
                partner_id: "carrier-b".to_string(),
                region: fixtures::region(),
                terms,
                network_data: fixtures::agreement(t0()).network_data,
            })
            .unwrap();
        let mut contract_terms = fixtures::contract_terms();
        contract_terms.duration = 1;
        let contract = network
            .create_infrastructure_contract(NewContract {
                partner_id: "fiberco".to_string(),
                contract_type: ContractType::FiberAccess,
                terms: contract_terms,
                network_requirements: fixtures::requirements(),
            })
            .unwrap();

        clock.advance(Duration::days(2));
        let (agreements, contracts) = network.sweep_expired();
        assert_eq!(agreements, vec![agreement.id.clone()]);
        assert_eq!(contracts, vec![contract.id.clone()]);
        assert_eq!(network.agreement(&agreement.id).unwrap().status, LifecycleStatus::Expired);
        assert!(network.get_active_contracts().is_empty());
    }

    #[test]
    fn test_direct_network_data_record() {
        let (network, _clock, ledger, _listener) = network();
        let metrics = AggregateMetrics {
            average_signal_strength: -70.123456,
            quality_score: 0.75,
            device_count: 3,
            data_points: 12,
            ..AggregateMetrics::default()
        };
        let id = network
            .create_network_data_record(fixtures::region(), metrics.clone())
            .unwrap();
        let stored = ledger.aggregate(&id).unwrap();
        assert_eq!(stored.aggregate.metrics.average_signal_strength, -70.0);

        // Same content, same record.
        let again = network.create_network_data_record(fixtures::region(), metrics).unwrap();
        assert_eq!(again, id);

        let mut bad = fixtures::region();
        bad.radius = -1.0;
        assert!(matches!(
            network.create_network_data_record(bad, AggregateMetrics::default()),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn test_pause_blocks_registration() {
        let (network, _clock, _ledger, _listener) = network();
        network.pause();
        assert_eq!(
            network
                .register_device("dev-9", DeviceType::Smartphone, Location::new(1.0, 1.0, 1.0), "bob")
                .unwrap_err(),
            CoreError::ProgramPaused
        );
        network.resume();
        assert!(network
            .register_device("dev-9", DeviceType::Smartphone, Location::new(1.0, 1.0, 1.0), "bob")
            .is_ok());
        assert_eq!(network.device("dev-9").unwrap().owner, "bob");
    }
}
