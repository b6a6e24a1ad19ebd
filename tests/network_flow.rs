//! End-to-end flows through the network facade.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use depinfinity_core::agreements::{NewAgreement, NewContract};
use depinfinity_core::bridge::{rollup, RunOutcome};
use depinfinity_core::model::*;
use depinfinity_core::settlement::DataUsage;
use depinfinity_core::storage::InMemoryLedger;
use depinfinity_core::{
    CoreError, DepinNetwork, EntityKind, ManualClock, NetworkConfig, NetworkEvent, QueueListener,
    SequentialIdGenerator,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

fn sf() -> RegionLabel {
    RegionLabel::new("US", "San Francisco")
}

fn setup() -> (DepinNetwork, Arc<ManualClock>, Arc<InMemoryLedger>) {
    let mut config = NetworkConfig::development();
    config.bridge.named_regions = vec![
        NamedRegion {
            country: "US".to_string(),
            city: "San Francisco".to_string(),
            latitude: 37.7749,
            longitude: -122.4194,
            radius_m: 8_000.0,
        },
        NamedRegion {
            country: "US".to_string(),
            city: "Oakland".to_string(),
            latitude: 37.8044,
            longitude: -122.2712,
            radius_m: 5_000.0,
        },
    ];
    let clock = Arc::new(ManualClock::new(t0()));
    let (network, ledger) =
        DepinNetwork::simulated(config, clock.clone(), Arc::new(SequentialIdGenerator::new()))
            .unwrap();
    (network, clock, ledger)
}

fn telemetry(signal: i32, latency: u32, throughput: u64, availability: f64) -> NetworkQualityData {
    NetworkQualityData {
        signal_strength: signal,
        latency,
        throughput,
        availability,
        location: Location::new(37.7790, -122.4180, 4.0),
    }
}

fn terms(revenue_sharing: f64, duration: u32) -> AgreementTerms {
    AgreementTerms {
        data_sharing: true,
        infrastructure_access: false,
        revenue_sharing,
        duration,
        minimum_quality: 0.5,
        coverage_area: 2_000.0,
        performance_metrics: vec!["latency".to_string()],
    }
}

fn snapshot() -> NetworkDataSnapshot {
    NetworkDataSnapshot {
        device_count: 10,
        average_quality: 0.9,
        average_signal_strength: -60.0,
        average_latency: 30.0,
        average_throughput: 3_000_000.0,
        data_points: 100,
    }
}

fn region_of(label: &RegionLabel) -> Region {
    Region {
        latitude: 37.77,
        longitude: -122.42,
        radius: 1_000.0,
        country: label.country.clone(),
        city: label.city.clone(),
    }
}

fn register(network: &DepinNetwork, id: &str) {
    network
        .register_device(id, DeviceType::Hotspot, Location::new(37.7790, -122.4180, 4.0), "alice")
        .unwrap();
}

#[test]
fn test_first_submission_reward_matches_reference() {
    let (network, _clock, _ledger) = setup();
    register(&network, "hs-1");
    let reward = network
        .submit_telemetry("hs-1", &telemetry(-65, 45, 1_200_000, 0.95))
        .unwrap();
    assert_eq!(reward, 2223);
    assert_eq!(network.device("hs-1").unwrap().total_rewards_earned, 2223);
}

#[test]
fn test_each_record_migrates_exactly_once() {
    let (network, clock, ledger) = setup();
    register(&network, "hs-1");
    register(&network, "hs-2");
    network.submit_telemetry("hs-1", &telemetry(-60, 20, 5_000_000, 0.99)).unwrap();
    network.submit_telemetry("hs-2", &telemetry(-70, 60, 2_000_000, 0.97)).unwrap();

    clock.advance(Duration::minutes(5));
    let report = match network.run_migration() {
        RunOutcome::Completed(report) => report,
        other => panic!("expected a completed run, got {:?}", other),
    };
    assert_eq!(report.records, 2);
    assert_eq!(report.aggregates, 1);
    assert_eq!(report.result.success_count, 1);
    assert_eq!(ledger.aggregate_count(), 1);

    // Nothing new: the second run creates no aggregate.
    clock.advance(Duration::minutes(5));
    assert_eq!(network.run_migration(), RunOutcome::Skipped);
    assert_eq!(ledger.aggregate_count(), 1);

    let stored = network.aggregates(&sf(), t0(), t0() + Duration::days(1));
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].metrics.device_count, 2);
    assert_eq!(stored[0].metrics.data_points, 2);
}

#[test]
fn test_unavailable_ledger_keeps_aggregates_for_next_run() {
    let (network, clock, ledger) = setup();
    register(&network, "hs-1");
    network.submit_telemetry("hs-1", &telemetry(-60, 20, 5_000_000, 0.99)).unwrap();

    ledger.set_unavailable(true);
    clock.advance(Duration::minutes(1));
    match network.run_migration() {
        RunOutcome::Completed(report) => {
            assert_eq!(report.result.failure_count, 1);
            assert_eq!(report.pending, 1);
        }
        other => panic!("expected a completed run, got {:?}", other),
    }
    assert_eq!(network.pending_aggregates(), 1);

    ledger.set_unavailable(false);
    clock.advance(Duration::minutes(1));
    match network.run_migration() {
        RunOutcome::Completed(report) => {
            assert_eq!(report.retried, 1);
            assert_eq!(report.result.success_count, 1);
            assert_eq!(report.pending, 0);
        }
        other => panic!("expected a completed run, got {:?}", other),
    }
    assert_eq!(ledger.aggregate_count(), 1);
}

#[test]
fn test_transient_failure_is_retried_within_run() {
    let (network, clock, ledger) = setup();
    register(&network, "hs-1");
    network.submit_telemetry("hs-1", &telemetry(-60, 20, 5_000_000, 0.99)).unwrap();

    ledger.fail_next(1);
    clock.advance(Duration::minutes(1));
    match network.run_migration() {
        RunOutcome::Completed(report) => {
            let item = &report.result.per_item_results[0];
            assert!(item.succeeded());
            assert_eq!(item.attempts, 2);
        }
        other => panic!("expected a completed run, got {:?}", other),
    }
}

#[test]
fn test_rollup_across_regions_is_rejected() {
    let (network, clock, _ledger) = setup();
    register(&network, "hs-1");
    network
        .register_device("hs-oak", DeviceType::Router, Location::new(37.8044, -122.2712, 4.0), "bob")
        .unwrap();
    network.submit_telemetry("hs-1", &telemetry(-60, 20, 5_000_000, 0.99)).unwrap();
    let mut oakland = telemetry(-75, 80, 1_000_000, 0.9);
    oakland.location = Location::new(37.8044, -122.2712, 4.0);
    network.submit_telemetry("hs-oak", &oakland).unwrap();

    clock.advance(Duration::minutes(1));
    network.run_migration();

    let end = t0() + Duration::days(1);
    let mut mixed = network.aggregates(&sf(), t0(), end);
    mixed.extend(network.aggregates(&RegionLabel::new("US", "Oakland"), t0(), end));
    assert_eq!(mixed.len(), 2);
    assert!(matches!(rollup(&mixed), Err(CoreError::RegionMismatch { .. })));
}

#[test]
fn test_agreement_lifecycle_and_expiry() {
    let (network, clock, ledger) = setup();
    let agreement = network
        .create_roaming_agreement(NewAgreement {
            partner_id: "carrier-x".to_string(),
            region: region_of(&sf()),
            terms: terms(15.0, 1),
            network_data: snapshot(),
        })
        .unwrap();

    assert!(matches!(
        network.execute_agreement(&agreement.id),
        Err(CoreError::InvalidState { .. })
    ));

    network.activate_agreement(&agreement.id).unwrap();
    let before = network.agreement(&agreement.id).unwrap().last_execution_time;
    let revenue = network.execute_agreement(&agreement.id).unwrap();
    let after = network.agreement(&agreement.id).unwrap().last_execution_time;
    assert!(after > before);
    assert!((revenue - 10.0 * 100.0 * 0.9 * 2.0).abs() < 1e-9);
    assert_eq!(network.get_active_agreements().len(), 1);

    clock.advance(Duration::days(2));
    assert!(network.get_active_agreements().is_empty());
    let current = network.agreement(&agreement.id).unwrap();
    assert_eq!(current.status_at(clock_now(&clock)), LifecycleStatus::Expired);

    // Ledger saw create, activate and execute.
    assert_eq!(ledger.agreement_records().len(), 3);
}

#[test]
fn test_terminated_agreement_cannot_be_terminated_again() {
    let (network, _clock, _ledger) = setup();
    let agreement = network
        .create_roaming_agreement(NewAgreement {
            partner_id: "carrier-y".to_string(),
            region: region_of(&sf()),
            terms: terms(10.0, 30),
            network_data: snapshot(),
        })
        .unwrap();
    network.activate_agreement(&agreement.id).unwrap();
    let terminated = network.terminate_agreement(&agreement.id).unwrap();
    assert_eq!(terminated.status, LifecycleStatus::Terminated);
    assert!(terminated.termination_time.is_some());

    let err = network.terminate_agreement(&agreement.id).unwrap_err();
    assert!(matches!(err, CoreError::InvalidState { ref id, .. } if id == &agreement.id));
    assert_eq!(network.agreement_history(&agreement.id).unwrap().len(), 3);
}

#[test]
fn test_revenue_sharing_reference_values() {
    let (network, _clock, _ledger) = setup();
    let agreement = network
        .create_roaming_agreement(NewAgreement {
            partner_id: "carrier-z".to_string(),
            region: region_of(&sf()),
            terms: terms(15.0, 30),
            network_data: snapshot(),
        })
        .unwrap();

    let result = network
        .calculate_revenue_sharing(
            &agreement.id,
            &DataUsage {
                data_usage_mb: 1_000.0,
                cost_per_mb: 0.01,
            },
        )
        .unwrap();
    assert!((result.total_revenue - 10.0).abs() < 1e-12);
    assert!((result.shared_revenue - 1.5).abs() < 1e-12);

    assert!(matches!(
        network.calculate_revenue_sharing("agr-404", &DataUsage { data_usage_mb: 1.0, cost_per_mb: 1.0 }),
        Err(CoreError::NotFound { kind: EntityKind::Agreement, .. })
    ));
}

#[test]
fn test_records_serialize_in_wire_shape() {
    let (network, _clock, _ledger) = setup();
    let contract = network
        .create_infrastructure_contract(NewContract {
            partner_id: "towerco".to_string(),
            contract_type: ContractType::CoLocation,
            terms: ContractTerms {
                duration: 30,
                cost: 500.0,
                cost_unit: CostUnit::PerMonth,
                sla: ServiceLevel {
                    uptime_guarantee: 0.99,
                    max_response_time_hours: 8,
                    penalty_rate: 2.0,
                },
                payment_terms: PaymentTerms {
                    frequency: PaymentFrequency::Quarterly,
                    net_days: 45,
                    currency: "EUR".to_string(),
                },
            },
            network_requirements: NetworkRequirements {
                minimum_quality: 0.7,
                coverage_area: 1_000.0,
                uptime_requirement: 0.95,
                bandwidth_requirement_mbps: 100.0,
                latency_requirement_ms: 50.0,
            },
        })
        .unwrap();

    let json = serde_json::to_value(&contract).unwrap();
    assert_eq!(json["contractType"], "CO_LOCATION");
    assert_eq!(json["status"], "PENDING");
    assert_eq!(json["partnerId"], "towerco");
    assert!(json.get("networkRequirements").is_some());
}

#[test]
fn test_events_arrive_in_order() {
    let (network, clock, _ledger) = setup();
    let listener = Arc::new(QueueListener::new());
    network.subscribe(listener.clone());

    register(&network, "hs-1");
    network.submit_telemetry("hs-1", &telemetry(-60, 20, 5_000_000, 0.99)).unwrap();
    network.toggle_device_status("alice", "hs-1").unwrap();
    assert!(matches!(
        network.submit_telemetry("hs-1", &telemetry(-60, 20, 5_000_000, 0.99)),
        Err(CoreError::InactiveDevice { .. })
    ));
    clock.advance(Duration::minutes(1));
    network.run_migration();

    let kinds: Vec<&'static str> = listener
        .drain()
        .iter()
        .map(|e| match e {
            NetworkEvent::DeviceRegistered { .. } => "registered",
            NetworkEvent::TelemetryAccepted { .. } => "accepted",
            NetworkEvent::TelemetryRejected { .. } => "rejected",
            NetworkEvent::MigrationCompleted { .. } => "migrated",
            NetworkEvent::AgreementChanged { .. } => "agreement",
            NetworkEvent::ContractChanged { .. } => "contract",
        })
        .collect();
    assert_eq!(kinds, vec!["registered", "accepted", "rejected", "migrated"]);
}

fn clock_now(clock: &ManualClock) -> DateTime<Utc> {
    use depinfinity_core::Clock;
    clock.now()
}
