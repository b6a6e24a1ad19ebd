//! Deterministic end-to-end simulation of the network.
//!
//! Usage: `depin-sim [config.json]`. Without a file, configuration comes from
//! `DEPIN_*` environment variables. Time is driven by a manual clock, so a
//! simulated day finishes instantly.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};

use depinfinity_core::agreements::NewContract;
use depinfinity_core::bridge::RunOutcome;
use depinfinity_core::model::{
    AgreementTerms, ContractTerms, ContractType, CostUnit, DeviceType, Location, NetworkQualityData,
    NetworkRequirements, PaymentFrequency, PaymentTerms, RegionLabel, ServiceLevel,
};
use depinfinity_core::settlement::{DataUsage, InfrastructureUsage};
use depinfinity_core::{init_logger, Clock, DepinNetwork, ManualClock, NetworkConfig, UuidIdGenerator};

const SITES: [(&str, f64, f64); 3] = [
    ("sf", 37.7749, -122.4194),
    ("nyc", 40.7128, -74.0060),
    ("austin", 30.2672, -97.7431),
];
const DEVICES_PER_SITE: usize = 4;
const HOURS: i64 = 24;

fn load_config() -> Result<NetworkConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config file {}", path))?;
            Ok(NetworkConfig::from_json_str(&raw)?)
        }
        None => Ok(NetworkConfig::from_env()?),
    }
}

fn device_type(i: usize) -> DeviceType {
    match i % 3 {
        0 => DeviceType::Hotspot,
        1 => DeviceType::Router,
        _ => DeviceType::Smartphone,
    }
}

/// Telemetry that drifts by device and hour so regions differ.
fn reading(site: usize, device: usize, hour: i64, location: Location) -> NetworkQualityData {
    let wobble = ((hour as usize + device * 7 + site * 13) % 10) as i32;
    NetworkQualityData {
        signal_strength: -45 - (site as i32) * 15 - wobble,
        latency: 15 + (site as u32) * 30 + wobble as u32 * 3,
        throughput: 12_000_000 - (site as u64) * 4_000_000 - wobble as u64 * 100_000,
        availability: 0.999 - site as f64 * 0.04 - wobble as f64 * 0.002,
        location,
    }
}

fn main() -> Result<()> {
    init_logger();

    let mut config = load_config()?;
    config.bridge.migration_interval_hours = config.bridge.migration_interval_hours.min(6);
    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let (network, ledger) = DepinNetwork::simulated(config, clock.clone(), Arc::new(UuidIdGenerator))?;

    let mut devices = Vec::new();
    for (s, (name, lat, lon)) in SITES.iter().enumerate() {
        for d in 0..DEVICES_PER_SITE {
            let id = format!("{}-{}", name, d);
            let location = Location::new(lat + d as f64 * 0.001, lon - d as f64 * 0.001, 5.0);
            network.register_device(&id, device_type(d), location, &format!("owner-{}", name))?;
            devices.push((s, d, id, location));
        }
    }

    let mut regions: Vec<RegionLabel> = Vec::new();
    let interval = network.config().bridge.migration_interval_hours as i64;
    for hour in 0..HOURS {
        for (s, d, id, location) in &devices {
            network.submit_telemetry(id, &reading(*s, *d, hour, *location))?;
        }
        clock.advance(Duration::hours(1));
        if (hour + 1) % interval == 0 {
            if let RunOutcome::Completed(report) = network.run_migration() {
                println!(
                    "run {}: {} records -> {} aggregates, {} migrated, {} pending",
                    report.run_id,
                    report.records,
                    report.aggregates,
                    report.result.success_count,
                    report.pending
                );
                for item in &report.result.per_item_results {
                    if !regions.contains(&item.region) {
                        regions.push(item.region.clone());
                    }
                }
            }
        }
    }

    let first_region = regions.first().context("no region was migrated")?;
    let agreement = network.create_roaming_agreement_for_region(
        "carrier-alpha",
        first_region,
        AgreementTerms {
            data_sharing: true,
            infrastructure_access: true,
            revenue_sharing: 12.5,
            duration: 30,
            minimum_quality: 0.7,
            coverage_area: 5_000.0,
            performance_metrics: vec!["latency".to_string(), "availability".to_string()],
        },
    )?;
    network.activate_agreement(&agreement.id)?;
    clock.advance(Duration::hours(1));
    let revenue = network.execute_agreement(&agreement.id)?;
    let sharing = network.calculate_revenue_sharing(
        &agreement.id,
        &DataUsage {
            data_usage_mb: 2_048.0,
            cost_per_mb: 0.02,
        },
    )?;

    let contract = network.create_infrastructure_contract(NewContract {
        partner_id: "towerco".to_string(),
        contract_type: ContractType::TowerSharing,
        terms: ContractTerms {
            duration: 365,
            cost: 2_500.0,
            cost_unit: CostUnit::PerMonth,
            sla: ServiceLevel {
                uptime_guarantee: 0.995,
                max_response_time_hours: 4,
                penalty_rate: 5.0,
            },
            payment_terms: PaymentTerms {
                frequency: PaymentFrequency::Monthly,
                net_days: 30,
                currency: "USD".to_string(),
            },
        },
        network_requirements: NetworkRequirements {
            minimum_quality: 0.8,
            coverage_area: 10_000.0,
            uptime_requirement: 0.99,
            bandwidth_requirement_mbps: 1_000.0,
            latency_requirement_ms: 20.0,
        },
    })?;
    network.activate_contract(&contract.id)?;
    clock.advance(Duration::days(30));
    let settlement = network.settle_contract(
        &contract.id,
        InfrastructureUsage {
            tower_hours: 720.0,
            ..InfrastructureUsage::default()
        },
    )?;

    println!("agreement {} execution revenue: {:.2}", agreement.id, revenue);
    println!("revenue sharing: {}", serde_json::to_string(&sharing)?);
    println!("contract {} settlement: {}", contract.id, serde_json::to_string(&settlement)?);
    println!("ledger aggregates: {}", ledger.aggregate_count());
    println!(
        "program state: {}",
        serde_json::to_string_pretty(&network.program_state())?
    );

    let end = clock.now();
    for region in &regions {
        let insights = network.get_network_insights(region, start, end);
        println!("{}", serde_json::to_string_pretty(&insights)?);
    }

    Ok(())
}
