//! Settlement calculations.
//!
//! Pure functions over agreement and contract versions. Nothing here touches a
//! store; lookups by id happen in the caller, which reports `NotFound`.

use serde::{Deserialize, Serialize};

use crate::model::{ContractType, InfrastructureContract, RoamingAgreement};

/// Revenue generated per contributing device at perfect quality, per 1000 m².
pub const REVENUE_PER_DEVICE: f64 = 100.0;

/// Coverage area normalization: amounts scale with `coverage_area / 1000`.
pub const COVERAGE_UNIT_M2: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUsage {
    pub data_usage_mb: f64,
    pub cost_per_mb: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSharingResult {
    pub total_revenue: f64,
    pub shared_revenue: f64,
}

/// Metered usage of shared infrastructure over a settlement period. Only the
/// figure matching the contract type is billed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureUsage {
    pub tower_hours: f64,
    pub fiber_gb: f64,
    pub spectrum_mhz_hours: f64,
    pub backhaul_gb: f64,
    pub colocation_units: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureCostResult {
    pub base_cost: f64,
    pub usage_cost: f64,
    pub total_cost: f64,
}

/// Per-unit usage rate for a contract type.
pub fn usage_rate(contract_type: ContractType) -> f64 {
    match contract_type {
        ContractType::TowerSharing => 0.10,
        ContractType::FiberAccess => 0.05,
        ContractType::SpectrumSharing => 0.20,
        ContractType::BackhaulSharing => 0.15,
        ContractType::CoLocation => 0.08,
    }
}

/// The usage figure billed for a contract type.
pub fn billed_quantity(contract_type: ContractType, usage: &InfrastructureUsage) -> f64 {
    match contract_type {
        ContractType::TowerSharing => usage.tower_hours,
        ContractType::FiberAccess => usage.fiber_gb,
        ContractType::SpectrumSharing => usage.spectrum_mhz_hours,
        ContractType::BackhaulSharing => usage.backhaul_gb,
        ContractType::CoLocation => usage.colocation_units,
    }
}

/// Revenue reported when an agreement is executed.
pub fn agreement_revenue(agreement: &RoamingAgreement) -> f64 {
    agreement.network_data.device_count as f64
        * REVENUE_PER_DEVICE
        * agreement.network_data.average_quality
        * (agreement.terms.coverage_area / COVERAGE_UNIT_M2)
}

/// Cost reported when a contract is executed.
pub fn infrastructure_cost(contract: &InfrastructureContract) -> f64 {
    contract.terms.cost
        * contract.network_requirements.minimum_quality
        * (contract.network_requirements.coverage_area / COVERAGE_UNIT_M2)
}

pub fn revenue_sharing(agreement: &RoamingAgreement, usage: &DataUsage) -> RevenueSharingResult {
    let total_revenue = usage.data_usage_mb * usage.cost_per_mb;
    let shared_revenue = total_revenue * agreement.terms.revenue_sharing / 100.0;
    RevenueSharingResult {
        total_revenue,
        shared_revenue,
    }
}

/// Base cost is the contract's per-period `terms.cost`; usage is billed at the
/// contract type's rate.
pub fn usage_cost(
    contract: &InfrastructureContract,
    usage: &InfrastructureUsage,
) -> InfrastructureCostResult {
    let base_cost = contract.terms.cost;
    let usage_cost =
        billed_quantity(contract.contract_type, usage) * usage_rate(contract.contract_type);
    InfrastructureCostResult {
        base_cost,
        usage_cost,
        total_cost: base_cost + usage_cost,
    }
}
