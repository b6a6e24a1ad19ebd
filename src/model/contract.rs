//! Infrastructure-sharing contracts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lifecycle::{check_duration, is_past_duration, observed_status, LifecycleStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractType {
    TowerSharing,
    FiberAccess,
    SpectrumSharing,
    BackhaulSharing,
    CoLocation,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::TowerSharing => "TOWER_SHARING",
            ContractType::FiberAccess => "FIBER_ACCESS",
            ContractType::SpectrumSharing => "SPECTRUM_SHARING",
            ContractType::BackhaulSharing => "BACKHAUL_SHARING",
            ContractType::CoLocation => "CO_LOCATION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostUnit {
    PerMonth,
    PerGb,
    PerMhz,
    PerUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceLevel {
    /// Guaranteed uptime fraction in [0, 1].
    pub uptime_guarantee: f64,
    pub max_response_time_hours: u32,
    /// Percent of the period cost credited per SLA breach.
    pub penalty_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentFrequency {
    Monthly,
    Quarterly,
    Annually,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTerms {
    pub frequency: PaymentFrequency,
    pub net_days: u32,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractTerms {
    /// Days, > 0.
    pub duration: u32,
    /// Base cost per period, >= 0.
    pub cost: f64,
    pub cost_unit: CostUnit,
    pub sla: ServiceLevel,
    pub payment_terms: PaymentTerms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequirements {
    /// In [0, 1].
    pub minimum_quality: f64,
    /// Square meters, > 0.
    pub coverage_area: f64,
    /// In [0, 1].
    pub uptime_requirement: f64,
    pub bandwidth_requirement_mbps: f64,
    pub latency_requirement_ms: f64,
}

fn in_unit_range(v: f64) -> bool {
    v.is_finite() && (0.0..=1.0).contains(&v)
}

/// Checks terms and requirements together; every violation is reported.
pub fn check_contract_terms(
    terms: &ContractTerms,
    requirements: &NetworkRequirements,
) -> Result<(), String> {
    let mut problems = Vec::new();
    if let Err(problem) = check_duration(terms.duration) {
        problems.push(problem);
    }
    if !(terms.cost.is_finite() && terms.cost >= 0.0) {
        problems.push(format!("cost {} must be >= 0", terms.cost));
    }
    if !in_unit_range(terms.sla.uptime_guarantee) {
        problems.push(format!(
            "sla.uptimeGuarantee {} outside [0, 1]",
            terms.sla.uptime_guarantee
        ));
    }
    if !in_unit_range(requirements.minimum_quality) {
        problems.push(format!(
            "minimumQuality {} outside [0, 1]",
            requirements.minimum_quality
        ));
    }
    if !(requirements.coverage_area.is_finite() && requirements.coverage_area > 0.0) {
        problems.push(format!(
            "coverageArea {} must be > 0",
            requirements.coverage_area
        ));
    }
    if !in_unit_range(requirements.uptime_requirement) {
        problems.push(format!(
            "uptimeRequirement {} outside [0, 1]",
            requirements.uptime_requirement
        ));
    }
    if !(requirements.bandwidth_requirement_mbps >= 0.0) {
        problems.push("bandwidthRequirementMbps must be >= 0".to_string());
    }
    if !(requirements.latency_requirement_ms >= 0.0) {
        problems.push("latencyRequirementMs must be >= 0".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems.join("; "))
    }
}

/// One immutable version of an infrastructure contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureContract {
    pub id: String,
    pub partner_id: String,
    pub contract_type: ContractType,
    pub terms: ContractTerms,
    pub network_requirements: NetworkRequirements,
    pub status: LifecycleStatus,
    pub creation_time: DateTime<Utc>,
    pub last_execution_time: DateTime<Utc>,
    pub last_settlement_time: Option<DateTime<Utc>>,
    pub termination_time: Option<DateTime<Utc>>,
    pub version: u64,
}

impl InfrastructureContract {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_past_duration(self.creation_time, self.terms.duration, now)
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> LifecycleStatus {
        observed_status(self.status, self.creation_time, self.terms.duration, now)
    }
}
