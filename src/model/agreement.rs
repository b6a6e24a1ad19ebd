//! Roaming agreements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::aggregate::{Region, RegionalAggregate};
use super::lifecycle::{check_duration, is_past_duration, observed_status, LifecycleStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgreementTerms {
    pub data_sharing: bool,
    pub infrastructure_access: bool,
    /// Percent of revenue shared with the partner, in [0, 100].
    pub revenue_sharing: f64,
    /// Days, > 0.
    pub duration: u32,
    /// In [0, 1].
    pub minimum_quality: f64,
    /// Square meters, > 0.
    pub coverage_area: f64,
    pub performance_metrics: Vec<String>,
}

impl AgreementTerms {
    /// Returns every violated constraint, joined; `Ok` when the terms are usable.
    pub fn check(&self) -> Result<(), String> {
        let mut problems = Vec::new();
        if !self.revenue_sharing.is_finite() || !(0.0..=100.0).contains(&self.revenue_sharing) {
            problems.push(format!("revenueSharing {} outside [0, 100]", self.revenue_sharing));
        }
        if let Err(problem) = check_duration(self.duration) {
            problems.push(problem);
        }
        if !self.minimum_quality.is_finite() || !(0.0..=1.0).contains(&self.minimum_quality) {
            problems.push(format!("minimumQuality {} outside [0, 1]", self.minimum_quality));
        }
        if !(self.coverage_area.is_finite() && self.coverage_area > 0.0) {
            problems.push(format!("coverageArea {} must be > 0", self.coverage_area));
        }
        if self.performance_metrics.is_empty() {
            problems.push("performanceMetrics must not be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems.join("; "))
        }
    }
}

/// Network conditions captured when an agreement is created.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDataSnapshot {
    pub device_count: u64,
    pub average_quality: f64,
    pub average_signal_strength: f64,
    pub average_latency: f64,
    pub average_throughput: f64,
    pub data_points: u64,
}

impl NetworkDataSnapshot {
    pub fn from_aggregate(aggregate: &RegionalAggregate) -> Self {
        let m = &aggregate.metrics;
        Self {
            device_count: m.device_count,
            average_quality: m.quality_score,
            average_signal_strength: m.average_signal_strength,
            average_latency: m.average_latency,
            average_throughput: m.average_throughput,
            data_points: m.data_points,
        }
    }
}

/// One immutable version of a roaming agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoamingAgreement {
    pub id: String,
    pub partner_id: String,
    pub region: Region,
    pub terms: AgreementTerms,
    pub network_data: NetworkDataSnapshot,
    pub status: LifecycleStatus,
    pub creation_time: DateTime<Utc>,
    pub last_execution_time: DateTime<Utc>,
    pub termination_time: Option<DateTime<Utc>>,
    pub version: u64,
}

impl RoamingAgreement {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_past_duration(self.creation_time, self.terms.duration, now)
    }

    /// Status with expiry applied; never trust `status` alone.
    pub fn status_at(&self, now: DateTime<Utc>) -> LifecycleStatus {
        observed_status(self.status, self.creation_time, self.terms.duration, now)
    }
}
