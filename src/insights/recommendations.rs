//! Rule-based recommendations from average quality.
//!
//! Rules are independent: a very high average yields both the partnership
//! and the cost-optimization recommendation.

use serde::{Deserialize, Serialize};

use crate::model::RegionalAggregate;

pub const INVESTMENT_BELOW: f64 = 0.6;
pub const PARTNERSHIP_ABOVE: f64 = 0.8;
pub const COST_OPTIMIZATION_ABOVE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    InfrastructureInvestment,
    PartnershipOpportunity,
    CostOptimization,
}

impl Recommendation {
    pub fn description(&self) -> &'static str {
        match self {
            Recommendation::InfrastructureInvestment => {
                "Network quality is below target; invest in additional infrastructure"
            }
            Recommendation::PartnershipOpportunity => {
                "Network quality is strong; pursue roaming partnerships"
            }
            Recommendation::CostOptimization => {
                "Network quality exceeds requirements; review infrastructure spend"
            }
        }
    }
}

/// Unweighted mean of the aggregates' quality scores, or `None` when empty.
pub fn average_quality(aggregates: &[RegionalAggregate]) -> Option<f64> {
    if aggregates.is_empty() {
        return None;
    }
    Some(aggregates.iter().map(|a| a.metrics.quality_score).sum::<f64>() / aggregates.len() as f64)
}

pub fn recommendations_for(average_quality: f64) -> Vec<Recommendation> {
    let mut out = Vec::new();
    if average_quality < INVESTMENT_BELOW {
        out.push(Recommendation::InfrastructureInvestment);
    }
    if average_quality > PARTNERSHIP_ABOVE {
        out.push(Recommendation::PartnershipOpportunity);
    }
    if average_quality > COST_OPTIMIZATION_ABOVE {
        out.push(Recommendation::CostOptimization);
    }
    out
}

/// No aggregates, no recommendations.
pub fn recommendations(aggregates: &[RegionalAggregate]) -> Vec<Recommendation> {
    average_quality(aggregates)
        .map(recommendations_for)
        .unwrap_or_default()
}
