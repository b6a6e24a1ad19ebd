//! Scoring formulas.
//!
//! Two distinct formulas live here and must not be merged:
//! [`calculate_reward`] prices one submission in tokens, while
//! [`quality_score`] normalizes measurements into [0, 1] for aggregates and
//! insights.

use crate::model::{NetworkQualityData, TelemetryRecord};

pub fn signal_multiplier(signal_strength: i32) -> f64 {
    if signal_strength > -70 {
        1.5
    } else if signal_strength > -80 {
        0.8
    } else {
        0.3
    }
}

pub fn latency_multiplier(latency_ms: u32) -> f64 {
    if latency_ms < 50 {
        1.2
    } else if latency_ms < 100 {
        1.0
    } else {
        0.6
    }
}

pub fn throughput_multiplier(throughput_bps: u64) -> f64 {
    if throughput_bps > 1_000_000 {
        1.3
    } else if throughput_bps > 500_000 {
        1.0
    } else {
        0.7
    }
}

/// Grows without bound with the number of prior accepted submissions.
pub fn uptime_bonus(total_uptime_before: u64) -> f64 {
    1.0 + (total_uptime_before as f64 / 1000.0) * 0.5
}

/// Token reward for one submission, floored to a whole token.
///
/// `total_uptime_before` is the device's submission count before this one.
pub fn calculate_reward(
    base_reward: u64,
    data: &NetworkQualityData,
    total_uptime_before: u64,
) -> u64 {
    let reward = base_reward as f64
        * signal_multiplier(data.signal_strength)
        * latency_multiplier(data.latency)
        * throughput_multiplier(data.throughput)
        * data.availability
        * uptime_bonus(total_uptime_before);

    if reward.is_finite() && reward > 0.0 {
        reward.floor() as u64
    } else {
        0
    }
}

fn signal_tier(dbm: f64) -> f64 {
    if dbm >= -60.0 {
        1.0
    } else if dbm >= -70.0 {
        0.8
    } else if dbm >= -80.0 {
        0.6
    } else if dbm >= -90.0 {
        0.4
    } else {
        0.2
    }
}

fn latency_tier(ms: f64) -> f64 {
    if ms <= 20.0 {
        1.0
    } else if ms <= 50.0 {
        0.8
    } else if ms <= 100.0 {
        0.6
    } else if ms <= 200.0 {
        0.4
    } else {
        0.2
    }
}

fn throughput_tier(bps: f64) -> f64 {
    if bps >= 10_000_000.0 {
        1.0
    } else if bps >= 5_000_000.0 {
        0.8
    } else if bps >= 1_000_000.0 {
        0.6
    } else if bps >= 500_000.0 {
        0.4
    } else {
        0.2
    }
}

/// Normalized quality in [0, 1]: the mean of four tiered components.
pub fn quality_score(signal_dbm: f64, latency_ms: f64, throughput_bps: f64, availability: f64) -> f64 {
    let availability = if availability.is_finite() {
        availability.clamp(0.0, 1.0)
    } else {
        0.0
    };
    (signal_tier(signal_dbm) + latency_tier(latency_ms) + throughput_tier(throughput_bps) + availability)
        / 4.0
}

pub fn record_quality_score(record: &TelemetryRecord) -> f64 {
    quality_score(
        f64::from(record.signal_strength),
        f64::from(record.latency),
        record.throughput as f64,
        record.availability,
    )
}
