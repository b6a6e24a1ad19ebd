//! Devices and the telemetry they submit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceType {
    Smartphone,
    Router,
    IoTDevice,
    Hotspot,
}

/// A registered device and its cumulative reward state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub owner: String,
    pub device_type: DeviceType,
    pub location: Location,
    pub is_active: bool,
    /// Number of accepted submissions.
    pub total_uptime: u64,
    pub total_rewards_earned: u64,
    pub last_activity: DateTime<Utc>,
}

/// Measurement payload as sent by a device, before it is stamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkQualityData {
    /// dBm, in [-120, 0].
    pub signal_strength: i32,
    /// Milliseconds.
    pub latency: u32,
    /// Bits per second.
    pub throughput: u64,
    /// Fraction in [0, 1].
    pub availability: f64,
    pub location: Location,
}

impl NetworkQualityData {
    /// Range check. Returns the first violated constraint.
    pub fn check_ranges(&self) -> Result<(), String> {
        if !(-120..=0).contains(&self.signal_strength) {
            return Err(format!(
                "signalStrength {} outside [-120, 0]",
                self.signal_strength
            ));
        }
        if !self.availability.is_finite() || !(0.0..=1.0).contains(&self.availability) {
            return Err(format!(
                "availability {} outside [0, 1]",
                self.availability
            ));
        }
        if !self.location.is_valid() {
            return Err(format!(
                "location ({}, {}) is not a valid coordinate",
                self.location.latitude, self.location.longitude
            ));
        }
        Ok(())
    }
}

/// One accepted submission. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryRecord {
    pub device_id: String,
    pub signal_strength: i32,
    pub latency: u32,
    pub throughput: u64,
    pub availability: f64,
    pub location: Location,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryRecord {
    pub fn from_quality_data(
        device_id: &str,
        data: &NetworkQualityData,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id: device_id.to_string(),
            signal_strength: data.signal_strength,
            latency: data.latency,
            throughput: data.throughput,
            availability: data.availability,
            location: data.location,
            timestamp,
        }
    }
}
