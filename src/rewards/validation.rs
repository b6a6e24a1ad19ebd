//! Identifier and submission validation.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{CoreError, CoreResult};
use crate::model::{Location, NetworkQualityData};

/// Device ids double as account seeds on the public layer, which caps them at
/// 32 bytes.
pub const MAX_DEVICE_ID_LEN: usize = 32;
pub const MAX_PARTNER_ID_LEN: usize = 64;

lazy_static! {
    /// Identifier alphabet shared by devices, owners and partners.
    static ref ID_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9_.:\-]+$").unwrap();
}

fn validate_identifier(id: &str, what: &str, max_len: usize) -> CoreResult<()> {
    if id.is_empty() {
        return Err(CoreError::validation(id, format!("{} id must not be empty", what)));
    }
    if id.len() > max_len {
        return Err(CoreError::validation(
            id,
            format!("{} id is {} bytes, max {}", what, id.len(), max_len),
        ));
    }
    if !ID_PATTERN.is_match(id) {
        return Err(CoreError::validation(
            id,
            format!("{} id may only contain [A-Za-z0-9_.:-]", what),
        ));
    }
    Ok(())
}

pub fn validate_device_id(id: &str) -> CoreResult<()> {
    validate_identifier(id, "device", MAX_DEVICE_ID_LEN)
}

pub fn validate_owner_id(id: &str) -> CoreResult<()> {
    validate_identifier(id, "owner", MAX_PARTNER_ID_LEN)
}

pub fn validate_partner_id(id: &str) -> CoreResult<()> {
    validate_identifier(id, "partner", MAX_PARTNER_ID_LEN)
}

pub fn validate_location(id: &str, location: &Location) -> CoreResult<()> {
    if location.is_valid() {
        Ok(())
    } else {
        Err(CoreError::validation(
            id,
            format!(
                "location ({}, {}) is not a valid coordinate",
                location.latitude, location.longitude
            ),
        ))
    }
}

pub fn validate_telemetry(device_id: &str, data: &NetworkQualityData) -> CoreResult<()> {
    data.check_ranges()
        .map_err(|reason| CoreError::validation(device_id, reason))
}
