//! Device registry and reward accounting.
//!
//! All mutations are serialized through the program-state lock so the vault,
//! the distributed total and each device's counters move together.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::RewardConfig;
use crate::error::{CoreError, CoreResult, EntityKind};
use crate::logging::structured::LogContext;
use crate::model::{Device, DeviceType, Location, NetworkQualityData, TelemetryRecord};
use crate::runtime::Clock;
use crate::storage::Repository;
use crate::{log_debug, log_info, log_warn};

use super::scoring::calculate_reward;
use super::validation::{validate_device_id, validate_location, validate_owner_id, validate_telemetry};

/// Program-wide counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramState {
    pub total_devices: u64,
    pub total_rewards_distributed: u64,
    /// May go negative only when the vault floor is disabled.
    pub reward_vault: i64,
    pub is_active: bool,
}

/// What an accepted submission produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub reward: u64,
    pub record: TelemetryRecord,
    pub device: Device,
}

pub struct RewardEngine {
    config: RewardConfig,
    clock: Arc<dyn Clock>,
    devices: Arc<dyn Repository<Device>>,
    program: Mutex<ProgramState>,
}

impl RewardEngine {
    pub fn new(
        config: RewardConfig,
        clock: Arc<dyn Clock>,
        devices: Arc<dyn Repository<Device>>,
    ) -> Self {
        let program = ProgramState {
            total_devices: devices.len() as u64,
            total_rewards_distributed: 0,
            reward_vault: config.initial_vault,
            is_active: true,
        };
        Self {
            config,
            clock,
            devices,
            program: Mutex::new(program),
        }
    }

    pub fn program_state(&self) -> ProgramState {
        self.program.lock().clone()
    }

    pub fn device(&self, id: &str) -> Option<Device> {
        self.devices.get(id)
    }

    pub fn devices(&self) -> Vec<Device> {
        self.devices.list()
    }

    pub fn pause(&self) {
        self.program.lock().is_active = false;
        log_info!(LogContext::new("program"), "PROGRAM_PAUSED");
    }

    pub fn resume(&self) {
        self.program.lock().is_active = true;
        log_info!(LogContext::new("program"), "PROGRAM_RESUMED");
    }

    pub fn register_device(
        &self,
        id: &str,
        device_type: DeviceType,
        location: Location,
        owner: &str,
    ) -> CoreResult<Device> {
        let ctx = LogContext::new("register").with_item(id);
        let mut program = self.program.lock();
        if !program.is_active {
            return Err(CoreError::ProgramPaused);
        }

        validate_device_id(id)?;
        validate_owner_id(owner)?;
        validate_location(id, &location)?;
        if self.devices.contains(id) {
            return Err(CoreError::validation(id, "device id already registered"));
        }

        let device = Device {
            id: id.to_string(),
            owner: owner.to_string(),
            device_type,
            location,
            is_active: true,
            total_uptime: 0,
            total_rewards_earned: 0,
            last_activity: self.clock.now(),
        };
        self.devices.put(id, device.clone());
        program.total_devices += 1;

        log_info!(ctx, "DEVICE_REGISTERED", device_type = device_type, owner = owner);
        Ok(device)
    }

    /// Score one submission and credit the device.
    pub fn submit(&self, device_id: &str, data: &NetworkQualityData) -> CoreResult<SubmissionReceipt> {
        let ctx = LogContext::new("submit").with_item(device_id);
        let mut program = self.program.lock();
        if !program.is_active {
            return Err(CoreError::ProgramPaused);
        }

        let mut device = self
            .devices
            .get(device_id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Device, device_id))?;
        if !device.is_active {
            return Err(CoreError::InactiveDevice {
                id: device_id.to_string(),
            });
        }
        validate_telemetry(device_id, data)?;

        let reward = calculate_reward(self.config.base_reward, data, device.total_uptime);
        if self.config.enforce_vault_floor && reward as i128 > i128::from(program.reward_vault) {
            log_warn!(
                ctx,
                "REWARD_VAULT_EXHAUSTED",
                reward = reward,
                vault = program.reward_vault
            );
            return Err(CoreError::InsufficientVault {
                required: reward,
                available: program.reward_vault,
            });
        }

        let now = self.clock.now();
        device.total_uptime += 1;
        device.total_rewards_earned = device.total_rewards_earned.saturating_add(reward);
        device.last_activity = now;
        device.location = data.location;
        self.devices.put(device_id, device.clone());

        program.total_rewards_distributed = program.total_rewards_distributed.saturating_add(reward);
        program.reward_vault = program
            .reward_vault
            .saturating_sub(i64::try_from(reward).unwrap_or(i64::MAX));

        log_info!(
            ctx,
            "TELEMETRY_REWARDED",
            reward = reward,
            uptime = device.total_uptime,
            vault = program.reward_vault
        );

        Ok(SubmissionReceipt {
            reward,
            record: TelemetryRecord::from_quality_data(device_id, data, now),
            device,
        })
    }

    pub fn update_location(&self, owner: &str, device_id: &str, location: Location) -> CoreResult<Device> {
        let _program = self.program.lock();
        let mut device = self.owned_device(owner, device_id)?;
        if !device.is_active {
            return Err(CoreError::InactiveDevice {
                id: device_id.to_string(),
            });
        }
        validate_location(device_id, &location)?;

        device.location = location;
        device.last_activity = self.clock.now();
        self.devices.put(device_id, device.clone());

        log_debug!(
            LogContext::new("devices").with_item(device_id),
            "DEVICE_LOCATION_UPDATED",
            lat = location.latitude,
            lon = location.longitude
        );
        Ok(device)
    }

    /// Flip a device between active and inactive. Devices are never deleted.
    pub fn toggle_status(&self, owner: &str, device_id: &str) -> CoreResult<Device> {
        let _program = self.program.lock();
        let mut device = self.owned_device(owner, device_id)?;

        device.is_active = !device.is_active;
        device.last_activity = self.clock.now();
        self.devices.put(device_id, device.clone());

        log_info!(
            LogContext::new("devices").with_item(device_id),
            "DEVICE_STATUS_TOGGLED",
            active = device.is_active
        );
        Ok(device)
    }

    fn owned_device(&self, owner: &str, device_id: &str) -> CoreResult<Device> {
        let device = self
            .devices
            .get(device_id)
            .ok_or_else(|| CoreError::not_found(EntityKind::Device, device_id))?;
        if device.owner != owner {
            return Err(CoreError::OwnerMismatch {
                id: device_id.to_string(),
            });
        }
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ManualClock;
    use crate::storage::MemoryRepository;
    use chrono::{Duration, TimeZone, Utc};

    fn engine_with(config: RewardConfig) -> (RewardEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let engine = RewardEngine::new(config, clock.clone(), Arc::new(MemoryRepository::new()));
        (engine, clock)
    }

    fn engine() -> (RewardEngine, Arc<ManualClock>) {
        engine_with(RewardConfig::default())
    }

    fn sample() -> NetworkQualityData {
        NetworkQualityData {
            signal_strength: -65,
            latency: 45,
            throughput: 1_200_000,
            availability: 0.95,
            location: Location::new(52.52, 13.40, 8.0),
        }
    }

    fn register(engine: &RewardEngine, id: &str) -> Device {
        engine
            .register_device(id, DeviceType::Hotspot, Location::new(52.5, 13.4, 5.0), "alice")
            .unwrap()
    }

    #[test]
    fn test_submit_credits_device_and_program() {
        let (engine, clock) = engine();
        register(&engine, "dev-1");
        clock.advance(Duration::minutes(5));

        let receipt = engine.submit("dev-1", &sample()).unwrap();
        assert_eq!(receipt.reward, 2223);
        assert_eq!(receipt.device.total_uptime, 1);
        assert_eq!(receipt.device.total_rewards_earned, 2223);
        assert_eq!(receipt.device.last_activity, clock.now());
        assert_eq!(receipt.device.location, sample().location);
        assert_eq!(receipt.record.timestamp, clock.now());

        let program = engine.program_state();
        assert_eq!(program.total_devices, 1);
        assert_eq!(program.total_rewards_distributed, 2223);
        assert_eq!(program.reward_vault, 1_000_000_000 - 2223);
    }

    #[test]
    fn test_uptime_bonus_uses_count_before_submission() {
        let (engine, _) = engine();
        register(&engine, "dev-1");
        let first = engine.submit("dev-1", &sample()).unwrap().reward;
        let second = engine.submit("dev-1", &sample()).unwrap().reward;
        // Bonus after one submission is 1.0005.
        assert_eq!(first, 2223);
        assert_eq!(second, (2223.0f64 * 1.0005).floor() as u64);
    }

    #[test]
    fn test_unknown_and_inactive_devices_rejected() {
        let (engine, _) = engine();
        assert!(matches!(
            engine.submit("ghost", &sample()),
            Err(CoreError::NotFound { kind: EntityKind::Device, .. })
        ));

        register(&engine, "dev-1");
        engine.toggle_status("alice", "dev-1").unwrap();
        assert!(matches!(
            engine.submit("dev-1", &sample()),
            Err(CoreError::InactiveDevice { .. })
        ));
        assert_eq!(engine.device("dev-1").unwrap().total_uptime, 0);
    }

    #[test]
    fn test_invalid_telemetry_leaves_state_untouched() {
        let (engine, _) = engine();
        register(&engine, "dev-1");
        let mut bad = sample();
        bad.availability = 1.5;

        assert!(matches!(
            engine.submit("dev-1", &bad),
            Err(CoreError::Validation { .. })
        ));
        assert_eq!(engine.program_state().total_rewards_distributed, 0);
        assert_eq!(engine.device("dev-1").unwrap().total_uptime, 0);
    }

    #[test]
    fn test_vault_floor_enforced() {
        let (engine, _) = engine_with(RewardConfig {
            initial_vault: 1000,
            ..RewardConfig::default()
        });
        register(&engine, "dev-1");

        let err = engine.submit("dev-1", &sample()).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientVault {
                required: 2223,
                available: 1000
            }
        );
        assert_eq!(engine.program_state().reward_vault, 1000);
    }

    #[test]
    fn test_unguarded_vault_goes_negative() {
        let (engine, _) = engine_with(RewardConfig {
            initial_vault: 1000,
            enforce_vault_floor: false,
            ..RewardConfig::default()
        });
        register(&engine, "dev-1");

        engine.submit("dev-1", &sample()).unwrap();
        assert_eq!(engine.program_state().reward_vault, 1000 - 2223);
    }

    #[test]
    fn test_pause_blocks_register_and_submit() {
        let (engine, _) = engine();
        register(&engine, "dev-1");
        engine.pause();
        assert!(!engine.program_state().is_active);
        assert_eq!(
            engine.submit("dev-1", &sample()).unwrap_err(),
            CoreError::ProgramPaused
        );
        assert_eq!(
            engine
                .register_device("dev-2", DeviceType::Router, Location::new(0.0, 0.0, 1.0), "bob")
                .unwrap_err(),
            CoreError::ProgramPaused
        );

        engine.resume();
        assert!(engine.submit("dev-1", &sample()).is_ok());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let (engine, _) = engine();
        register(&engine, "dev-1");
        let err = engine
            .register_device("dev-1", DeviceType::Router, Location::new(0.0, 0.0, 1.0), "bob")
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert_eq!(engine.program_state().total_devices, 1);
    }

    #[test]
    fn test_owner_scoped_commands() {
        let (engine, clock) = engine();
        register(&engine, "dev-1");

        assert!(matches!(
            engine.toggle_status("mallory", "dev-1"),
            Err(CoreError::OwnerMismatch { .. })
        ));

        clock.advance(Duration::hours(1));
        let moved = engine
            .update_location("alice", "dev-1", Location::new(48.85, 2.35, 3.0))
            .unwrap();
        assert_eq!(moved.location.latitude, 48.85);
        assert_eq!(moved.last_activity, clock.now());

        engine.toggle_status("alice", "dev-1").unwrap();
        assert!(matches!(
            engine.update_location("alice", "dev-1", Location::new(1.0, 1.0, 1.0)),
            Err(CoreError::InactiveDevice { .. })
        ));
    }
}
