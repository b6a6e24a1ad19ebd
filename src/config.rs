//! Network configuration.
//!
//! Loaded from JSON or from environment variables with the `DEPIN_` prefix.
//! Every field has a default, so a partial document is enough.

use std::env;

use serde::{Deserialize, Serialize};

use crate::bridge::retry::{RetryPolicy, RetryStrategy};
use crate::error::{CoreError, CoreResult};
use crate::model::NamedRegion;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Reward for a perfect-multiplier submission, before bonuses.
    #[serde(default = "default_base_reward")]
    pub base_reward: u64,
    #[serde(default = "default_initial_vault")]
    pub initial_vault: i64,
    /// Reject submissions the vault cannot pay for. When false the vault is
    /// allowed to go negative.
    #[serde(default = "default_true")]
    pub enforce_vault_floor: bool,
}

fn default_base_reward() -> u64 {
    1000
}

fn default_initial_vault() -> i64 {
    1_000_000_000
}

fn default_true() -> bool {
    true
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            base_reward: default_base_reward(),
            initial_vault: default_initial_vault(),
            enforce_vault_floor: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_interval_hours")]
    pub migration_interval_hours: u64,
    /// Written into every aggregate's `source` field.
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Aggregates older than this fail the freshness integrity check.
    #[serde(default = "default_freshness_hours")]
    pub freshness_max_age_hours: u64,
    /// Cell size for locations outside every named region.
    #[serde(default = "default_grid_degrees")]
    pub region_grid_degrees: f64,
    #[serde(default)]
    pub named_regions: Vec<NamedRegion>,
    /// Unmigrated aggregates kept for later runs; the oldest are dropped past this.
    #[serde(default = "default_max_pending")]
    pub max_pending_aggregates: usize,
}

fn default_interval_hours() -> u64 {
    24
}

fn default_source_tag() -> String {
    "depin-bridge".to_string()
}

fn default_schema_version() -> u32 {
    1
}

fn default_freshness_hours() -> u64 {
    48
}

fn default_grid_degrees() -> f64 {
    0.1
}

fn default_max_pending() -> usize {
    1000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            migration_interval_hours: default_interval_hours(),
            source_tag: default_source_tag(),
            schema_version: default_schema_version(),
            retry: RetryPolicy::default(),
            freshness_max_age_hours: default_freshness_hours(),
            region_grid_degrees: default_grid_degrees(),
            named_regions: Vec::new(),
            max_pending_aggregates: default_max_pending(),
        }
    }
}

impl BridgeConfig {
    pub fn interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.migration_interval_hours as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightsConfig {
    #[serde(default = "default_chunk_size")]
    pub trend_chunk_size: usize,
}

fn default_chunk_size() -> usize {
    10
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            trend_chunk_size: default_chunk_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub reward: RewardConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub insights: InsightsConfig,
}

impl NetworkConfig {
    /// Short interval, no back-off delays, small vault. For local runs.
    pub fn development() -> Self {
        Self {
            reward: RewardConfig {
                initial_vault: 10_000_000,
                ..RewardConfig::default()
            },
            bridge: BridgeConfig {
                migration_interval_hours: 1,
                retry: RetryPolicy {
                    max_attempts: 3,
                    strategy: RetryStrategy::None,
                },
                ..BridgeConfig::default()
            },
            insights: InsightsConfig::default(),
        }
    }

    pub fn from_json_str(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CoreError::Configuration(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - DEPIN_BASE_REWARD: base reward per submission
    /// - DEPIN_INITIAL_VAULT: starting reward vault balance
    /// - DEPIN_ENFORCE_VAULT_FLOOR: reject rewards the vault cannot cover (true/false)
    /// - DEPIN_MIGRATION_INTERVAL_HOURS: hours between migration runs
    /// - DEPIN_SOURCE_TAG: source tag written into aggregates
    /// - DEPIN_MIGRATION_MAX_ATTEMPTS: attempts per migrated aggregate
    /// - DEPIN_FRESHNESS_MAX_AGE_HOURS: freshness bound for integrity checks
    /// - DEPIN_REGION_GRID_DEGREES: grid cell size for unnamed regions
    /// - DEPIN_MAX_PENDING_AGGREGATES: cap on aggregates carried between runs
    pub fn from_env() -> CoreResult<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse("DEPIN_BASE_REWARD") {
            config.reward.base_reward = v;
        }
        if let Some(v) = env_parse("DEPIN_INITIAL_VAULT") {
            config.reward.initial_vault = v;
        }
        if let Some(v) = env_parse("DEPIN_ENFORCE_VAULT_FLOOR") {
            config.reward.enforce_vault_floor = v;
        }
        if let Some(v) = env_parse("DEPIN_MIGRATION_INTERVAL_HOURS") {
            config.bridge.migration_interval_hours = v;
        }
        if let Ok(v) = env::var("DEPIN_SOURCE_TAG") {
            config.bridge.source_tag = v;
        }
        if let Some(v) = env_parse("DEPIN_MIGRATION_MAX_ATTEMPTS") {
            config.bridge.retry.max_attempts = v;
        }
        if let Some(v) = env_parse("DEPIN_FRESHNESS_MAX_AGE_HOURS") {
            config.bridge.freshness_max_age_hours = v;
        }
        if let Some(v) = env_parse("DEPIN_REGION_GRID_DEGREES") {
            config.bridge.region_grid_degrees = v;
        }
        if let Some(v) = env_parse("DEPIN_MAX_PENDING_AGGREGATES") {
            config.bridge.max_pending_aggregates = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.bridge.migration_interval_hours == 0 {
            return Err(CoreError::Configuration(
                "migration_interval_hours must be > 0".to_string(),
            ));
        }
        if self.bridge.retry.max_attempts == 0 {
            return Err(CoreError::Configuration(
                "retry.max_attempts must be > 0".to_string(),
            ));
        }
        if !(self.bridge.region_grid_degrees > 0.0) {
            return Err(CoreError::Configuration(
                "region_grid_degrees must be > 0".to_string(),
            ));
        }
        if self.bridge.max_pending_aggregates == 0 {
            return Err(CoreError::Configuration(
                "max_pending_aggregates must be > 0".to_string(),
            ));
        }
        if self.insights.trend_chunk_size == 0 {
            return Err(CoreError::Configuration(
                "trend_chunk_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
