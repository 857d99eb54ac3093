//! Configuration types for block generation

use crate::error::{GeneratorError, Result};
use chrono::TimeDelta;
use serde::Deserialize;
use shared_types::KeyId;
use std::time::Duration;

/// Runtime configuration for block generation
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BlockGeneratorConfig {
    /// Key id of this node
    pub key_id: KeyId,

    /// Regular tick interval in milliseconds (default: 1000)
    pub tick_interval_ms: u64,

    /// Tick interval while this node is not a validator (default: 10000)
    pub not_validator_backoff_ms: u64,

    /// Tick interval after a failed attempt (default: 1000)
    pub error_backoff_ms: u64,

    /// Local ban cool-down for producers of bad blocks, in seconds
    pub local_ban_time_secs: u64,

    /// Run post-commit notifications (token movement checks) after each block
    pub post_commit_notifications: bool,

    /// Slot schedule
    pub schedule: ScheduleConfig,

    /// Per-block resource quotas
    pub limits: LimitsConfig,
}

impl Default for BlockGeneratorConfig {
    fn default() -> Self {
        Self {
            key_id: 0,
            tick_interval_ms: 1_000,
            not_validator_backoff_ms: 10_000,
            error_backoff_ms: 1_000,
            local_ban_time_secs: 30 * 60,
            post_commit_notifications: true,
            schedule: ScheduleConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl BlockGeneratorConfig {
    /// Reject configurations the generator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.schedule.slot_duration()?.is_zero() {
            return Err(GeneratorError::InvalidConfig(
                "slot duration must be positive".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(GeneratorError::InvalidConfig(
                "tick interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Regular tick interval
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Tick interval while not a validator
    pub fn not_validator_backoff(&self) -> Duration {
        Duration::from_millis(self.not_validator_backoff_ms)
    }

    /// Tick interval after a failed attempt
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Local ban cool-down
    pub fn local_ban_time(&self) -> Duration {
        Duration::from_secs(self.local_ban_time_secs)
    }
}

/// Slot schedule configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Unix timestamp (seconds) of the first block; slot 0 starts here
    pub first_block_time: i64,

    /// Pause between blocks, in seconds (default: 2)
    pub gap_between_blocks_secs: u64,

    /// Time budget for building one block, in milliseconds (default: 2000)
    pub max_block_generation_time_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            first_block_time: 0,
            gap_between_blocks_secs: 2,
            max_block_generation_time_ms: 2_000,
        }
    }
}

impl ScheduleConfig {
    /// Length of one producer slot. Fails when the sum does not fit a time delta.
    pub fn slot_duration(&self) -> Result<Duration> {
        Duration::from_secs(self.gap_between_blocks_secs)
            .checked_add(Duration::from_millis(self.max_block_generation_time_ms))
            .filter(|slot| TimeDelta::from_std(*slot).is_ok())
            .ok_or_else(|| {
                GeneratorError::InvalidConfig(format!(
                    "slot of {}s + {}ms is too long",
                    self.gap_between_blocks_secs, self.max_block_generation_time_ms
                ))
            })
    }
}

/// Per-block quotas. Zero disables a limit.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum contract transactions per block
    pub max_tx_count: usize,

    /// Maximum total size of contract transactions per block, in bytes
    pub max_block_size: u64,

    /// Maximum size of a single transaction, in bytes
    pub max_tx_size: u64,

    /// Maximum transactions per sender key per block
    pub max_tx_per_key: usize,

    /// Maximum transactions per (ecosystem, sender key) per block
    pub max_tx_per_ecosystem_key: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_tx_count: 1_000,
            max_block_size: 64 * 1024 * 1024,
            max_tx_size: 32 * 1024 * 1024,
            max_tx_per_key: 100,
            max_tx_per_ecosystem_key: 0,
        }
    }
}
