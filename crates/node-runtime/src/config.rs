//! Node configuration
//!
//! Sources, later ones win:
//!
//! 1. Built-in defaults
//! 2. JSON file named by `BG_CONFIG`
//! 3. `BG_*` environment variables

use anyhow::{bail, Context, Result};
use block_generator::BlockGeneratorConfig;
use serde::Deserialize;
use shared_types::KeyId;
use std::path::Path;
use std::str::FromStr;

/// Private key used when none is configured. Development only.
pub const DEV_PRIVATE_KEY_HEX: &str =
    "0101010101010101010101010101010101010101010101010101010101010101";

/// Complete node configuration
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Block generator settings
    pub generator: BlockGeneratorConfig,

    /// Hex-encoded node private key
    pub private_key_hex: String,

    /// Producer key ids in position order. Empty means "only this node".
    pub producers: Vec<KeyId>,

    /// Synthetic transaction every this many milliseconds, 0 disables the feed
    pub dev_tx_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            generator: BlockGeneratorConfig {
                key_id: 1,
                ..Default::default()
            },
            private_key_hex: DEV_PRIVATE_KEY_HEX.to_string(),
            producers: Vec::new(),
            dev_tx_interval_ms: 500,
        }
    }
}

impl NodeConfig {
    /// Producer list with this node included
    pub fn producer_keys(&self) -> Vec<KeyId> {
        if self.producers.is_empty() {
            vec![self.generator.key_id]
        } else {
            self.producers.clone()
        }
    }

    /// Decoded private key
    pub fn private_key(&self) -> Result<Vec<u8>> {
        hex::decode(&self.private_key_hex).context("private key is not valid hex")
    }

    pub fn validate(&self) -> Result<()> {
        self.generator.validate()?;
        if self.private_key()?.is_empty() {
            bail!("private key must not be empty");
        }
        Ok(())
    }
}

/// Load configuration from the process environment
pub fn load_config() -> Result<NodeConfig> {
    let mut config = match std::env::var("BG_CONFIG") {
        Ok(path) => read_config_file(Path::new(&path))?,
        Err(_) => NodeConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    // a fresh dev chain starts now
    if config.generator.schedule.first_block_time == 0 {
        config.generator.schedule.first_block_time = chrono::Utc::now().timestamp();
    }

    config.validate()?;
    Ok(config)
}

/// Read a JSON configuration file; missing fields keep their defaults
pub fn read_config_file(path: &Path) -> Result<NodeConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
}

/// Apply `BG_*` overrides looked up through `lookup`
pub fn apply_env_overrides<F>(config: &mut NodeConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let generator = &mut config.generator;
    override_parsed(&lookup, "BG_KEY_ID", &mut generator.key_id)?;
    override_parsed(&lookup, "BG_TICK_INTERVAL_MS", &mut generator.tick_interval_ms)?;
    override_parsed(
        &lookup,
        "BG_FIRST_BLOCK_TIME",
        &mut generator.schedule.first_block_time,
    )?;
    override_parsed(
        &lookup,
        "BG_GAP_BETWEEN_BLOCKS_SECS",
        &mut generator.schedule.gap_between_blocks_secs,
    )?;
    override_parsed(
        &lookup,
        "BG_MAX_BLOCK_GENERATION_TIME_MS",
        &mut generator.schedule.max_block_generation_time_ms,
    )?;
    override_parsed(&lookup, "BG_MAX_TX_COUNT", &mut generator.limits.max_tx_count)?;
    override_parsed(&lookup, "BG_LOCAL_BAN_TIME_SECS", &mut generator.local_ban_time_secs)?;
    override_parsed(&lookup, "BG_DEV_TX_INTERVAL_MS", &mut config.dev_tx_interval_ms)?;

    if let Some(key) = lookup("BG_PRIVATE_KEY") {
        config.private_key_hex = key;
    }
    if let Some(list) = lookup("BG_PRODUCERS") {
        config.producers = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().with_context(|| format!("BG_PRODUCERS: bad key id {s:?}")))
            .collect::<Result<_>>()?;
    }
    Ok(())
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(value) = lookup(key) {
        *target = value
            .trim()
            .parse()
            .with_context(|| format!("{key}: cannot parse {value:?}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = NodeConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("BG_KEY_ID", "42"),
                ("BG_TICK_INTERVAL_MS", " 250 "),
                ("BG_FIRST_BLOCK_TIME", "1700000000"),
                ("BG_PRODUCERS", "7, 42,9"),
            ]),
        )
        .unwrap();

        assert_eq!(config.generator.key_id, 42);
        assert_eq!(config.generator.tick_interval_ms, 250);
        assert_eq!(config.generator.schedule.first_block_time, 1_700_000_000);
        assert_eq!(config.producer_keys(), vec![7, 42, 9]);
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = NodeConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("BG_KEY_ID", "ten")])).unwrap_err();
        assert!(err.to_string().contains("BG_KEY_ID"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: NodeConfig =
            serde_json::from_str(r#"{ "generator": { "key_id": 5 }, "dev_tx_interval_ms": 0 }"#)
                .unwrap();

        assert_eq!(config.generator.key_id, 5);
        assert_eq!(config.generator.tick_interval_ms, 1_000);
        assert_eq!(config.dev_tx_interval_ms, 0);
        assert_eq!(config.private_key().unwrap().len(), 32);
        assert_eq!(config.producer_keys(), vec![5]);
    }

    #[test]
    fn test_validate_rejects_bad_key() {
        let config = NodeConfig {
            private_key_hex: "zz".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
