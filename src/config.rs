//! Configuration management
//!
//! Settings come from a TOML file. `.env` is loaded first and `RPC_URL` /
//! `SUBGRAPH_URL` in the environment override the file.

use std::path::Path;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::constants::{
    DEFAULT_BIN_CHUNK_SIZE, DEFAULT_MAX_RESYNC_ATTEMPTS, DEFAULT_NEW_POOL_LIMIT,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SUBGRAPH_LAG_WARN_SECS, DEFAULT_SUBGRAPH_PAGE_SIZE,
    MULTICALL3_ADDRESS,
};

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub chain: ChainConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub rpc_url: String,
    #[serde(default = "default_multicall_address")]
    pub multicall_address: Address,
}

/// Pool tracker settings
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_dex_id")]
    pub dex_id: String,
    #[serde(default)]
    pub subgraph_url: String,
    /// Keep syncing from chain alone when the indexer fails
    #[serde(default)]
    pub allow_subgraph_error: bool,
    #[serde(default = "default_bin_chunk_size")]
    pub bin_chunk_size: usize,
    #[serde(default = "default_subgraph_page_size")]
    pub subgraph_page_size: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_subgraph_lag_warn_secs")]
    pub subgraph_lag_warn_secs: u64,
    /// Full resyncs tried after a failed incremental validation
    #[serde(default = "default_max_resync_attempts")]
    pub max_resync_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub factory_address: Option<Address>,
    #[serde(default = "default_new_pool_limit")]
    pub new_pool_limit: u64,
}

fn default_multicall_address() -> Address { MULTICALL3_ADDRESS }
fn default_dex_id() -> String { "traderjoe-v20".to_string() }
fn default_bin_chunk_size() -> usize { DEFAULT_BIN_CHUNK_SIZE }
fn default_subgraph_page_size() -> u32 { DEFAULT_SUBGRAPH_PAGE_SIZE }
fn default_request_timeout_secs() -> u64 { DEFAULT_REQUEST_TIMEOUT_SECS }
fn default_subgraph_lag_warn_secs() -> u64 { DEFAULT_SUBGRAPH_LAG_WARN_SECS }
fn default_max_resync_attempts() -> u32 { DEFAULT_MAX_RESYNC_ATTEMPTS }
fn default_new_pool_limit() -> u64 { DEFAULT_NEW_POOL_LIMIT }

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            dex_id: default_dex_id(),
            subgraph_url: String::new(),
            allow_subgraph_error: false,
            bin_chunk_size: default_bin_chunk_size(),
            subgraph_page_size: default_subgraph_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            subgraph_lag_warn_secs: default_subgraph_lag_warn_secs(),
            max_resync_attempts: default_max_resync_attempts(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            factory_address: None,
            new_pool_limit: default_new_pool_limit(),
        }
    }
}

impl TrackerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenv::dotenv().ok();

        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(
            std::env::var("RPC_URL").ok(),
            std::env::var("SUBGRAPH_URL").ok(),
        );
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse TOML configuration")
    }

    pub fn apply_overrides(&mut self, rpc_url: Option<String>, subgraph_url: Option<String>) {
        if let Some(url) = rpc_url.filter(|u| !u.is_empty()) {
            self.chain.rpc_url = url;
        }
        if let Some(url) = subgraph_url.filter(|u| !u.is_empty()) {
            self.tracker.subgraph_url = url;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain.rpc_url.is_empty() {
            bail!("chain.rpc_url not set (config file or RPC_URL)");
        }
        if self.tracker.bin_chunk_size == 0 {
            bail!("tracker.bin_chunk_size must be positive");
        }
        if self.tracker.subgraph_page_size == 0 {
            bail!("tracker.subgraph_page_size must be positive");
        }
        if self.discovery.new_pool_limit == 0 {
            bail!("discovery.new_pool_limit must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_file() {
        let config = EngineConfig::from_toml_str(
            r#"
            [chain]
            rpc_url = "http://localhost:8545"
            "#,
        )
        .unwrap();

        assert_eq!(config.chain.multicall_address, MULTICALL3_ADDRESS);
        assert_eq!(config.tracker.bin_chunk_size, 100);
        assert_eq!(config.tracker.subgraph_page_size, 1000);
        assert_eq!(config.tracker.max_resync_attempts, 1);
        assert_eq!(config.tracker.request_timeout(), Duration::from_secs(10));
        assert!(!config.tracker.allow_subgraph_error);
        assert_eq!(config.discovery.new_pool_limit, 100);
        assert!(config.discovery.factory_address.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_file() {
        let config = EngineConfig::from_toml_str(
            r#"
            [chain]
            rpc_url = "http://node:8545"
            multicall_address = "0x1111111111111111111111111111111111111111"

            [tracker]
            dex_id = "traderjoe-v20-avax"
            subgraph_url = "http://indexer/subgraphs/name/lb"
            allow_subgraph_error = true
            bin_chunk_size = 50
            max_resync_attempts = 3

            [discovery]
            factory_address = "0x2222222222222222222222222222222222222222"
            new_pool_limit = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.tracker.dex_id, "traderjoe-v20-avax");
        assert!(config.tracker.allow_subgraph_error);
        assert_eq!(config.tracker.bin_chunk_size, 50);
        assert_eq!(config.tracker.max_resync_attempts, 3);
        assert_eq!(config.discovery.new_pool_limit, 25);
        assert_eq!(
            config.discovery.factory_address,
            Some(Address::repeat_byte(0x22))
        );
    }

    #[test]
    fn test_overrides_and_validation() {
        let mut config = EngineConfig::from_toml_str("[chain]\n").unwrap();
        assert!(config.validate().is_err());

        config.apply_overrides(Some("http://override:8545".to_string()), Some(String::new()));
        assert_eq!(config.chain.rpc_url, "http://override:8545");
        assert_eq!(config.tracker.subgraph_url, "");
        assert!(config.validate().is_ok());

        config.tracker.bin_chunk_size = 0;
        assert!(config.validate().is_err());
    }
}
