//! Configuration management for the chainseries binary

use anyhow::{bail, Result};
use chainseries_core::AssetGroup;
use chainseries_sampler::SamplingOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "CHAINSERIES";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub explorer: ExplorerSettings,
    pub warehouse: WarehouseSettings,
    pub sampling: SamplingSettings,
    pub storage: StorageConfig,
    pub sources: SourcesConfig,
    pub schedule: ScheduleConfig,
}

/// Upstream JSON-RPC endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Comma-separated endpoint URLs
    pub urls: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerSettings {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseSettings {
    pub base_url: String,
    pub api_key: String,
    pub namespace: String,
    pub batch_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingSettings {
    /// Default stride for groups that do not set their own
    pub stride: u64,
    pub call_interval_ms: u64,
    /// Falls back to the effective stride when unset
    #[serde(default)]
    pub freshness_threshold: Option<u64>,
    pub chunk_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Series files and sync state live here
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Asset-group definitions
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Period of the recurring collection mode
    pub interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from `config/chainseries` (or `path`) and `CHAINSERIES_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path),
            None => config::File::with_name("config/chainseries").required(false),
        };

        let config = config::Config::builder()
            // Default configuration
            .set_default("rpc.urls", "")?
            .set_default("explorer.base_url", "https://api.etherscan.io/v2/api")?
            .set_default("explorer.api_key", "")?
            .set_default("warehouse.base_url", "https://api.dune.com/api/v1")?
            .set_default("warehouse.api_key", "")?
            .set_default("warehouse.namespace", "rangonomics")?
            .set_default("warehouse.batch_rows", 10_000)?
            .set_default("sampling.stride", 100)?
            .set_default("sampling.call_interval_ms", 100)?
            .set_default("sampling.chunk_size", 500)?
            .set_default("storage.data_dir", "data")?
            .set_default("sources.file", "config/sources.toml")?
            .set_default("schedule.interval_secs", 86_400)?
            // Configuration file
            .add_source(file)
            // Environment variables, e.g. CHAINSERIES_RPC__URLS
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Configured endpoint URLs, in order
    pub fn rpc_urls(&self) -> Vec<String> {
        self.rpc
            .urls
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Sync state database path
    pub fn state_path(&self) -> PathBuf {
        self.storage.data_dir.join(".sync_state")
    }

    /// Sampling options for `group`. Stride precedence: command line, group, configuration.
    pub fn sampling_options(
        &self,
        group: &AssetGroup,
        stride_override: Option<u64>,
    ) -> Result<SamplingOptions> {
        let stride = stride_override
            .or(group.stride)
            .unwrap_or(self.sampling.stride);
        if stride == 0 {
            bail!("stride for group {} must be positive", group.name);
        }
        if self.sampling.chunk_size == 0 {
            bail!("sampling.chunk_size must be positive");
        }

        Ok(SamplingOptions {
            stride,
            call_interval: Duration::from_millis(self.sampling.call_interval_ms),
            chunk_size: self.sampling.chunk_size,
            freshness_threshold: self.sampling.freshness_threshold.unwrap_or(stride),
        })
    }
}
