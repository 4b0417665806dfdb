//! Wiring of stores, endpoints and clients from the loaded configuration

use crate::config::AppConfig;
use anyhow::{anyhow, Context, Result};
use chainseries_core::{ReadApi, SeriesStore};
use chainseries_sampler::{
    CreationHeights, EndpointPool, EvmReadApi, ExplorerClient, ExplorerConfig, SamplingOptions,
    SourceSetCollector,
};
use chainseries_store::{CsvSeriesStore, SyncStateStore};
use chainseries_warehouse::{DuneClient, DuneConfig, WarehousePublisher};
use std::sync::Arc;
use tracing::{info, warn};

/// Long-lived handles shared by every command of one process
pub struct Runtime {
    pub config: AppConfig,
    pub store: Arc<CsvSeriesStore>,
    pub state: SyncStateStore,
}

impl Runtime {
    pub fn open(config: AppConfig) -> Result<Self> {
        let store = CsvSeriesStore::open(&config.storage.data_dir).with_context(|| {
            format!(
                "Failed to open data directory {}",
                config.storage.data_dir.display()
            )
        })?;
        let state = SyncStateStore::open(config.state_path())
            .with_context(|| format!("Failed to open sync state {}", config.state_path().display()))?;
        info!("Using data directory {}", store.data_dir().display());

        Ok(Self {
            config,
            store: Arc::new(store),
            state,
        })
    }

    /// One read API per configured RPC URL
    pub fn endpoint_pool(&self) -> Result<EndpointPool> {
        let mut endpoints: Vec<Arc<dyn ReadApi>> = Vec::new();
        for url in self.config.rpc_urls() {
            let api = EvmReadApi::connect(&url).map_err(|e| anyhow!("{}", e))?;
            endpoints.push(Arc::new(api));
        }
        EndpointPool::new(endpoints)
            .ok_or_else(|| anyhow!("no RPC endpoints configured (set rpc.urls)"))
    }

    /// Explorer-backed creation heights cached in the sync state
    pub fn creation_heights(&self) -> Result<CreationHeights> {
        if self.config.explorer.api_key.is_empty() {
            warn!("explorer.api_key is not set; creation lookups will likely be refused");
        }
        let explorer = ExplorerClient::new(ExplorerConfig {
            base_url: self.config.explorer.base_url.clone(),
            api_key: self.config.explorer.api_key.clone(),
        })
        .map_err(|e| anyhow!("{}", e))?;
        Ok(CreationHeights::new(Arc::new(explorer)).with_state(self.state.clone()))
    }

    pub fn collector(&self, options: SamplingOptions) -> Result<SourceSetCollector> {
        let store: Arc<dyn SeriesStore> = self.store.clone();
        Ok(SourceSetCollector::new(
            Arc::new(self.endpoint_pool()?),
            store,
            Arc::new(self.creation_heights()?),
            options,
        ))
    }

    pub fn publisher(&self) -> Result<WarehousePublisher> {
        let warehouse = &self.config.warehouse;
        let client = DuneClient::new(DuneConfig {
            base_url: warehouse.base_url.clone(),
            api_key: warehouse.api_key.clone(),
            namespace: warehouse.namespace.clone(),
        })
        .map_err(|e| anyhow!("{}", e))?;

        Ok(WarehousePublisher::new(Arc::new(client))
            .with_cursors(self.state.clone())
            .with_batch_rows(warehouse.batch_rows))
    }
}
