//! Creation height resolution, memoized for the run and cached in the sync state

use alloy::primitives::Address;
use chainseries_core::{CreationLookup, Height, ReadError};
use chainseries_store::SyncStateStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

/// Resolves each contract's creation height at most once per run
pub struct CreationHeights {
    lookup: Arc<dyn CreationLookup>,
    state: Option<SyncStateStore>,
    resolved: Mutex<HashMap<(u64, Address), Arc<OnceCell<Height>>>>,
}

impl CreationHeights {
    pub fn new(lookup: Arc<dyn CreationLookup>) -> Self {
        Self {
            lookup,
            state: None,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Also read and write resolved heights through the persistent sync state
    pub fn with_state(mut self, state: SyncStateStore) -> Self {
        self.state = Some(state);
        self
    }

    /// Creation height of `contract` on `chain_id`. Concurrent callers for the
    /// same contract share one lookup; other contracts are never held up by it.
    pub async fn resolve(&self, contract: Address, chain_id: u64) -> Result<Height, ReadError> {
        let cell = self
            .resolved
            .lock()
            .await
            .entry((chain_id, contract))
            .or_default()
            .clone();

        // A failed lookup leaves the cell empty so the next caller retries
        cell.get_or_try_init(|| self.fetch(contract, chain_id))
            .await
            .copied()
    }

    async fn fetch(&self, contract: Address, chain_id: u64) -> Result<Height, ReadError> {
        if let Some(state) = &self.state {
            match state.creation_height(chain_id, contract) {
                Ok(Some(height)) => {
                    debug!("Creation height of {} cached at {}", contract, height);
                    return Ok(height);
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to read cached creation height of {}: {}", contract, e),
            }
        }

        let height = self.lookup.creation_height(contract, chain_id).await?;
        info!("Resolved creation height of {}: {}", contract, height);

        if let Some(state) = &self.state {
            if let Err(e) = state.store_creation_height(chain_id, contract, height) {
                warn!("Failed to cache creation height of {}: {}", contract, e);
            }
        }
        Ok(height)
    }
}
