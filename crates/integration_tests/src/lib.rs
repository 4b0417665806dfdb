//! Shared fixtures for cross-crate scenarios

use alloy::{json_abi::JsonAbi, primitives::Address};
use chainseries_core::{FunctionSpec, SourceDescriptor, SourceKind};
use chainseries_sampler::SamplingOptions;
use chainseries_store::{CsvSeriesStore, SyncStateStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A data directory with a series store and sync state, as the binary lays them out
pub struct DataDir {
    pub dir: TempDir,
    pub store: Arc<CsvSeriesStore>,
    pub state: SyncStateStore,
}

impl DataDir {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CsvSeriesStore::open(dir.path()).unwrap());
        let state = SyncStateStore::open(dir.path().join(".sync_state")).unwrap();
        Self { dir, store, state }
    }
}

impl Default for DataDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Source tracking scalar view functions; column `<function>_value`
pub fn function_source(name: &str, address_byte: u8, functions: &[&str]) -> SourceDescriptor {
    SourceDescriptor {
        name: name.to_string(),
        description: Some(format!("{} test source", name)),
        address: Address::repeat_byte(address_byte),
        chain_id: 1,
        kind: SourceKind::Functions {
            abi: Arc::new(JsonAbi::default()),
            functions: functions
                .iter()
                .map(|f| FunctionSpec {
                    name: f.to_string(),
                    args: Vec::new(),
                    column_names: vec![format!("{}_value", f)],
                })
                .collect(),
        },
    }
}

/// No call delay so scenarios run at full speed
pub fn options(stride: u64) -> SamplingOptions {
    SamplingOptions {
        stride,
        call_interval: Duration::ZERO,
        chunk_size: 2,
        freshness_threshold: stride,
    }
}
