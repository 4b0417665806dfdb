//! In-memory doubles for the read API, creation lookup, series store and warehouse

use crate::traits::{
    CreationLookup, ReadApi, ReadError, SeriesStore, StoreError, Warehouse, WarehouseError,
};
use crate::types::{BlockHeader, CallOutput, ColumnSchema, Height, Series, TableStatus};
use alloy::{json_abi::JsonAbi, primitives::Address};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Seconds between consecutive mock blocks
pub const MOCK_BLOCK_TIME: i64 = 12;
/// Timestamp of mock block zero
pub const MOCK_GENESIS: i64 = 1_600_000_000;

/// Timestamp the mock chain reports for `height`
pub fn mock_timestamp(height: Height) -> DateTime<Utc> {
    DateTime::from_timestamp(MOCK_GENESIS + height as i64 * MOCK_BLOCK_TIME, 0)
        .unwrap_or_default()
}

/// Deterministic chain: scalar calls return the height, tuple calls `height + i`
#[derive(Debug, Default)]
pub struct MockReadApi {
    label: String,
    head: Height,
    head_unavailable: bool,
    block_failures: HashSet<Height>,
    call_failures: HashSet<(String, Height)>,
    outage_from: Option<Height>,
    tuple_arity: HashMap<String, usize>,
    calls: Mutex<Vec<(String, Height)>>,
    blocks: Mutex<Vec<Height>>,
}

impl MockReadApi {
    pub fn new(head: Height) -> Self {
        Self {
            label: "mock".to_string(),
            head,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    /// `block(height)` fails with a transient error
    pub fn with_block_failure(mut self, height: Height) -> Self {
        self.block_failures.insert(height);
        self
    }

    /// Calls to `function` at `height` revert
    pub fn with_call_failure(mut self, function: &str, height: Height) -> Self {
        self.call_failures.insert((function.to_string(), height));
        self
    }

    /// Every read at or above `height` reports the endpoint as unavailable
    pub fn with_outage_from(mut self, height: Height) -> Self {
        self.outage_from = Some(height);
        self
    }

    /// `current_height` reports the endpoint as unavailable
    pub fn with_head_unavailable(mut self) -> Self {
        self.head_unavailable = true;
        self
    }

    /// `function` returns a tuple of `arity` values
    pub fn with_tuple(mut self, function: &str, arity: usize) -> Self {
        self.tuple_arity.insert(function.to_string(), arity);
        self
    }

    /// Successful and failed calls, in order
    pub fn calls(&self) -> Vec<(String, Height)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Heights whose header was requested, in order
    pub fn blocks_requested(&self) -> Vec<Height> {
        self.blocks.lock().map(|b| b.clone()).unwrap_or_default()
    }

    fn check_outage(&self, height: Height) -> Result<(), ReadError> {
        match self.outage_from {
            Some(from) if height >= from => Err(ReadError::Unavailable(format!(
                "{} is down at height {}",
                self.label, height
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ReadApi for MockReadApi {
    fn endpoint(&self) -> &str {
        &self.label
    }

    async fn current_height(&self) -> Result<Height, ReadError> {
        if self.head_unavailable {
            return Err(ReadError::Unavailable(format!("{} is down", self.label)));
        }
        Ok(self.head)
    }

    async fn block(&self, height: Height) -> Result<BlockHeader, ReadError> {
        if let Ok(mut blocks) = self.blocks.lock() {
            blocks.push(height);
        }
        self.check_outage(height)?;
        if self.block_failures.contains(&height) || height > self.head {
            return Err(ReadError::NotFound(format!("block {}", height)));
        }
        Ok(BlockHeader {
            height,
            timestamp: mock_timestamp(height),
        })
    }

    async fn call(
        &self,
        _contract: Address,
        _abi: &JsonAbi,
        function: &str,
        _args: &[String],
        height: Height,
    ) -> Result<CallOutput, ReadError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((function.to_string(), height));
        }
        self.check_outage(height)?;
        if self.call_failures.contains(&(function.to_string(), height)) {
            return Err(ReadError::CallFailed(format!(
                "{} reverted at {}",
                function, height
            )));
        }
        Ok(match self.tuple_arity.get(function) {
            Some(arity) => CallOutput::Tuple(
                (0..*arity as u64).map(|i| (height + i).to_string()).collect(),
            ),
            None => CallOutput::Scalar(height.to_string()),
        })
    }
}

/// Creation heights by address; unknown addresses are `NotFound`
#[derive(Debug, Default)]
pub struct MockCreationLookup {
    heights: HashMap<Address, Height>,
    failures: HashSet<Address>,
    lookups: AtomicUsize,
}

impl MockCreationLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_creation(mut self, contract: Address, height: Height) -> Self {
        self.heights.insert(contract, height);
        self
    }

    /// Lookups for `contract` fail as if the explorer were down
    pub fn with_failure(mut self, contract: Address) -> Self {
        self.failures.insert(contract);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CreationLookup for MockCreationLookup {
    async fn creation_height(&self, contract: Address, _chain_id: u64) -> Result<Height, ReadError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failures.contains(&contract) {
            return Err(ReadError::Unavailable("explorer unreachable".to_string()));
        }
        self.heights
            .get(&contract)
            .copied()
            .ok_or_else(|| ReadError::NotFound(format!("no creation record for {}", contract)))
    }
}

/// Series store kept in memory
#[derive(Debug, Default)]
pub struct MemorySeriesStore {
    series: Mutex<HashMap<String, Series>>,
    saves: AtomicUsize,
    fail_saves: bool,
}

impl MemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every save fails
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Default::default()
        }
    }

    pub fn with_series(self, source_name: &str, series: Series) -> Self {
        if let Ok(mut map) = self.series.lock() {
            map.insert(source_name.to_string(), series);
        }
        self
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SeriesStore for MemorySeriesStore {
    fn load(&self, source_name: &str) -> Result<Series, StoreError> {
        let map = self
            .series
            .lock()
            .map_err(|e| StoreError::StorageError(e.to_string()))?;
        Ok(map.get(source_name).cloned().unwrap_or_default())
    }

    fn save(&self, source_name: &str, series: &Series) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::StorageError("disk full".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        let mut map = self
            .series
            .lock()
            .map_err(|e| StoreError::StorageError(e.to_string()))?;
        map.insert(source_name.to_string(), series.clone());
        Ok(())
    }
}

/// Warehouse that records tables and appended rows
#[derive(Debug, Default)]
pub struct MockWarehouse {
    tables: Mutex<HashMap<String, Vec<ColumnSchema>>>,
    appended: Mutex<Vec<(String, Series)>>,
    appended_columns: Mutex<Vec<Vec<String>>>,
    short_by: u64,
    reject_appends: bool,
}

impl MockWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `missing` fewer rows written than were sent
    pub fn with_short_writes(mut self, missing: u64) -> Self {
        self.short_by = missing;
        self
    }

    /// Every append is rejected with a non-success status
    pub fn rejecting_appends(mut self) -> Self {
        self.reject_appends = true;
        self
    }

    pub fn with_existing_table(self, table: &str) -> Self {
        if let Ok(mut tables) = self.tables.lock() {
            tables.insert(table.to_string(), Vec::new());
        }
        self
    }

    pub fn schema(&self, table: &str) -> Option<Vec<ColumnSchema>> {
        self.tables.lock().ok()?.get(table).cloned()
    }

    pub fn appended(&self) -> Vec<(String, Series)> {
        self.appended.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Value columns sent with each append, in order
    pub fn appended_columns(&self) -> Vec<Vec<String>> {
        self.appended_columns.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Warehouse for MockWarehouse {
    async fn ensure_table(
        &self,
        table: &str,
        _description: &str,
        schema: &[ColumnSchema],
    ) -> Result<TableStatus, WarehouseError> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| WarehouseError::HttpError(e.to_string()))?;
        if tables.contains_key(table) {
            return Ok(TableStatus::AlreadyExists);
        }
        tables.insert(table.to_string(), schema.to_vec());
        Ok(TableStatus::Created)
    }

    async fn append_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &Series,
    ) -> Result<u64, WarehouseError> {
        if self.reject_appends {
            return Err(WarehouseError::Rejected {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        // Tables registered through `with_existing_table` accept any columns
        let unknown = self.schema(table).and_then(|schema| {
            if schema.is_empty() {
                return None;
            }
            columns
                .iter()
                .find(|c| !schema.iter().any(|s| &s.name == *c))
                .cloned()
        });
        if let Some(column) = unknown {
            return Err(WarehouseError::Rejected {
                status: 400,
                body: format!("unknown column {}", column),
            });
        }
        if let Ok(mut appended) = self.appended.lock() {
            appended.push((table.to_string(), rows.clone()));
        }
        if let Ok(mut appended) = self.appended_columns.lock() {
            appended.push(columns.to_vec());
        }
        Ok((rows.len() as u64).saturating_sub(self.short_by))
    }
}
