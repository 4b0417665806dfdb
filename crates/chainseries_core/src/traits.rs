//! Core traits for chain series collection: the read API, creation lookup,
//! series storage and warehouse seams

use crate::types::{
    BlockHeader, CallOutput, ColumnSchema, Height, Series, TableStatus,
};
use alloy::{json_abi::JsonAbi, primitives::Address};
use async_trait::async_trait;
use thiserror::Error;

/// Error types for blockchain and explorer reads
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Endpoint unavailable: {0}")]
    Unavailable(String),
    #[error("Call failed: {0}")]
    CallFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ReadError {
    /// Connectivity failures abort a sampling pass; everything else is per-value
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReadError::Unavailable(_))
    }
}

/// Error types for series storage
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt series file {path}: {reason}")]
    Corrupt { path: String, reason: String },
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Error types for warehouse operations
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("HTTP error: {0}")]
    HttpError(String),
    #[error("Warehouse rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("Invalid column name: {0}")]
    InvalidColumn(String),
    #[error("Encoding error: {0}")]
    Encoding(String),
    #[error("Missing configuration: {0}")]
    Configuration(String),
    #[error("Sync state error: {0}")]
    State(String),
}

/// Read access to one blockchain endpoint
#[async_trait]
pub trait ReadApi: Send + Sync {
    /// Label used in logs
    fn endpoint(&self) -> &str;

    /// Current chain head height
    async fn current_height(&self) -> Result<Height, ReadError>;

    /// Header of the block at `height`
    async fn block(&self, height: Height) -> Result<BlockHeader, ReadError>;

    /// Call a view function on `contract` as of `height`
    async fn call(
        &self,
        contract: Address,
        abi: &JsonAbi,
        function: &str,
        args: &[String],
        height: Height,
    ) -> Result<CallOutput, ReadError>;
}

/// Resolves the height at which a contract was deployed
#[async_trait]
pub trait CreationLookup: Send + Sync {
    async fn creation_height(&self, contract: Address, chain_id: u64) -> Result<Height, ReadError>;
}

/// Per-source persisted series
pub trait SeriesStore: Send + Sync {
    /// Load the persisted series; an absent series is empty
    fn load(&self, source_name: &str) -> Result<Series, StoreError>;

    /// Replace the persisted series atomically
    fn save(&self, source_name: &str, series: &Series) -> Result<(), StoreError>;

    /// Union by height, incoming rows win
    fn merge(&self, existing: &Series, incoming: &Series) -> Series {
        existing.merge(incoming)
    }
}

/// Tabular upload API of the analytics warehouse
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Create the table if absent; an existing table is not an error
    async fn ensure_table(
        &self,
        table: &str,
        description: &str,
        schema: &[ColumnSchema],
    ) -> Result<TableStatus, WarehouseError>;

    /// Append rows under the given column layout, returning how many the
    /// warehouse reports as written
    async fn append_rows(
        &self,
        table: &str,
        columns: &[String],
        rows: &Series,
    ) -> Result<u64, WarehouseError>;
}
