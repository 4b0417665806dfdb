//! Core data types for chain series collection

use alloy::{json_abi::JsonAbi, primitives::Address};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Block height (block number), the sampling index and series key
pub type Height = u64;

/// Default output column for token balance probes
pub const DEFAULT_BALANCE_COLUMN: &str = "balance";

/// A tracked view function with fixed call arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    /// Function name as declared in the contract ABI
    pub name: String,
    /// Call arguments in textual form, coerced to the ABI input types at call time
    pub args: Vec<String>,
    /// Output column names; a single-valued return binds to the first one
    pub column_names: Vec<String>,
}

/// ERC-20 `balanceOf` probe against a token contract.
/// The holder is the owning source's address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceProbe {
    pub token: Address,
    pub column_name: String,
}

/// What is read from a source at every sampled height
#[derive(Debug, Clone)]
pub enum SourceKind {
    /// View functions on the source contract
    Functions {
        abi: Arc<JsonAbi>,
        functions: Vec<FunctionSpec>,
    },
    /// Token balance held by the source address
    BalanceProbe(BalanceProbe),
}

/// A named on-chain data source, immutable once loaded
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    /// Unique name, used as storage key and warehouse table prefix
    pub name: String,
    pub description: Option<String>,
    /// Contract address (or balance holder for probes)
    pub address: Address,
    pub chain_id: u64,
    pub kind: SourceKind,
}

impl SourceDescriptor {
    /// Output columns this source produces, in declaration order
    pub fn column_names(&self) -> Vec<String> {
        match &self.kind {
            SourceKind::Functions { functions, .. } => functions
                .iter()
                .flat_map(|f| f.column_names.iter().cloned())
                .collect(),
            SourceKind::BalanceProbe(probe) => vec![probe.column_name.clone()],
        }
    }
}

/// A named set of sources on one chain (ETH, USD, BNB, ...)
#[derive(Debug, Clone)]
pub struct AssetGroup {
    pub name: String,
    pub chain_id: u64,
    /// Group-specific stride, overriding the configured default
    pub stride: Option<u64>,
    pub sources: Vec<SourceDescriptor>,
}

impl AssetGroup {
    /// Warehouse table name for one of this group's sources
    pub fn table_name(&self, source_name: &str) -> String {
        format!("{}_{}", source_name, self.name.to_lowercase())
    }
}

/// Result of a contract view call at the read-API boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutput {
    Scalar(String),
    Tuple(Vec<String>),
}

/// The parts of a block header the sampler needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub height: Height,
    pub timestamp: DateTime<Utc>,
}

/// One sampled row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub height: Height,
    pub timestamp: DateTime<Utc>,
    /// Column values in output order; failed reads are absent
    pub values: Vec<(String, String)>,
}

/// Height-keyed, ascending collection of samples for one source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Series {
    pub(crate) samples: BTreeMap<Height, Sample>,
}

/// Inclusive height range sampled at a fixed stride
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingWindow {
    pub start: Height,
    pub end: Height,
    pub stride: u64,
}

/// Column type understood by the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Timestamp,
    Double,
    Varchar,
}

/// Warehouse column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

/// Outcome of an idempotent table creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Created,
    AlreadyExists,
}
