//! Local sync state using fjall: resolved creation heights, warehouse publish cursors
//! and the column layout each warehouse table was created with

use alloy::primitives::Address;
use chainseries_core::{Height, StoreError};
use fjall::{Config, Keyspace, PartitionCreateOptions, PersistMode};
use std::path::Path;

/// Persistent key-value state shared by collection and publishing
#[derive(Clone)]
pub struct SyncStateStore {
    keyspace: Keyspace,
    creation_heights: fjall::Partition,
    publish_cursors: fjall::Partition,
    table_columns: fjall::Partition,
}

impl SyncStateStore {
    /// Open or create the sync state database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let keyspace = Config::new(path)
            .open()
            .map_err(|e| StoreError::StorageError(format!("Failed to open database: {}", e)))?;

        let creation_heights = keyspace
            .open_partition("creation_heights", PartitionCreateOptions::default())
            .map_err(|e| StoreError::StorageError(format!("Failed to open partition: {}", e)))?;

        let publish_cursors = keyspace
            .open_partition("publish_cursors", PartitionCreateOptions::default())
            .map_err(|e| StoreError::StorageError(format!("Failed to open partition: {}", e)))?;

        let table_columns = keyspace
            .open_partition("table_columns", PartitionCreateOptions::default())
            .map_err(|e| StoreError::StorageError(format!("Failed to open partition: {}", e)))?;

        Ok(Self {
            keyspace,
            creation_heights,
            publish_cursors,
            table_columns,
        })
    }

    /// Previously resolved creation height of a contract
    pub fn creation_height(&self, chain_id: u64, contract: Address) -> Result<Option<Height>, StoreError> {
        read_height(&self.creation_heights, &creation_key(chain_id, contract))
    }

    /// Record a resolved creation height; creation heights never change
    pub fn store_creation_height(
        &self,
        chain_id: u64,
        contract: Address,
        height: Height,
    ) -> Result<(), StoreError> {
        self.creation_heights
            .insert(creation_key(chain_id, contract), height.to_be_bytes())
            .map_err(|e| StoreError::StorageError(format!("Failed to insert creation height: {}", e)))?;
        self.persist()
    }

    /// Last height appended to a warehouse table
    pub fn publish_cursor(&self, table: &str) -> Result<Option<Height>, StoreError> {
        read_height(&self.publish_cursors, table)
    }

    pub fn set_publish_cursor(&self, table: &str, height: Height) -> Result<(), StoreError> {
        self.publish_cursors
            .insert(table, height.to_be_bytes())
            .map_err(|e| StoreError::StorageError(format!("Failed to insert publish cursor: {}", e)))?;
        self.persist()
    }

    /// Value columns a warehouse table was created with, in upload order
    pub fn table_columns(&self, table: &str) -> Result<Option<Vec<String>>, StoreError> {
        match self.table_columns.get(table) {
            Ok(Some(bytes)) => {
                let raw = std::str::from_utf8(&bytes).map_err(|_| {
                    StoreError::StorageError(format!("Invalid stored columns for {}", table))
                })?;
                Ok(Some(raw.split('\n').filter(|c| !c.is_empty()).map(str::to_string).collect()))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::StorageError(format!("Failed to read {}: {}", table, e))),
        }
    }

    pub fn set_table_columns(&self, table: &str, columns: &[String]) -> Result<(), StoreError> {
        self.table_columns
            .insert(table, columns.join("\n"))
            .map_err(|e| StoreError::StorageError(format!("Failed to insert table columns: {}", e)))?;
        self.persist()
    }

    fn persist(&self) -> Result<(), StoreError> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(|e| StoreError::StorageError(format!("Failed to persist: {}", e)))
    }
}

fn creation_key(chain_id: u64, contract: Address) -> String {
    format!("{}:{}", chain_id, contract).to_lowercase()
}

fn read_height(partition: &fjall::Partition, key: &str) -> Result<Option<Height>, StoreError> {
    match partition.get(key) {
        Ok(Some(bytes)) => {
            let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                StoreError::StorageError(format!("Invalid stored height for {}", key))
            })?;
            Ok(Some(u64::from_be_bytes(raw)))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(StoreError::StorageError(format!("Failed to read {}: {}", key, e))),
    }
}
