//! Publishing persisted series to the warehouse with incremental cursors

use crate::schema::{infer_schema, table_columns, validate_columns};
use chainseries_core::{Height, Series, TableStatus, Warehouse, WarehouseError};
use chainseries_store::SyncStateStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Rows per append request unless configured otherwise
pub const DEFAULT_BATCH_ROWS: usize = 10_000;

/// Outcome of publishing one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Rows appended in this publish
    Published { rows: u64 },
    /// Every persisted row was already published
    UpToDate,
    /// Nothing was sent or a batch failed; `published_rows` were written before the failure
    Failed { reason: String, published_rows: u64 },
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, PublishOutcome::Failed { .. })
    }

    fn failed(reason: impl Into<String>, published_rows: u64) -> Self {
        PublishOutcome::Failed {
            reason: reason.into(),
            published_rows,
        }
    }
}

/// Pushes series to a warehouse table, schema first, then rows above the publish cursor
pub struct WarehousePublisher {
    warehouse: Arc<dyn Warehouse>,
    cursors: Option<SyncStateStore>,
    batch_rows: usize,
}

impl WarehousePublisher {
    /// Without cursors every publish resubmits the whole series
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            warehouse,
            cursors: None,
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }

    pub fn with_cursors(mut self, cursors: SyncStateStore) -> Self {
        self.cursors = Some(cursors);
        self
    }

    pub fn with_batch_rows(mut self, batch_rows: usize) -> Self {
        self.batch_rows = batch_rows.max(1);
        self
    }

    /// Publish `series` to `table`. Local data is never modified; a failed
    /// publish is retried from the persisted series on a later run.
    ///
    /// With cursors the table keeps the value columns it was created with;
    /// columns that appear later are not uploaded.
    pub async fn publish(&self, table: &str, description: &str, series: &Series) -> PublishOutcome {
        if series.is_empty() {
            warn!("Nothing to publish for {}", table);
            return PublishOutcome::failed("series is empty", 0);
        }

        let recorded = match self.recorded_columns(table) {
            Ok(recorded) => recorded,
            Err(e) => return PublishOutcome::failed(e.to_string(), 0),
        };
        let value_columns = recorded.clone().unwrap_or_else(|| series.columns());
        if let Err(e) = validate_columns(&table_columns(&value_columns)) {
            error!("Refusing to publish {}: {}", table, e);
            return PublishOutcome::failed(e.to_string(), 0);
        }

        let schema = infer_schema(series, &value_columns);
        match self.warehouse.ensure_table(table, description, &schema).await {
            Ok(TableStatus::Created) => info!("Created warehouse table {}", table),
            Ok(TableStatus::AlreadyExists) => debug!("Warehouse table {} already exists", table),
            Err(e) => {
                error!("Failed to create table {}: {}", table, e);
                return PublishOutcome::failed(e.to_string(), 0);
            }
        }
        if recorded.is_none() {
            if let Err(e) = self.record_columns(table, &value_columns) {
                return PublishOutcome::failed(e.to_string(), 0);
            }
        }

        let dropped: Vec<String> = series
            .columns()
            .into_iter()
            .filter(|c| !value_columns.contains(c))
            .collect();
        if !dropped.is_empty() {
            warn!(
                "Columns {:?} are not in table {} and will not be uploaded",
                dropped, table
            );
        }

        let cursor = match self.cursor(table) {
            Ok(cursor) => cursor,
            Err(e) => return PublishOutcome::failed(e.to_string(), 0),
        };
        let pending = match cursor {
            Some(height) => series.after(height),
            None => series.clone(),
        };
        if pending.is_empty() {
            info!("{} already published up to block {:?}", table, cursor);
            return PublishOutcome::UpToDate;
        }

        let mut published = 0u64;
        for batch in pending.batches(self.batch_rows) {
            let expected = batch.len() as u64;
            let written = match self.warehouse.append_rows(table, &value_columns, &batch).await {
                Ok(written) => written,
                Err(e) => {
                    error!("Failed to append to {}: {}", table, e);
                    return PublishOutcome::failed(e.to_string(), published);
                }
            };
            if written < expected {
                warn!(
                    "Partial write to {}: {} of {} rows; stopping",
                    table, written, expected
                );
                return PublishOutcome::failed(
                    format!("warehouse wrote {} of {} rows", written, expected),
                    published + written,
                );
            }
            published += written;

            if let Some(last) = batch.last_height() {
                if let Err(e) = self.advance_cursor(table, last) {
                    return PublishOutcome::failed(e.to_string(), published);
                }
            }
        }

        info!("Published {} rows to {}", published, table);
        PublishOutcome::Published { rows: published }
    }

    fn recorded_columns(&self, table: &str) -> Result<Option<Vec<String>>, WarehouseError> {
        match &self.cursors {
            Some(state) => state
                .table_columns(table)
                .map_err(|e| WarehouseError::State(format!("table columns: {}", e))),
            None => Ok(None),
        }
    }

    fn record_columns(&self, table: &str, columns: &[String]) -> Result<(), WarehouseError> {
        if let Some(state) = &self.cursors {
            state
                .set_table_columns(table, columns)
                .map_err(|e| WarehouseError::State(format!("table columns: {}", e)))?;
        }
        Ok(())
    }

    fn cursor(&self, table: &str) -> Result<Option<Height>, WarehouseError> {
        match &self.cursors {
            Some(state) => state
                .publish_cursor(table)
                .map_err(|e| WarehouseError::State(format!("publish cursor: {}", e))),
            None => Ok(None),
        }
    }

    fn advance_cursor(&self, table: &str, height: Height) -> Result<(), WarehouseError> {
        if let Some(state) = &self.cursors {
            state
                .set_publish_cursor(table, height)
                .map_err(|e| WarehouseError::State(format!("publish cursor: {}", e)))?;
        }
        Ok(())
    }
}
