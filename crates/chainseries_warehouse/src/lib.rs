//! Warehouse publishing for chain series: schema inference, incremental
//! appends and the Dune upload client

pub mod dune;
pub mod publisher;
pub mod schema;

pub use dune::{DuneClient, DuneConfig, MAX_UPLOAD_BYTES};
pub use publisher::{PublishOutcome, WarehousePublisher, DEFAULT_BATCH_ROWS};
pub use schema::{infer_schema, validate_columns};
