//! Persistence for chain series: CSV series files and fjall-backed sync state

pub mod csv_codec;
pub mod series_store;
pub mod sync_state;

pub use csv_codec::{
    encode_series, encode_series_with_columns, read_series, write_series,
    write_series_with_columns, HEIGHT_COLUMN, TIMESTAMP_COLUMN,
};
pub use series_store::CsvSeriesStore;
pub use sync_state::SyncStateStore;

#[cfg(test)]
mod tests;
