//! CSV encoding of series: `block_number`, `timestamp`, then one column per output

use chainseries_core::{Sample, Series, StoreError};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::{Read, Write};

pub const HEIGHT_COLUMN: &str = "block_number";
pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a block timestamp the way series files store it
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp; RFC 3339 is accepted as well
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
}

/// Write a series as CSV; omitted values become empty cells
pub fn write_series<W: Write>(writer: W, series: &Series) -> Result<(), StoreError> {
    write_series_with_columns(writer, series, &series.columns())
}

/// Write a series under a fixed value-column layout
pub fn write_series_with_columns<W: Write>(
    writer: W,
    series: &Series,
    columns: &[String],
) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_writer(writer);

    let mut header = vec![HEIGHT_COLUMN.to_string(), TIMESTAMP_COLUMN.to_string()];
    header.extend(columns.iter().cloned());
    writer.write_record(&header).map_err(csv_error)?;

    for sample in series.iter() {
        let mut record = Vec::with_capacity(header.len());
        record.push(sample.height.to_string());
        record.push(format_timestamp(&sample.timestamp));
        for column in columns {
            record.push(sample.value(column).unwrap_or_default().to_string());
        }
        writer.write_record(&record).map_err(csv_error)?;
    }

    writer.flush()?;
    Ok(())
}

/// Encode a series into an in-memory CSV document
pub fn encode_series(series: &Series) -> Result<Vec<u8>, StoreError> {
    encode_series_with_columns(series, &series.columns())
}

pub fn encode_series_with_columns(series: &Series, columns: &[String]) -> Result<Vec<u8>, StoreError> {
    let mut buffer = Vec::new();
    write_series_with_columns(&mut buffer, series, columns)?;
    Ok(buffer)
}

/// Read a series from CSV; `origin` names the source in errors
pub fn read_series<R: Read>(reader: R, origin: &str) -> Result<Series, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        path: origin.to_string(),
        reason,
    };

    let mut reader = csv::Reader::from_reader(reader);
    let header = reader.headers().map_err(csv_error)?.clone();

    if header.get(0) != Some(HEIGHT_COLUMN) || header.get(1) != Some(TIMESTAMP_COLUMN) {
        return Err(corrupt(format!(
            "expected leading columns {}, {}",
            HEIGHT_COLUMN, TIMESTAMP_COLUMN
        )));
    }

    let mut series = Series::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        let raw_height = record.get(0).unwrap_or_default();
        let height = raw_height
            .parse::<u64>()
            .map_err(|e| corrupt(format!("row {}: bad height {:?}: {}", line + 1, raw_height, e)))?;
        let raw_timestamp = record.get(1).unwrap_or_default();
        let timestamp = parse_timestamp(raw_timestamp)
            .ok_or_else(|| corrupt(format!("row {}: bad timestamp {:?}", line + 1, raw_timestamp)))?;

        let mut sample = Sample::new(height, timestamp);
        for (name, value) in header.iter().zip(record.iter()).skip(2) {
            if !value.is_empty() {
                sample.values.push((name.to_string(), value.to_string()));
            }
        }
        series.insert(sample);
    }

    Ok(series)
}

fn csv_error(e: csv::Error) -> StoreError {
    if e.is_io_error() {
        match e.into_kind() {
            csv::ErrorKind::Io(io) => StoreError::Io(io),
            other => StoreError::StorageError(format!("CSV error: {:?}", other)),
        }
    } else {
        StoreError::StorageError(format!("CSV error: {}", e))
    }
}
