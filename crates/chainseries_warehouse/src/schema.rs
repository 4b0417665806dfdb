//! Column schema inference for warehouse tables

use chainseries_core::{is_valid_column_name, ColumnSchema, ColumnType, Series, WarehouseError};
use chainseries_store::{HEIGHT_COLUMN, TIMESTAMP_COLUMN};

/// Columns as they will be uploaded: height and timestamp, then the value columns
pub fn table_columns(value_columns: &[String]) -> Vec<String> {
    let mut columns = vec![HEIGHT_COLUMN.to_string(), TIMESTAMP_COLUMN.to_string()];
    columns.extend(value_columns.iter().cloned());
    columns
}

/// Every column name must start with an ASCII letter or underscore
pub fn validate_columns(columns: &[String]) -> Result<(), WarehouseError> {
    match columns.iter().find(|c| !is_valid_column_name(c)) {
        Some(bad) => Err(WarehouseError::InvalidColumn(format!(
            "{:?} must start with a letter or underscore",
            bad
        ))),
        None => Ok(()),
    }
}

/// `timestamp` is a timestamp, columns whose values are all numeric are
/// doubles, everything else is varchar. All columns are nullable.
pub fn infer_schema(series: &Series, value_columns: &[String]) -> Vec<ColumnSchema> {
    table_columns(value_columns)
        .into_iter()
        .map(|name| {
            let column_type = if name == TIMESTAMP_COLUMN {
                ColumnType::Timestamp
            } else if name == HEIGHT_COLUMN {
                ColumnType::Double
            } else {
                infer_value_type(series, &name)
            };
            ColumnSchema {
                name,
                column_type,
                nullable: true,
            }
        })
        .collect()
}

fn infer_value_type(series: &Series, column: &str) -> ColumnType {
    let mut values = series.iter().filter_map(|s| s.value(column)).peekable();
    if values.peek().is_none() {
        return ColumnType::Varchar;
    }
    if values.all(is_numeric_literal) {
        ColumnType::Double
    } else {
        ColumnType::Varchar
    }
}

/// Optional sign, digits, at most one decimal point
fn is_numeric_literal(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    let mut seen_digit = false;
    let mut seen_point = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_point => seen_point = true,
            _ => return false,
        }
    }
    seen_digit
}
