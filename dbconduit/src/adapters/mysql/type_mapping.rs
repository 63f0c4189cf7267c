//! MySQL column types to `CellType`, and row decoding.

use crate::{
    Result,
    error::DbConduitError,
    models::{CellType, CellValue, QueryResult, ResultColumn},
};
use sqlx::{Column, Row, TypeInfo, mysql::MySqlRow};

/// Maps a MySQL type name (as reported by the driver) to a `CellType`.
///
/// # Example
/// ```rust
/// use dbconduit::adapters::mysql::map_mysql_type;
/// use dbconduit::models::CellType;
///
/// assert_eq!(map_mysql_type("BIGINT UNSIGNED"), CellType::Integer);
/// assert_eq!(map_mysql_type("varchar"), CellType::Text);
/// ```
pub fn map_mysql_type(type_name: &str) -> CellType {
    let upper = type_name.to_uppercase();
    let base = upper.trim_end_matches(" UNSIGNED").trim();

    match base {
        "BOOLEAN" | "BOOL" => CellType::Boolean,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "BIGINT" | "YEAR" | "BIT" => {
            CellType::Integer
        }
        "FLOAT" | "DOUBLE" | "REAL" => CellType::Float,
        "DECIMAL" | "NUMERIC" => CellType::Decimal,
        "DATE" => CellType::Date,
        "TIME" => CellType::Time,
        "DATETIME" | "TIMESTAMP" => CellType::DateTime,
        "JSON" => CellType::Json,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "GEOMETRY" => {
            CellType::Binary
        }
        _ => CellType::Text,
    }
}

/// Builds the result columns from driver column metadata.
pub(crate) fn result_columns<C: Column>(columns: &[C]) -> Vec<ResultColumn> {
    columns
        .iter()
        .map(|c| ResultColumn::new(c.name(), map_mysql_type(c.type_info().name())))
        .collect()
}

/// Converts fetched rows into a `QueryResult` with the given columns.
///
/// # Errors
/// Returns a `QueryExecution` error if a value cannot be read at all.
pub(crate) fn rows_to_result(columns: Vec<ResultColumn>, rows: &[MySqlRow]) -> Result<QueryResult> {
    let decoded = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(index, column)| decode_cell(row, index, column.data_type))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;

    QueryResult::new(columns, decoded)
}

fn or_null<T>(value: Option<T>, wrap: impl FnOnce(T) -> CellValue) -> CellValue {
    value.map_or(CellValue::Null, wrap)
}

/// Decodes one cell, trying the representations MySQL uses for `cell_type`.
/// Text-like values without a typed decoder fall back to the raw bytes.
fn decode_cell(row: &MySqlRow, index: usize, cell_type: CellType) -> Result<CellValue> {
    match cell_type {
        CellType::Boolean => {
            if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
                return Ok(or_null(v, CellValue::Boolean));
            }
        }
        CellType::Integer => {
            if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
                return Ok(or_null(v, CellValue::Integer));
            }
            if let Ok(v) = row.try_get::<Option<u64>, _>(index) {
                return Ok(or_null(v, |n| {
                    i64::try_from(n).map_or_else(|_| CellValue::Text(n.to_string()), CellValue::Integer)
                }));
            }
        }
        CellType::Float => {
            if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
                return Ok(or_null(v, CellValue::Float));
            }
            if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
                return Ok(or_null(v, |n| CellValue::Float(f64::from(n))));
            }
        }
        CellType::Decimal => {
            if let Ok(v) = row.try_get::<Option<rust_decimal::Decimal>, _>(index) {
                return Ok(or_null(v, CellValue::Decimal));
            }
        }
        CellType::Date => {
            if let Ok(v) = row.try_get::<Option<chrono::NaiveDate>, _>(index) {
                return Ok(or_null(v, CellValue::Date));
            }
        }
        CellType::Time => {
            if let Ok(v) = row.try_get::<Option<chrono::NaiveTime>, _>(index) {
                return Ok(or_null(v, CellValue::Time));
            }
        }
        CellType::DateTime => {
            if let Ok(v) = row.try_get::<Option<chrono::NaiveDateTime>, _>(index) {
                return Ok(or_null(v, CellValue::DateTime));
            }
            // TIMESTAMP columns decode as UTC instants
            if let Ok(v) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index) {
                return Ok(or_null(v, |ts| CellValue::DateTime(ts.naive_utc())));
            }
        }
        CellType::Json => {
            if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(index) {
                return Ok(or_null(v, CellValue::Json));
            }
        }
        CellType::Binary => {
            if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
                return Ok(or_null(v, CellValue::Binary));
            }
        }
        CellType::Text => {}
    }

    match row.try_get::<Option<String>, _>(index) {
        Ok(v) => Ok(or_null(v, CellValue::Text)),
        Err(_) if matches!(cell_type, CellType::Text | CellType::Binary) => raw_bytes(row, index),
        Err(e) => Err(DbConduitError::query_failed(
            format!("Failed to decode MySQL column {} as {:?}", index, cell_type),
            e,
        )),
    }
}

/// Reads a value as its raw bytes, without the driver's type check. UTF-8
/// content becomes text, anything else binary.
fn raw_bytes(row: &MySqlRow, index: usize) -> Result<CellValue> {
    let bytes = row
        .try_get_unchecked::<Option<Vec<u8>>, _>(index)
        .map_err(|e| {
            DbConduitError::query_failed(format!("Failed to decode MySQL column {}", index), e)
        })?;

    Ok(or_null(bytes, |bytes| match String::from_utf8(bytes) {
        Ok(text) => CellValue::Text(text),
        Err(e) => CellValue::Binary(e.into_bytes()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_mysql_type() {
        assert_eq!(map_mysql_type("BOOLEAN"), CellType::Boolean);
        assert_eq!(map_mysql_type("TINYINT"), CellType::Integer);
        assert_eq!(map_mysql_type("INT UNSIGNED"), CellType::Integer);
        assert_eq!(map_mysql_type("DOUBLE"), CellType::Float);
        assert_eq!(map_mysql_type("DECIMAL"), CellType::Decimal);
        assert_eq!(map_mysql_type("DATETIME"), CellType::DateTime);
        assert_eq!(map_mysql_type("TIMESTAMP"), CellType::DateTime);
        assert_eq!(map_mysql_type("DATE"), CellType::Date);
        assert_eq!(map_mysql_type("TIME"), CellType::Time);
        assert_eq!(map_mysql_type("JSON"), CellType::Json);
        assert_eq!(map_mysql_type("LONGBLOB"), CellType::Binary);
        assert_eq!(map_mysql_type("VARBINARY"), CellType::Binary);
        assert_eq!(map_mysql_type("LONGTEXT"), CellType::Text);
        assert_eq!(map_mysql_type("ENUM"), CellType::Text);
    }
}
