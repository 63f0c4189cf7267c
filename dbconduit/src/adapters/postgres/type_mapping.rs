//! PostgreSQL column types to `CellType`, and row decoding.

use crate::{
    Result,
    error::DbConduitError,
    models::{CellType, CellValue, QueryResult, ResultColumn},
};
use sqlx::{
    Column, Row, TypeInfo, ValueRef,
    postgres::{PgRow, PgValueFormat, types::Oid},
};

/// Maps a PostgreSQL type name (as reported by the driver) to a `CellType`.
///
/// Arrays, ranges, intervals, network addresses and other types without a
/// native cell map to `Text` and keep the server's text rendering.
///
/// # Example
/// ```rust
/// use dbconduit::adapters::postgres::map_postgresql_type;
/// use dbconduit::models::CellType;
///
/// assert_eq!(map_postgresql_type("INT4"), CellType::Integer);
/// assert_eq!(map_postgresql_type("TIMESTAMPTZ"), CellType::DateTime);
/// ```
pub fn map_postgresql_type(type_name: &str) -> CellType {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => CellType::Boolean,
        "INT2" | "INT4" | "INT8" | "SMALLINT" | "INTEGER" | "BIGINT" | "OID" => CellType::Integer,
        "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE PRECISION" => CellType::Float,
        "NUMERIC" | "DECIMAL" => CellType::Decimal,
        "BYTEA" => CellType::Binary,
        "DATE" => CellType::Date,
        "TIME" => CellType::Time,
        "TIMESTAMP" | "TIMESTAMPTZ" => CellType::DateTime,
        "JSON" | "JSONB" => CellType::Json,
        // Single-byte "char" (pg_catalog), distinct from CHAR(n)
        "\"CHAR\"" => CellType::Text,
        _ => CellType::Text,
    }
}

/// Builds the result columns from driver column metadata.
pub(crate) fn result_columns<C: Column>(columns: &[C]) -> Vec<ResultColumn> {
    columns
        .iter()
        .map(|c| ResultColumn::new(c.name(), map_postgresql_type(c.type_info().name())))
        .collect()
}

/// Converts fetched rows into a `QueryResult` with the given columns.
///
/// # Errors
/// Returns a `QueryExecution` error if a value can be neither decoded nor
/// read as text.
pub(crate) fn rows_to_result(columns: Vec<ResultColumn>, rows: &[PgRow]) -> Result<QueryResult> {
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

/// Decodes one cell. PostgreSQL is strictly typed, so integer and float
/// widths are tried from narrowest to widest. Anything without a typed
/// decoder falls back to the server's text rendering.
fn decode_cell(row: &PgRow, index: usize, cell_type: CellType) -> Result<CellValue> {
    match cell_type {
        CellType::Boolean => {
            if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
                return Ok(or_null(v, CellValue::Boolean));
            }
        }
        CellType::Integer => {
            if let Ok(v) = row.try_get::<Option<i16>, _>(index) {
                return Ok(or_null(v, |n| CellValue::Integer(i64::from(n))));
            }
            if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
                return Ok(or_null(v, |n| CellValue::Integer(i64::from(n))));
            }
            if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
                return Ok(or_null(v, CellValue::Integer));
            }
            if let Ok(v) = row.try_get::<Option<Oid>, _>(index) {
                return Ok(or_null(v, |oid| CellValue::Integer(i64::from(oid.0))));
            }
        }
        CellType::Float => {
            if let Ok(v) = row.try_get::<Option<f32>, _>(index) {
                return Ok(or_null(v, |n| CellValue::Float(f64::from(n))));
            }
            if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
                return Ok(or_null(v, CellValue::Float));
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
        CellType::Text => {
            if let Ok(v) = row.try_get::<Option<String>, _>(index) {
                return Ok(or_null(v, CellValue::Text));
            }
        }
    }

    raw_text(row, index)
}

/// Reads a value as the server's text rendering.
fn raw_text(row: &PgRow, index: usize) -> Result<CellValue> {
    let value = row.try_get_raw(index).map_err(|e| {
        DbConduitError::query_failed(format!("Failed to read PostgreSQL column {}", index), e)
    })?;
    if value.is_null() {
        return Ok(CellValue::Null);
    }

    let type_name = value.type_info().name().to_string();
    if value.format() != PgValueFormat::Text {
        return Err(undecodable(index, &type_name, "binary value without a decoder".into()));
    }

    value
        .as_str()
        .map(|text| CellValue::Text(text.to_string()))
        .map_err(|e| undecodable(index, &type_name, e))
}

fn undecodable(index: usize, type_name: &str, error: sqlx::error::BoxDynError) -> DbConduitError {
    DbConduitError::query_failed(
        format!("Failed to decode PostgreSQL column {} ({})", index, type_name),
        sqlx::Error::Decode(error),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_postgresql_type() {
        assert_eq!(map_postgresql_type("BOOL"), CellType::Boolean);
        assert_eq!(map_postgresql_type("INT2"), CellType::Integer);
        assert_eq!(map_postgresql_type("INT8"), CellType::Integer);
        assert_eq!(map_postgresql_type("FLOAT8"), CellType::Float);
        assert_eq!(map_postgresql_type("NUMERIC"), CellType::Decimal);
        assert_eq!(map_postgresql_type("BYTEA"), CellType::Binary);
        assert_eq!(map_postgresql_type("DATE"), CellType::Date);
        assert_eq!(map_postgresql_type("TIME"), CellType::Time);
        assert_eq!(map_postgresql_type("TIMESTAMP"), CellType::DateTime);
        assert_eq!(map_postgresql_type("JSONB"), CellType::Json);
        assert_eq!(map_postgresql_type("VARCHAR"), CellType::Text);
        assert_eq!(map_postgresql_type("UUID"), CellType::Text);
        assert_eq!(map_postgresql_type("INT4[]"), CellType::Text);
        assert_eq!(map_postgresql_type("OID"), CellType::Integer);
        assert_eq!(map_postgresql_type("\"CHAR\""), CellType::Text);
        assert_eq!(map_postgresql_type("INTERVAL"), CellType::Text);
        assert_eq!(map_postgresql_type("INET"), CellType::Text);
    }
}
