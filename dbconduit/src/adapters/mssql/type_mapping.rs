//! SQL Server column types to `CellType`, and cell decoding.

use crate::models::{CellType, CellValue, ResultColumn};
use tiberius::{Column, ColumnData, ColumnType, FromSql};

/// Maps a TDS column type to a `CellType`.
///
/// # Example
/// ```rust
/// use dbconduit::adapters::mssql::map_mssql_type;
/// use dbconduit::models::CellType;
/// use tiberius::ColumnType;
///
/// assert_eq!(map_mssql_type(ColumnType::Int4), CellType::Integer);
/// assert_eq!(map_mssql_type(ColumnType::NVarchar), CellType::Text);
/// ```
pub fn map_mssql_type(column_type: ColumnType) -> CellType {
    match column_type {
        ColumnType::Bit | ColumnType::Bitn => CellType::Boolean,
        ColumnType::Int1
        | ColumnType::Int2
        | ColumnType::Int4
        | ColumnType::Int8
        | ColumnType::Intn => CellType::Integer,
        ColumnType::Float4
        | ColumnType::Float8
        | ColumnType::Floatn
        | ColumnType::Money
        | ColumnType::Money4 => CellType::Float,
        ColumnType::Decimaln | ColumnType::Numericn => CellType::Decimal,
        ColumnType::Daten => CellType::Date,
        ColumnType::Timen => CellType::Time,
        ColumnType::Datetime
        | ColumnType::Datetime4
        | ColumnType::Datetimen
        | ColumnType::Datetime2
        | ColumnType::DatetimeOffsetn => CellType::DateTime,
        ColumnType::BigVarBin | ColumnType::BigBinary | ColumnType::Image => CellType::Binary,
        _ => CellType::Text,
    }
}

/// Builds the result columns from TDS column metadata.
pub(crate) fn result_columns(columns: &[Column]) -> Vec<ResultColumn> {
    columns
        .iter()
        .map(|c| ResultColumn::new(c.name(), map_mssql_type(c.column_type())))
        .collect()
}

fn from_sql_or_null<'a, T: FromSql<'a>>(
    data: &'a ColumnData<'static>,
    wrap: fn(T) -> CellValue,
) -> CellValue {
    match T::from_sql(data) {
        Ok(Some(value)) => wrap(value),
        Ok(None) => CellValue::Null,
        Err(e) => {
            tracing::debug!("Failed to decode SQL Server value: {}", e);
            CellValue::Null
        }
    }
}

/// Decodes one TDS value into a `CellValue`.
pub(crate) fn decode_column_data(data: ColumnData<'static>) -> CellValue {
    match data {
        ColumnData::U8(v) => v.map_or(CellValue::Null, |n| CellValue::Integer(i64::from(n))),
        ColumnData::I16(v) => v.map_or(CellValue::Null, |n| CellValue::Integer(i64::from(n))),
        ColumnData::I32(v) => v.map_or(CellValue::Null, |n| CellValue::Integer(i64::from(n))),
        ColumnData::I64(v) => v.map_or(CellValue::Null, CellValue::Integer),
        ColumnData::F32(v) => v.map_or(CellValue::Null, |n| CellValue::Float(f64::from(n))),
        ColumnData::F64(v) => v.map_or(CellValue::Null, CellValue::Float),
        ColumnData::Bit(v) => v.map_or(CellValue::Null, CellValue::Boolean),
        ColumnData::String(v) => v.map_or(CellValue::Null, |s| CellValue::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map_or(CellValue::Null, |g| CellValue::Text(g.to_string())),
        ColumnData::Binary(v) => v.map_or(CellValue::Null, |b| CellValue::Binary(b.into_owned())),
        ColumnData::Xml(v) => v.map_or(CellValue::Null, |x| {
            CellValue::Text(x.into_owned().into_string())
        }),
        ColumnData::Numeric(None) => CellValue::Null,
        ref numeric @ ColumnData::Numeric(Some(_)) => {
            from_sql_or_null::<rust_decimal::Decimal>(numeric, CellValue::Decimal)
        }
        ref value @ (ColumnData::DateTime(_)
        | ColumnData::SmallDateTime(_)
        | ColumnData::DateTime2(_)) => {
            from_sql_or_null::<chrono::NaiveDateTime>(value, CellValue::DateTime)
        }
        ref value @ ColumnData::DateTimeOffset(_) => {
            from_sql_or_null::<chrono::DateTime<chrono::Utc>>(value, |ts| {
                CellValue::DateTime(ts.naive_utc())
            })
        }
        ref value @ ColumnData::Date(_) => {
            from_sql_or_null::<chrono::NaiveDate>(value, CellValue::Date)
        }
        ref value @ ColumnData::Time(_) => {
            from_sql_or_null::<chrono::NaiveTime>(value, CellValue::Time)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn test_map_mssql_type() {
        assert_eq!(map_mssql_type(ColumnType::Bit), CellType::Boolean);
        assert_eq!(map_mssql_type(ColumnType::Int8), CellType::Integer);
        assert_eq!(map_mssql_type(ColumnType::Intn), CellType::Integer);
        assert_eq!(map_mssql_type(ColumnType::Money), CellType::Float);
        assert_eq!(map_mssql_type(ColumnType::Numericn), CellType::Decimal);
        assert_eq!(map_mssql_type(ColumnType::Daten), CellType::Date);
        assert_eq!(map_mssql_type(ColumnType::Timen), CellType::Time);
        assert_eq!(map_mssql_type(ColumnType::Datetime2), CellType::DateTime);
        assert_eq!(map_mssql_type(ColumnType::BigVarBin), CellType::Binary);
        assert_eq!(map_mssql_type(ColumnType::Guid), CellType::Text);
        assert_eq!(map_mssql_type(ColumnType::Xml), CellType::Text);
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode_column_data(ColumnData::I32(Some(7))), CellValue::Integer(7));
        assert_eq!(decode_column_data(ColumnData::U8(Some(255))), CellValue::Integer(255));
        assert_eq!(decode_column_data(ColumnData::Bit(Some(true))), CellValue::Boolean(true));
        assert_eq!(decode_column_data(ColumnData::F64(Some(1.5))), CellValue::Float(1.5));
        assert_eq!(
            decode_column_data(ColumnData::String(Some(Cow::Borrowed("abc")))),
            CellValue::Text("abc".to_string())
        );
        assert_eq!(
            decode_column_data(ColumnData::Binary(Some(Cow::Owned(vec![1, 2])))),
            CellValue::Binary(vec![1, 2])
        );
    }

    #[test]
    fn test_decode_nulls() {
        assert!(decode_column_data(ColumnData::I64(None)).is_null());
        assert!(decode_column_data(ColumnData::String(None)).is_null());
        assert!(decode_column_data(ColumnData::Numeric(None)).is_null());
        assert!(decode_column_data(ColumnData::DateTime2(None)).is_null());
        assert!(decode_column_data(ColumnData::Date(None)).is_null());
    }
}
