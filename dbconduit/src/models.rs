//! Data models shared by the builder, the executor and the facade.
//!
//! All types are serializable so query results can be handed to JSON
//! consumers without an intermediate representation.

use crate::error::DbConduitError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    MsSql,
    MySql,
    PostgreSql,
}

impl Dialect {
    /// Names accepted by [`Dialect::parse`], in the order reported to callers.
    pub const SUPPORTED_NAMES: &'static [&'static str] =
        &["mssql", "mysql", "postgresql", "postgres"];

    /// Parses a dialect name case-insensitively.
    ///
    /// `postgres` is accepted as an alias of `postgresql`.
    ///
    /// # Errors
    /// Returns `UnsupportedDialect` listing [`Dialect::SUPPORTED_NAMES`].
    pub fn parse(name: &str) -> crate::Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "mssql" => Ok(Self::MsSql),
            "mysql" => Ok(Self::MySql),
            "postgresql" | "postgres" => Ok(Self::PostgreSql),
            other => Err(DbConduitError::unsupported_dialect(
                other,
                Self::SUPPORTED_NAMES,
            )),
        }
    }

    /// URL scheme of the connection descriptor.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::MsSql => "mssql",
            Self::MySql => "mysql",
            Self::PostgreSql => "postgresql",
        }
    }

    /// Driver token appended to the scheme (`scheme+driver://`).
    pub fn driver(self) -> &'static str {
        match self {
            Self::MsSql => "tiberius",
            Self::MySql | Self::PostgreSql => "sqlx",
        }
    }

    /// Well-known server port.
    pub fn default_port(self) -> u16 {
        match self {
            Self::MsSql => 1433,
            Self::MySql => 3306,
            Self::PostgreSql => 5432,
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = DbConduitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::MsSql => write!(f, "SQL Server"),
            Dialect::MySql => write!(f, "MySQL"),
            Dialect::PostgreSql => write!(f, "PostgreSQL"),
        }
    }
}

/// What to do when the target table of a write already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IfTableExists {
    /// Insert into the existing table, creating it when missing
    #[default]
    Append,
    /// Drop and recreate the table from the result's columns
    Replace,
    /// Refuse to write
    Fail,
}

impl IfTableExists {
    /// Lowercase policy name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Replace => "replace",
            Self::Fail => "fail",
        }
    }
}

impl std::str::FromStr for IfTableExists {
    type Err = DbConduitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "replace" => Ok(Self::Replace),
            "fail" => Ok(Self::Fail),
            other => Err(DbConduitError::configuration(format!(
                "Unknown table policy '{}'. Expected one of: append, replace, fail",
                other
            ))),
        }
    }
}

impl std::fmt::Display for IfTableExists {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical column type of a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    Boolean,
    Integer,
    Float,
    Decimal,
    Text,
    Binary,
    Date,
    Time,
    DateTime,
    Json,
}

/// A single typed cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Binary(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Json(serde_json::Value),
}

impl CellValue {
    /// Type of the value, `None` for `Null`.
    pub fn cell_type(&self) -> Option<CellType> {
        match self {
            CellValue::Null => None,
            CellValue::Boolean(_) => Some(CellType::Boolean),
            CellValue::Integer(_) => Some(CellType::Integer),
            CellValue::Float(_) => Some(CellType::Float),
            CellValue::Decimal(_) => Some(CellType::Decimal),
            CellValue::Text(_) => Some(CellType::Text),
            CellValue::Binary(_) => Some(CellType::Binary),
            CellValue::Date(_) => Some(CellType::Date),
            CellValue::Time(_) => Some(CellType::Time),
            CellValue::DateTime(_) => Some(CellType::DateTime),
            CellValue::Json(_) => Some(CellType::Json),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

/// Named, typed result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    pub name: String,
    pub data_type: CellType,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, data_type: CellType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Materialized tabular result: named columns and ordered rows.
///
/// Every row has exactly one cell per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    columns: Vec<ResultColumn>,
    rows: Vec<Vec<CellValue>>,
}

impl QueryResult {
    /// Creates a result from columns and rows.
    ///
    /// # Errors
    /// Returns `InvalidResult` if any row width differs from the column count
    /// or if two columns share a name.
    pub fn new(columns: Vec<ResultColumn>, rows: Vec<Vec<CellValue>>) -> crate::Result<Self> {
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(DbConduitError::invalid_result(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }

        let mut result = Self {
            columns,
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            result.push_row(row)?;
        }
        Ok(result)
    }

    /// Creates a result with columns and no rows.
    pub fn empty(columns: Vec<ResultColumn>) -> crate::Result<Self> {
        Self::new(columns, Vec::new())
    }

    /// Appends a row.
    ///
    /// # Errors
    /// Returns `InvalidResult` if the row width differs from the column count.
    pub fn push_row(&mut self, row: Vec<CellValue>) -> crate::Result<()> {
        if row.len() != self.columns.len() {
            return Err(DbConduitError::invalid_result(format!(
                "row {} has {} cells, expected {}",
                self.rows.len(),
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<&CellValue>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }
}
