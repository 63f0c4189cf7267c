//! Dialect-specific SQL text: identifier quoting, table DDL and batch sizing.

use crate::{
    Result,
    error::DbConduitError,
    models::{CellType, Dialect, ResultColumn},
};

/// Parameter ceiling per statement for SQL Server.
const MSSQL_MAX_PARAMS: usize = 2_100;
/// Row ceiling for a single SQL Server `VALUES` list.
const MSSQL_MAX_ROWS: usize = 1_000;
/// Bind parameter ceiling shared by MySQL and PostgreSQL.
const SQLX_MAX_PARAMS: usize = 65_535;
/// Upper bound on rows per insert batch.
const MAX_BATCH_ROWS: usize = 5_000;

/// A possibly schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub schema: Option<String>,
    pub name: String,
}

impl TableName {
    /// Parses `table` or `schema.table`.
    ///
    /// # Errors
    /// Returns a configuration error for empty parts or more than one dot.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split('.').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(DbConduitError::configuration(format!(
                "Invalid table name '{}'",
                raw
            )));
        }

        match parts.as_slice() {
            [name] => Ok(Self {
                schema: None,
                name: (*name).to_string(),
            }),
            [schema, name] => Ok(Self {
                schema: Some((*schema).to_string()),
                name: (*name).to_string(),
            }),
            _ => Err(DbConduitError::configuration(format!(
                "Invalid table name '{}': expected 'table' or 'schema.table'",
                raw
            ))),
        }
    }

    /// Quoted, dialect-correct reference to the table.
    pub fn quoted(&self, dialect: Dialect) -> String {
        match &self.schema {
            Some(schema) => format!(
                "{}.{}",
                quote_identifier(dialect, schema),
                quote_identifier(dialect, &self.name)
            ),
            None => quote_identifier(dialect, &self.name),
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Quotes an identifier, doubling any embedded closing quote.
pub fn quote_identifier(dialect: Dialect, ident: &str) -> String {
    match dialect {
        Dialect::MySql => format!("`{}`", ident.replace('`', "``")),
        Dialect::PostgreSql => format!("\"{}\"", ident.replace('"', "\"\"")),
        Dialect::MsSql => format!("[{}]", ident.replace(']', "]]")),
    }
}

/// Column type used when creating a table for a result column.
pub fn column_type_sql(dialect: Dialect, cell_type: CellType) -> &'static str {
    match dialect {
        Dialect::MySql => match cell_type {
            CellType::Boolean => "BOOLEAN",
            CellType::Integer => "BIGINT",
            CellType::Float => "DOUBLE",
            CellType::Decimal => "DECIMAL(38, 10)",
            CellType::Text => "LONGTEXT",
            CellType::Binary => "LONGBLOB",
            CellType::Date => "DATE",
            CellType::Time => "TIME(6)",
            CellType::DateTime => "DATETIME(6)",
            CellType::Json => "JSON",
        },
        Dialect::PostgreSql => match cell_type {
            CellType::Boolean => "BOOLEAN",
            CellType::Integer => "BIGINT",
            CellType::Float => "DOUBLE PRECISION",
            CellType::Decimal => "NUMERIC",
            CellType::Text => "TEXT",
            CellType::Binary => "BYTEA",
            CellType::Date => "DATE",
            CellType::Time => "TIME",
            CellType::DateTime => "TIMESTAMP",
            CellType::Json => "JSONB",
        },
        Dialect::MsSql => match cell_type {
            CellType::Boolean => "BIT",
            CellType::Integer => "BIGINT",
            CellType::Float => "FLOAT",
            CellType::Decimal => "DECIMAL(38, 10)",
            CellType::Text | CellType::Json => "NVARCHAR(MAX)",
            CellType::Binary => "VARBINARY(MAX)",
            CellType::Date => "DATE",
            CellType::Time => "TIME",
            CellType::DateTime => "DATETIME2",
        },
    }
}

/// `CREATE TABLE` statement with one nullable column per result column.
pub fn create_table_sql(dialect: Dialect, table: &TableName, columns: &[ResultColumn]) -> String {
    let column_defs: Vec<String> = columns
        .iter()
        .map(|c| {
            format!(
                "{} {}",
                quote_identifier(dialect, &c.name),
                column_type_sql(dialect, c.data_type)
            )
        })
        .collect();

    format!(
        "CREATE TABLE {} ({})",
        table.quoted(dialect),
        column_defs.join(", ")
    )
}

/// `DROP TABLE` statement. Only issued after the table was seen to exist.
pub fn drop_table_sql(dialect: Dialect, table: &TableName) -> String {
    format!("DROP TABLE {}", table.quoted(dialect))
}

/// Quoted, comma-separated column list.
pub fn column_list(dialect: Dialect, columns: &[ResultColumn]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(dialect, &c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Number of rows that fit in one insert statement.
pub fn rows_per_batch(dialect: Dialect, column_count: usize) -> usize {
    let columns = column_count.max(1);
    let by_params = match dialect {
        Dialect::MsSql => MSSQL_MAX_PARAMS.saturating_sub(1).checked_div(columns),
        Dialect::MySql | Dialect::PostgreSql => SQLX_MAX_PARAMS.checked_div(columns),
    }
    .unwrap_or(1);
    let row_cap = match dialect {
        Dialect::MsSql => MSSQL_MAX_ROWS,
        Dialect::MySql | Dialect::PostgreSql => MAX_BATCH_ROWS,
    };
    by_params.clamp(1, row_cap)
}
