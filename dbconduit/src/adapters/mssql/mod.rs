//! SQL Server driver built on a single `tiberius` client.
//!
//! Integrated (trusted) authentication is only available on Windows. On
//! other platforms a trusted spec is rejected before any network I/O; set
//! `trusted = false` and supply credentials instead.

mod type_mapping;

pub use type_mapping::map_mssql_type;

use super::{Session, ddl, ddl::TableName};
use crate::{
    Result,
    connection::ConnectionSpec,
    error::DbConduitError,
    models::{CellType, CellValue, Dialect, QueryResult, ResultColumn},
};
use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config, ToSql};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

/// Open SQL Server connection.
pub struct SqlServerSession {
    client: Client<Compat<TcpStream>>,
}

impl SqlServerSession {
    /// Connects using the host, port, database and authentication mode of `spec`.
    ///
    /// # Errors
    /// Returns `UnsupportedFeature` for integrated authentication off
    /// Windows, and a `Connection` error if the server cannot be reached or
    /// rejects the login.
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let mut config = Config::new();
        config.host(spec.host());
        config.port(spec.effective_port());
        config.database(spec.database());
        config.authentication(authentication(spec)?);
        config.trust_cert();

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| {
                DbConduitError::connection_failed(format!("Failed to reach {}", spec), e)
            })?;
        tcp.set_nodelay(true).map_err(|e| {
            DbConduitError::connection_failed(format!("Failed to configure socket for {}", spec), e)
        })?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| {
                DbConduitError::connection_failed(format!("Failed to connect to {}", spec), e)
            })?;

        Ok(Self { client })
    }
}

fn authentication(spec: &ConnectionSpec) -> Result<AuthMethod> {
    if spec.uses_integrated_auth() {
        return integrated_authentication();
    }

    let credentials = spec.credentials();
    Ok(AuthMethod::sql_server(
        credentials.username(),
        credentials.password(),
    ))
}

#[cfg(windows)]
fn integrated_authentication() -> Result<AuthMethod> {
    Ok(AuthMethod::Integrated)
}

#[cfg(not(windows))]
fn integrated_authentication() -> Result<AuthMethod> {
    Err(DbConduitError::unsupported_feature(
        "Integrated authentication",
        "SQL Server on this platform (set trusted = false and provide credentials)",
    ))
}

#[async_trait]
impl Session for SqlServerSession {
    fn dialect(&self) -> Dialect {
        Dialect::MsSql
    }

    async fn fetch_all(&mut self, sql: &str) -> Result<QueryResult> {
        let mut stream = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| DbConduitError::query_failed("SQL Server query failed", e))?;

        // Metadata arrives before the rows, so empty results keep their columns
        let columns = stream
            .columns()
            .await
            .map_err(|e| DbConduitError::query_failed("Failed to read SQL Server columns", e))?
            .map(type_mapping::result_columns)
            .unwrap_or_default();

        let rows = stream
            .into_first_result()
            .await
            .map_err(|e| DbConduitError::query_failed("Failed to read SQL Server rows", e))?;

        let decoded = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(type_mapping::decode_column_data)
                    .collect()
            })
            .collect();

        QueryResult::new(columns, decoded)
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let done = self
            .client
            .execute(sql, &[])
            .await
            .map_err(|e| DbConduitError::query_failed("SQL Server statement failed", e))?;
        Ok(done.total())
    }

    async fn table_exists(&mut self, table: &TableName) -> Result<bool> {
        let qualified = table.quoted(Dialect::MsSql);
        let row = self
            .client
            .query(
                "SELECT CASE WHEN OBJECT_ID(@P1, N'U') IS NULL THEN 0 ELSE 1 END",
                &[&qualified],
            )
            .await
            .map_err(|e| {
                DbConduitError::query_failed(
                    format!("Failed to check whether table '{}' exists", table.name),
                    e,
                )
            })?
            .into_row()
            .await
            .map_err(|e| {
                DbConduitError::query_failed(
                    format!("Failed to check whether table '{}' exists", table.name),
                    e,
                )
            })?;

        Ok(row.and_then(|r| r.get::<i32, _>(0)).unwrap_or(0) == 1)
    }

    async fn insert_rows(
        &mut self,
        table: &TableName,
        columns: &[ResultColumn],
        rows: &[Vec<CellValue>],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut params: Vec<Box<dyn ToSql>> =
            Vec::with_capacity(rows.len().saturating_mul(columns.len()));
        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            let mut slots = Vec::with_capacity(columns.len());
            for (cell, column) in row.iter().zip(columns) {
                params.push(to_param(cell, column.data_type));
                slots.push(format!("@P{}", params.len()));
            }
            groups.push(format!("({})", slots.join(", ")));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            table.quoted(Dialect::MsSql),
            ddl::column_list(Dialect::MsSql, columns),
            groups.join(", ")
        );
        let refs: Vec<&dyn ToSql> = params.iter().map(|p| &**p).collect();

        let done = self.client.execute(sql, &refs).await.map_err(|e| {
            DbConduitError::query_failed(format!("Failed to insert rows into '{}'", table.name), e)
        })?;
        Ok(done.total())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client.close().await.map_err(|e| {
            DbConduitError::connection_failed("Failed to close SQL Server connection", e)
        })
    }
}

/// Converts a cell into an owned query parameter. Nulls carry the column's type.
fn to_param(cell: &CellValue, column_type: CellType) -> Box<dyn ToSql> {
    match cell {
        CellValue::Null => null_param(column_type),
        CellValue::Boolean(v) => Box::new(*v),
        CellValue::Integer(v) => Box::new(*v),
        CellValue::Float(v) => Box::new(*v),
        CellValue::Decimal(v) => Box::new(*v),
        CellValue::Text(v) => Box::new(v.clone()),
        CellValue::Binary(v) => Box::new(v.clone()),
        CellValue::Date(v) => Box::new(*v),
        CellValue::Time(v) => Box::new(*v),
        CellValue::DateTime(v) => Box::new(*v),
        CellValue::Json(v) => Box::new(v.to_string()),
    }
}

fn null_param(column_type: CellType) -> Box<dyn ToSql> {
    match column_type {
        CellType::Boolean => Box::new(None::<bool>),
        CellType::Integer => Box::new(None::<i64>),
        CellType::Float => Box::new(None::<f64>),
        CellType::Decimal => Box::new(None::<rust_decimal::Decimal>),
        CellType::Binary => Box::new(None::<Vec<u8>>),
        CellType::Date => Box::new(None::<chrono::NaiveDate>),
        CellType::Time => Box::new(None::<chrono::NaiveTime>),
        CellType::DateTime => Box::new(None::<chrono::NaiveDateTime>),
        CellType::Text | CellType::Json => Box::new(None::<String>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::Credentials;
    use tiberius::ColumnData;

    fn spec(trusted: bool) -> ConnectionSpec {
        ConnectionSpec::new(
            Dialect::MsSql,
            "localhost",
            "sales",
            Credentials::new("sa", "Passw0rd!"),
        )
        .with_trusted(trusted)
    }

    #[test]
    fn test_sql_server_authentication() {
        assert!(authentication(&spec(false)).is_ok());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_integrated_authentication_unavailable() {
        assert!(matches!(
            authentication(&spec(true)),
            Err(DbConduitError::UnsupportedFeature { .. })
        ));
    }

    #[test]
    fn test_null_params_are_typed() {
        assert!(matches!(
            null_param(CellType::Integer).to_sql(),
            ColumnData::I64(None)
        ));
        assert!(matches!(
            null_param(CellType::Json).to_sql(),
            ColumnData::String(None)
        ));
        assert!(matches!(
            null_param(CellType::Boolean).to_sql(),
            ColumnData::Bit(None)
        ));
    }

    #[test]
    fn test_json_param_is_serialized_text() {
        let param = to_param(&CellValue::Json(serde_json::json!({"a": 1})), CellType::Json);
        match param.to_sql() {
            ColumnData::String(Some(text)) => assert_eq!(text, r#"{"a":1}"#),
            other => panic!("unexpected parameter: {:?}", other),
        }
    }
}
