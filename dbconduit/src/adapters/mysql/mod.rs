//! MySQL driver built on a single, unpooled `sqlx` connection.

mod type_mapping;

pub use type_mapping::map_mysql_type;

use super::{Session, ddl, ddl::TableName};
use crate::{
    Result,
    connection::ConnectionSpec,
    error::DbConduitError,
    models::{CellType, CellValue, Dialect, QueryResult, ResultColumn},
};
use async_trait::async_trait;
use sqlx::{
    ConnectOptions, Connection, Executor, MySql, MySqlConnection, QueryBuilder, Row,
    mysql::MySqlConnectOptions, query_builder::Separated,
};

/// Open MySQL connection.
pub struct MySqlSession {
    conn: MySqlConnection,
}

impl MySqlSession {
    /// Connects using the host, port, credentials and database of `spec`.
    ///
    /// # Errors
    /// Returns a `Connection` error naming the server, never the credentials.
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(spec.host())
            .port(spec.effective_port())
            .username(spec.credentials().username())
            .password(spec.credentials().password())
            .database(spec.database());

        let conn = options.connect().await.map_err(|e| {
            DbConduitError::connection_failed(format!("Failed to connect to {}", spec), e)
        })?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl Session for MySqlSession {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn fetch_all(&mut self, sql: &str) -> Result<QueryResult> {
        let rows = sqlx::query(sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| DbConduitError::query_failed("MySQL query failed", e))?;

        let columns = match rows.first() {
            Some(row) => type_mapping::result_columns(row.columns()),
            // No rows: column metadata comes from the statement description
            None => match (&mut self.conn).describe(sql).await {
                Ok(description) => type_mapping::result_columns(description.columns()),
                Err(e) => {
                    tracing::debug!("Could not describe empty MySQL result: {}", e);
                    Vec::new()
                }
            },
        };

        type_mapping::rows_to_result(columns, &rows)
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let done = sqlx::query(sql)
            .execute(&mut self.conn)
            .await
            .map_err(|e| DbConduitError::query_failed("MySQL statement failed", e))?;
        Ok(done.rows_affected())
    }

    async fn table_exists(&mut self, table: &TableName) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_schema = COALESCE(?, DATABASE()) AND table_name = ?",
        )
        .bind(table.schema.as_deref())
        .bind(table.name.as_str())
        .fetch_one(&mut self.conn)
        .await
        .map_err(|e| {
            DbConduitError::query_failed(
                format!("Failed to check whether table '{}' exists", table.name),
                e,
            )
        })?;

        Ok(count > 0)
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

        let mut builder = QueryBuilder::<MySql>::new(format!(
            "INSERT INTO {} ({}) ",
            table.quoted(Dialect::MySql),
            ddl::column_list(Dialect::MySql, columns)
        ));
        builder.push_values(rows, |mut values, row| {
            for (cell, column) in row.iter().zip(columns) {
                bind_cell(&mut values, cell, column.data_type);
            }
        });

        let done = builder
            .build()
            .execute(&mut self.conn)
            .await
            .map_err(|e| {
                DbConduitError::query_failed(
                    format!("Failed to insert rows into '{}'", table.name),
                    e,
                )
            })?;
        Ok(done.rows_affected())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| DbConduitError::connection_failed("Failed to close MySQL connection", e))
    }
}

fn bind_cell<'qb, 'args: 'qb>(
    values: &mut Separated<'qb, 'args, MySql, &'static str>,
    cell: &CellValue,
    column_type: CellType,
) {
    match cell {
        CellValue::Null => bind_null(values, column_type),
        CellValue::Boolean(v) => {
            values.push_bind(*v);
        }
        CellValue::Integer(v) => {
            values.push_bind(*v);
        }
        CellValue::Float(v) => {
            values.push_bind(*v);
        }
        CellValue::Decimal(v) => {
            values.push_bind(*v);
        }
        CellValue::Text(v) => {
            values.push_bind(v.clone());
        }
        CellValue::Binary(v) => {
            values.push_bind(v.clone());
        }
        CellValue::Date(v) => {
            values.push_bind(*v);
        }
        CellValue::Time(v) => {
            values.push_bind(*v);
        }
        CellValue::DateTime(v) => {
            values.push_bind(*v);
        }
        CellValue::Json(v) => {
            values.push_bind(v.clone());
        }
    }
}

fn bind_null<'qb, 'args: 'qb>(
    values: &mut Separated<'qb, 'args, MySql, &'static str>,
    column_type: CellType,
) {
    match column_type {
        CellType::Boolean => {
            values.push_bind(None::<bool>);
        }
        CellType::Integer => {
            values.push_bind(None::<i64>);
        }
        CellType::Float => {
            values.push_bind(None::<f64>);
        }
        CellType::Decimal => {
            values.push_bind(None::<rust_decimal::Decimal>);
        }
        CellType::Binary => {
            values.push_bind(None::<Vec<u8>>);
        }
        CellType::Date => {
            values.push_bind(None::<chrono::NaiveDate>);
        }
        CellType::Time => {
            values.push_bind(None::<chrono::NaiveTime>);
        }
        CellType::DateTime => {
            values.push_bind(None::<chrono::NaiveDateTime>);
        }
        CellType::Text | CellType::Json => {
            values.push_bind(None::<String>);
        }
    }
}
