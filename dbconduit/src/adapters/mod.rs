//! Query and write execution against the supported databases.
//!
//! Every call opens exactly one connection, performs its work and closes
//! the connection before returning, whether the work succeeded or not.
//! There is no pooling and no retry: a failure is surfaced to the caller
//! after the connection has been released.
//!
//! # Module Structure
//! - `ddl`: identifier quoting, table DDL and insert batch sizing
//! - Dialect drivers (`mysql`, `postgres`, `mssql`), each feature-gated

use crate::{
    Result,
    connection::ConnectionSpec,
    error::DbConduitError,
    models::{CellValue, Dialect, IfTableExists, QueryResult, ResultColumn},
};
use async_trait::async_trait;

pub mod ddl;

#[cfg(feature = "mysql")]
pub mod mysql;

#[cfg(feature = "postgresql")]
pub mod postgres;

#[cfg(feature = "mssql")]
pub mod mssql;

use ddl::TableName;

/// One open database connection.
///
/// Implementations own a single driver connection. [`Session::close`]
/// consumes the session so a closed connection cannot be reused.
#[async_trait]
pub trait Session: Send {
    /// Dialect spoken by this session.
    fn dialect(&self) -> Dialect;

    /// Runs `sql` and materializes every row.
    ///
    /// # Errors
    /// Returns `QueryExecution` if the server rejects the statement.
    async fn fetch_all(&mut self, sql: &str) -> Result<QueryResult>;

    /// Runs a statement that returns no rows, yielding the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Checks whether `table` exists in the connected database.
    async fn table_exists(&mut self, table: &TableName) -> Result<bool>;

    /// Inserts one batch of rows and returns the number of rows written.
    ///
    /// Callers size batches with [`ddl::rows_per_batch`].
    async fn insert_rows(
        &mut self,
        table: &TableName,
        columns: &[ResultColumn],
        rows: &[Vec<CellValue>],
    ) -> Result<u64>;

    /// Closes the underlying connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens a session for `spec`.
///
/// # Errors
/// Returns error if:
/// - The spec fails validation
/// - The dialect's driver was not compiled in
/// - The server cannot be reached or rejects the credentials
pub async fn connect(spec: &ConnectionSpec) -> Result<Box<dyn Session>> {
    spec.validate()?;
    tracing::debug!("Opening connection to {}", spec);

    match spec.dialect() {
        #[cfg(feature = "mysql")]
        Dialect::MySql => Ok(Box::new(mysql::MySqlSession::connect(spec).await?)),
        #[cfg(not(feature = "mysql"))]
        Dialect::MySql => Err(DbConduitError::unsupported_feature(
            "MySQL driver",
            "this build (enable the `mysql` feature)",
        )),
        #[cfg(feature = "postgresql")]
        Dialect::PostgreSql => Ok(Box::new(postgres::PostgresSession::connect(spec).await?)),
        #[cfg(not(feature = "postgresql"))]
        Dialect::PostgreSql => Err(DbConduitError::unsupported_feature(
            "PostgreSQL driver",
            "this build (enable the `postgresql` feature)",
        )),
        #[cfg(feature = "mssql")]
        Dialect::MsSql => Ok(Box::new(mssql::SqlServerSession::connect(spec).await?)),
        #[cfg(not(feature = "mssql"))]
        Dialect::MsSql => Err(DbConduitError::unsupported_feature(
            "SQL Server driver",
            "this build (enable the `mssql` feature)",
        )),
    }
}

/// Closes a session, logging instead of failing when the close itself errors.
async fn release(session: Box<dyn Session>) {
    let dialect = session.dialect();
    match session.close().await {
        Ok(()) => tracing::debug!("Closed {} connection", dialect),
        Err(e) => tracing::warn!("Failed to close {} connection cleanly: {}", dialect, e),
    }
}

/// Executes `sql` on a fresh connection and returns every row.
///
/// The connection is closed before this function returns, including when
/// the query fails.
///
/// # Errors
/// Returns connection errors from [`connect`] and `QueryExecution` errors
/// from the server.
pub async fn execute_query(spec: &ConnectionSpec, sql: &str) -> Result<QueryResult> {
    let outcome = query_scoped(connect(spec).await?, sql).await;

    if let Ok(result) = &outcome {
        tracing::debug!(
            "Query on {} returned {} rows in {} columns",
            spec,
            result.row_count(),
            result.columns().len()
        );
    }
    outcome
}

/// Writes `result` into `table` on a fresh connection.
///
/// `if_exists` decides what happens when the table is already present:
/// `Append` inserts into it, `Replace` drops and recreates it, `Fail`
/// returns `TableExists`. Missing tables are created from the result's
/// column types. The connection is closed before returning.
///
/// # Returns
/// Number of rows inserted.
///
/// # Errors
/// Returns error if the table name is invalid, the result has no columns,
/// the table exists under `Fail`, or any statement fails.
pub async fn write_table(
    spec: &ConnectionSpec,
    result: &QueryResult,
    table: &str,
    if_exists: IfTableExists,
) -> Result<u64> {
    let table = TableName::parse(table)?;
    if result.columns().is_empty() {
        return Err(DbConduitError::invalid_result(
            "cannot write a result without columns",
        ));
    }

    let outcome = write_scoped(connect(spec).await?, result, &table, if_exists).await;

    if let Ok(written) = &outcome {
        tracing::debug!(
            "Wrote {} rows to {} on {} ({})",
            written,
            table.name,
            spec,
            if_exists
        );
    }
    outcome
}

/// Runs `sql` on `session`, then releases it whatever the outcome.
async fn query_scoped(mut session: Box<dyn Session>, sql: &str) -> Result<QueryResult> {
    let outcome = session.fetch_all(sql).await;
    release(session).await;
    outcome
}

/// Writes `result` through `session`, then releases it whatever the outcome.
async fn write_scoped(
    mut session: Box<dyn Session>,
    result: &QueryResult,
    table: &TableName,
    if_exists: IfTableExists,
) -> Result<u64> {
    let outcome = write_with_policy(session.as_mut(), result, table, if_exists).await;
    release(session).await;
    outcome
}

async fn write_with_policy(
    session: &mut dyn Session,
    result: &QueryResult,
    table: &TableName,
    if_exists: IfTableExists,
) -> Result<u64> {
    let dialect = session.dialect();
    let exists = session.table_exists(table).await?;

    match (if_exists, exists) {
        (IfTableExists::Fail, true) => {
            return Err(DbConduitError::table_exists(table.to_string()));
        }
        (IfTableExists::Replace, true) => {
            session.execute(&ddl::drop_table_sql(dialect, table)).await?;
            session
                .execute(&ddl::create_table_sql(dialect, table, result.columns()))
                .await?;
        }
        (IfTableExists::Append, true) => {}
        (_, false) => {
            session
                .execute(&ddl::create_table_sql(dialect, table, result.columns()))
                .await?;
        }
    }

    let batch = ddl::rows_per_batch(dialect, result.columns().len());
    let mut written = 0u64;
    for rows in result.rows().chunks(batch) {
        let inserted = session.insert_rows(table, result.columns(), rows).await?;
        written = written.saturating_add(inserted);
    }
    Ok(written)
}
