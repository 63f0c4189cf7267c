//! Synchronous wrappers around the async executor.
//!
//! Each call builds a current-thread runtime, drives one executor call to
//! completion and drops the runtime. Calls made from inside a tokio
//! runtime are rejected with a configuration error; use
//! [`crate::adapters`] there instead.

use crate::{
    Result,
    adapters,
    connection::ConnectionSpec,
    error::DbConduitError,
    models::{IfTableExists, QueryResult},
};
use std::future::Future;

fn block_on<F: Future>(future: F) -> Result<F::Output> {
    // Nesting runtimes panics inside tokio
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(DbConduitError::configuration(
            "Blocking calls cannot run inside an async runtime; use the async executor",
        ));
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|source| DbConduitError::Io {
            context: "Failed to start the blocking runtime".to_string(),
            source,
        })?;

    Ok(runtime.block_on(future))
}

/// Blocking form of [`adapters::execute_query`].
///
/// # Errors
/// Returns `Configuration` when called from inside a tokio runtime, `Io`
/// if the runtime cannot start, otherwise whatever the query returns.
pub fn execute_query(spec: &ConnectionSpec, sql: &str) -> Result<QueryResult> {
    block_on(adapters::execute_query(spec, sql))?
}

/// Blocking form of [`adapters::write_table`].
///
/// # Errors
/// Returns `Configuration` when called from inside a tokio runtime, `Io`
/// if the runtime cannot start, otherwise whatever the write returns.
pub fn write_table(
    spec: &ConnectionSpec,
    result: &QueryResult,
    table: &str,
    if_exists: IfTableExists,
) -> Result<u64> {
    block_on(adapters::write_table(spec, result, table, if_exists))?
}
