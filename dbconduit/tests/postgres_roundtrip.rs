//! PostgreSQL query and write round trips against a container.
//!
//! These tests need Docker: `cargo test -- --ignored`.

#![cfg(feature = "postgresql")]

use dbconduit::{
    CellType, CellValue, ConnectionSpec, Credentials, DbConduitError, Dialect, IfTableExists,
    QueryResult, ResultColumn, Result, execute_query, write_table,
};
use std::time::Duration;
use testcontainers_modules::{postgres::Postgres, testcontainers::runners::AsyncRunner};

/// Helper function to wait for PostgreSQL to be ready
async fn wait_for_postgres_ready(spec: &ConnectionSpec, max_attempts: u32) -> Result<()> {
    let mut last_error = None;
    for _ in 0..max_attempts {
        match execute_query(spec, "SELECT 1").await {
            Ok(_) => return Ok(()),
            Err(e) => last_error = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    Err(last_error.unwrap_or_else(|| DbConduitError::configuration("no attempts made")))
}

fn spec(port: u16) -> ConnectionSpec {
    ConnectionSpec::new(
        Dialect::PostgreSql,
        "127.0.0.1",
        "postgres",
        Credentials::new("postgres", "postgres"),
    )
    .with_port(port)
}

fn orders(rows: &[(i64, &str, Option<f64>)]) -> QueryResult {
    QueryResult::new(
        vec![
            ResultColumn::new("id", CellType::Integer),
            ResultColumn::new("customer", CellType::Text),
            ResultColumn::new("total", CellType::Float),
        ],
        rows.iter()
            .map(|(id, customer, total)| {
                vec![
                    CellValue::Integer(*id),
                    CellValue::Text((*customer).to_string()),
                    total.map_or(CellValue::Null, CellValue::Float),
                ]
            })
            .collect(),
    )
    .unwrap()
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_roundtrip_write_policies() -> Result<()> {
    let postgres = Postgres::default().start().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();
    let spec = spec(port);
    wait_for_postgres_ready(&spec, 30).await?;

    let first = orders(&[(1, "ada", Some(10.5)), (2, "grace", None)]);
    assert_eq!(write_table(&spec, &first, "orders", IfTableExists::Fail).await?, 2);

    // Fail leaves the existing table untouched
    let err = write_table(&spec, &first, "orders", IfTableExists::Fail)
        .await
        .unwrap_err();
    assert!(matches!(err, DbConduitError::TableExists { .. }));

    let second = orders(&[(3, "linus", Some(1.0))]);
    write_table(&spec, &second, "orders", IfTableExists::Append).await?;

    let all = execute_query(&spec, "SELECT id, customer, total FROM orders ORDER BY id").await?;
    assert_eq!(all.row_count(), 3);
    assert_eq!(all.columns()[0].data_type, CellType::Integer);
    assert_eq!(all.rows()[1][2], CellValue::Null);
    assert_eq!(all.rows()[2][1], CellValue::Text("linus".to_string()));

    write_table(&spec, &second, "orders", IfTableExists::Replace).await?;
    let replaced = execute_query(&spec, "SELECT id FROM orders").await?;
    assert_eq!(replaced.row_count(), 1);
    assert_eq!(replaced.rows()[0][0], CellValue::Integer(3));

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_roundtrip_empty_result_keeps_columns() -> Result<()> {
    let postgres = Postgres::default().start().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();
    let spec = spec(port);
    wait_for_postgres_ready(&spec, 30).await?;

    let result = execute_query(
        &spec,
        "SELECT 1::int4 AS id, 'x'::text AS label, now() AS seen WHERE false",
    )
    .await?;

    assert!(result.is_empty());
    assert_eq!(result.columns().len(), 3);
    assert_eq!(result.columns()[0].data_type, CellType::Integer);
    assert_eq!(result.columns()[2].data_type, CellType::DateTime);

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_roundtrip_query_error_is_reported() -> Result<()> {
    let postgres = Postgres::default().start().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();
    let spec = spec(port);
    wait_for_postgres_ready(&spec, 30).await?;

    let err = execute_query(&spec, "SELECT * FROM missing_table")
        .await
        .unwrap_err();
    assert!(matches!(err, DbConduitError::QueryExecution { .. }));

    // The failed call released its connection; the next one still works
    assert_eq!(execute_query(&spec, "SELECT 1").await?.row_count(), 1);

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_roundtrip_types_without_native_cells_keep_values() -> Result<()> {
    let postgres = Postgres::default().start().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();
    let spec = spec(port);
    wait_for_postgres_ready(&spec, 30).await?;

    let result = execute_query(
        &spec,
        "SELECT 16384::oid AS o, '1 day'::interval AS i, ARRAY[1,2] AS a, \
         '10.0.0.1'::inet AS n, 'x'::\"char\" AS c, '12:00+02'::timetz AS t, \
         NULL::interval AS missing",
    )
    .await?;

    let row = &result.rows()[0];
    assert_eq!(result.columns()[0].data_type, CellType::Integer);
    assert_eq!(row[0], CellValue::Integer(16384));
    assert_eq!(row[1], CellValue::Text("1 day".to_string()));
    assert_eq!(row[2], CellValue::Text("{1,2}".to_string()));
    assert_eq!(row[3], CellValue::Text("10.0.0.1".to_string()));
    assert_eq!(row[4], CellValue::Text("x".to_string()));
    assert_eq!(row[5], CellValue::Text("12:00:00+02".to_string()));
    assert_eq!(row[6], CellValue::Null);

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_roundtrip_native_cells_from_text_rows() -> Result<()> {
    let postgres = Postgres::default().start().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();
    let spec = spec(port);
    wait_for_postgres_ready(&spec, 30).await?;

    let result = execute_query(
        &spec,
        "SELECT true AS flag, 12.50::numeric AS amount, '\\xdead'::bytea AS raw, \
         DATE '2024-02-29' AS day, TIMESTAMP '2024-02-29 10:30:00' AS seen, \
         '{\"k\": 1}'::jsonb AS doc",
    )
    .await?;

    let row = &result.rows()[0];
    assert_eq!(row[0], CellValue::Boolean(true));
    assert_eq!(row[1], CellValue::Decimal(rust_decimal::Decimal::new(1250, 2)));
    assert_eq!(row[2], CellValue::Binary(vec![0xde, 0xad]));
    assert_eq!(
        row[3],
        CellValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
    );
    assert_eq!(
        row[4],
        CellValue::DateTime(
            chrono::NaiveDate::from_ymd_opt(2024, 2, 29)
                .unwrap()
                .and_hms_opt(10, 30, 0)
                .unwrap()
        )
    );
    assert_eq!(row[5], CellValue::Json(serde_json::json!({"k": 1})));

    Ok(())
}
