//! PostgreSQL-backed tests. Run with `DATABASE_URL` pointing at a server:
//!
//! ```text
//! DATABASE_URL=postgres://postgres@localhost/postgres cargo test --features postgres -- --ignored
//! ```

#![cfg(feature = "postgres")]

mod common;

use std::env;
use std::sync::Arc;

use common::{next_results, single_int};
use zero_query::sync::{Mode, QueryScheduler, WorkerPool};
use zero_query::{ConnectionRegistry, DbErrorKind, Driver, NumericalPrecisionPolicy, Value};

fn pool(precision: Option<&str>) -> Arc<WorkerPool> {
    let mut db_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/postgres".to_string());
    if let Some(precision) = precision {
        db_url.push_str(if db_url.contains('?') { "&" } else { "?" });
        db_url.push_str("precision=");
        db_url.push_str(precision);
    }
    let registry = Arc::new(ConnectionRegistry::from_url(&db_url).unwrap());
    assert_eq!(registry.driver(), Driver::Postgres);
    Arc::new(WorkerPool::new(registry, 2).unwrap())
}

#[test]
#[ignore]
fn test_named_parameters() {
    let mut scheduler = QueryScheduler::new(pool(None));
    scheduler.set_mode(Mode::Fifo);
    let rx = scheduler.subscribe();

    scheduler.prepare("SELECT :a::int8 + :b::int8, :a::int8 * 2, :label::text");
    scheduler.bind_value("a", 40);
    scheduler.bind_value("b", 2);
    scheduler.bind_value("label", "x");
    scheduler.start_exec().unwrap();

    let result = next_results(&rx, 1).remove(0);
    assert_eq!(single_int(&result), 42);
    assert_eq!(result.value(0, 1), Some(&Value::Int(80)));
    assert_eq!(result.value(0, 2), Some(&Value::Text("x".into())));
    assert_eq!(result.columns()[2].type_name.as_deref(), Some("text"));
}

#[test]
#[ignore]
fn test_numeric_precision() {
    let scheduler = QueryScheduler::new(pool(Some("high")));
    assert_eq!(
        scheduler.pool().registry().numerical_precision_policy(),
        NumericalPrecisionPolicy::HighPrecision
    );
    let rx = scheduler.subscribe();
    scheduler
        .start_exec_sql("SELECT 12345.678900::numeric, NULL::numeric")
        .unwrap();

    let result = next_results(&rx, 1).remove(0);
    assert_eq!(result.value(0, 0), Some(&Value::Text("12345.678900".into())));
    assert_eq!(result.value(0, 1), Some(&Value::Null));
}

#[test]
#[ignore]
fn test_statement_error_carries_sqlstate() {
    let scheduler = QueryScheduler::new(pool(None));
    let rx = scheduler.subscribe();
    scheduler.start_exec_sql("SELECT * FROM no_such_table").unwrap();

    let result = next_results(&rx, 1).remove(0);
    let error = result.error().unwrap();
    assert_eq!(error.kind, DbErrorKind::Statement);
    assert_eq!(error.code.as_deref(), Some("42P01"));
}
