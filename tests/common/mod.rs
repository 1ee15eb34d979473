//! Shared fixtures: a seeded SQLite file and a worker pool over it.

// each test binary uses its own subset of these helpers
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tempfile::TempDir;
use zero_query::sync::{Event, WorkerPool};
use zero_query::{CollectHandler, ConnectionRegistry, Opts, QueryRequest, QueryResult};

pub const ORDERS: i64 = 100;
pub const CUSTOMERS: i64 = 20;
pub const PRODUCTS: i64 = 30;
pub const EMPLOYEES: i64 = 5;

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub struct Fixture {
    pub pool: Arc<WorkerPool>,
    pub registry: Arc<ConnectionRegistry>,
    // keeps the database file alive
    _dir: TempDir,
}

fn run(registry: &ConnectionRegistry, sql: &str) {
    let handle = registry.thread_connection().unwrap();
    handle
        .with(|conn| conn.run(&QueryRequest::raw(sql), &mut CollectHandler::new()))
        .unwrap();
}

fn fill(registry: &ConnectionRegistry, table: &str, columns: &str, select: &str, rows: i64) {
    run(registry, &format!("CREATE TABLE {} ({})", table, columns));
    run(
        registry,
        &format!(
            "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < {}) \
             INSERT INTO {} SELECT {} FROM n",
            rows, table, select
        ),
    );
}

/// A database with `orders`, `customers`, `products` and `employees`.
///
/// `products.price` runs from 1.5 to 45.0 in steps of 1.5.
pub fn seeded(pool_size: usize) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shop.db");
    let registry = Arc::new(ConnectionRegistry::new(Opts::sqlite(
        path.to_string_lossy().into_owned(),
    )));

    registry.open().unwrap();
    fill(&registry, "orders", "id INTEGER PRIMARY KEY, amount REAL", "i, i * 2.5", ORDERS);
    fill(&registry, "customers", "id INTEGER PRIMARY KEY, name TEXT", "i, 'customer ' || i", CUSTOMERS);
    fill(&registry, "products", "id INTEGER PRIMARY KEY, price REAL", "i, i * 1.5", PRODUCTS);
    fill(&registry, "employees", "id INTEGER PRIMARY KEY, name TEXT", "i, 'employee ' || i", EMPLOYEES);
    registry.close_one(std::thread::current().id());

    let pool = Arc::new(WorkerPool::new(Arc::clone(&registry), pool_size).unwrap());
    Fixture {
        pool,
        registry,
        _dir: dir,
    }
}

pub const COUNT_QUERIES: [&str; 4] = [
    "SELECT COUNT(*) FROM orders",
    "SELECT COUNT(*) FROM customers",
    "SELECT COUNT(*) FROM products",
    "SELECT COUNT(*) FROM employees",
];

/// Wait for `n` completed results, skipping busy notifications.
pub fn next_results(rx: &Receiver<Event>, n: usize) -> Vec<QueryResult> {
    let mut results = Vec::with_capacity(n);
    while results.len() < n {
        match rx.recv_timeout(TIMEOUT).unwrap() {
            Event::ExecDone(result) => results.push(result),
            Event::BusyChanged(_) => {}
        }
    }
    results
}

/// Wait for the next busy notification, skipping results.
pub fn next_busy(rx: &Receiver<Event>) -> bool {
    loop {
        if let Event::BusyChanged(busy) = rx.recv_timeout(TIMEOUT).unwrap() {
            return busy;
        }
    }
}

pub fn single_int(result: &QueryResult) -> i64 {
    assert!(result.is_valid(), "unexpected error: {:?}", result.error());
    result.value(0, 0).unwrap().to_i64().unwrap()
}
