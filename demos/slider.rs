//! Example: re-running a query while a value changes
//!
//! Simulates a price slider: every step re-binds `:price` and restarts the
//! query. In SkipPrevious mode only the newest pending value runs, so a fast
//! slider never builds up a backlog.
//!
//! Usage:
//!   cargo run --example slider
//!   DATABASE_URL=sqlite:///path/to/shop.db cargo run --example slider

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use zero_query::sync::{Mode, QueryScheduler, WorkerPool};
use zero_query::{CollectHandler, ConnectionRegistry, Opts, QueryRequest};

fn main() -> zero_query::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = tempfile::tempdir()?;
    let registry = match env::var("DATABASE_URL") {
        Ok(url) => ConnectionRegistry::from_url(&url)?,
        Err(_) => {
            let path = dir.path().join("shop.db");
            let registry = ConnectionRegistry::new(Opts::sqlite(path.to_string_lossy().into_owned()));
            registry.open()?;
            if let Some(handle) = registry.thread_connection() {
                for sql in [
                    "CREATE TABLE products (id INTEGER PRIMARY KEY, price REAL)",
                    "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 500) \
                     INSERT INTO products SELECT i, i * 0.25 FROM n",
                ] {
                    handle.with(|conn| conn.run(&QueryRequest::raw(sql), &mut CollectHandler::new()))?;
                }
            }
            registry.close_one(thread::current().id());
            registry
        }
    };

    let pool = Arc::new(WorkerPool::new(Arc::new(registry), 2)?);
    let mut scheduler = QueryScheduler::new(pool);
    scheduler.set_mode(Mode::SkipPrevious);
    scheduler.set_delay_ms(40);
    scheduler.on_busy_changed(|busy| println!("  busy: {}", busy));
    scheduler.on_exec_done(|result| match result.value(0, 0) {
        Some(count) if result.is_valid() => println!("  products below threshold: {}", count),
        _ => println!("  query failed: {:?}", result.error()),
    });

    scheduler.prepare("SELECT COUNT(*) FROM products WHERE price < :price");
    for price in (0..=100).step_by(5) {
        println!("slider -> {}", price);
        scheduler.bind_value("price", price);
        scheduler.start_exec()?;
        thread::sleep(Duration::from_millis(10));
    }

    scheduler.wait_done(None);
    // completions are delivered right after the scheduler goes idle
    thread::sleep(Duration::from_millis(50));
    println!("last result: {:?}", scheduler.result().value(0, 0));
    Ok(())
}
