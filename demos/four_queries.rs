//! Example: four COUNT queries under each scheduling mode
//!
//! Seeds a small SQLite database, then runs four COUNT(*) queries through one
//! scheduler and prints the results in the order they were delivered.
//!
//! Usage:
//!   cargo run --example four_queries -- [parallel|fifo|skip] [delay_ms]
//!   RUST_LOG=zero_query=debug cargo run --example four_queries -- skip 100

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;
use zero_query::sync::{Mode, QueryScheduler, WorkerPool};
use zero_query::{CollectHandler, ConnectionRegistry, Opts, QueryRequest};

const TABLES: [(&str, u32); 4] = [
    ("orders", 830),
    ("customers", 91),
    ("products", 77),
    ("employees", 9),
];

fn seed(registry: &ConnectionRegistry) -> zero_query::Result<()> {
    registry.open()?;
    let Some(handle) = registry.thread_connection() else {
        return Ok(());
    };
    for (table, rows) in TABLES {
        for sql in [
            format!("CREATE TABLE {} (id INTEGER PRIMARY KEY)", table),
            format!(
                "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < {}) \
                 INSERT INTO {} SELECT i FROM n",
                rows, table
            ),
        ] {
            handle.with(|conn| conn.run(&QueryRequest::raw(sql), &mut CollectHandler::new()))?;
        }
    }
    registry.close_one(std::thread::current().id());
    Ok(())
}

fn main() -> zero_query::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let mode = match args.next().as_deref() {
        None | Some("parallel") => Mode::Parallel,
        Some("fifo") => Mode::Fifo,
        Some("skip") => Mode::SkipPrevious,
        Some(other) => {
            eprintln!("unknown mode '{}', expected parallel, fifo or skip", other);
            std::process::exit(2);
        }
    };
    let delay_ms: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(50);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("northwind.db");
    let registry = Arc::new(ConnectionRegistry::new(Opts::sqlite(
        path.to_string_lossy().into_owned(),
    )));
    seed(&registry)?;

    let pool = Arc::new(WorkerPool::with_default_size(registry)?);
    println!("Mode: {:?}, delay: {}ms, workers: {}", mode, delay_ms, pool.size());

    let start = Instant::now();
    let scheduler = QueryScheduler::new(Arc::clone(&pool));
    scheduler.set_mode(mode);
    scheduler.set_delay_ms(delay_ms);
    scheduler.on_busy_changed(move |busy| {
        println!("[{:>5}ms] busy: {}", start.elapsed().as_millis(), busy);
    });
    scheduler.on_exec_done(move |result| match result.record(0) {
        Some(record) => println!(
            "[{:>5}ms] {}: {}",
            start.elapsed().as_millis(),
            record.get(0).map(ToString::to_string).unwrap_or_default(),
            record.get(1).map(ToString::to_string).unwrap_or_default(),
        ),
        None => println!(
            "[{:>5}ms] error: {:?}",
            start.elapsed().as_millis(),
            result.error()
        ),
    });

    for (table, _) in TABLES {
        scheduler.start_exec_sql(format!("SELECT '{0}', COUNT(*) FROM {0}", table))?;
    }
    scheduler.wait_done(None);
    // the last completion is delivered right after the scheduler goes idle
    thread::sleep(Duration::from_millis(50));

    pool.shutdown();
    Ok(())
}
