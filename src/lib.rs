//! Thread-pooled asynchronous SQL query scheduling.
//!
//! # Features
//!
//! - **Per-thread connections**: every worker thread opens and owns its own connection
//! - **Scheduling modes**: run requests in parallel, strictly in order, or keep only the newest
//! - **Eager results**: rows are materialized on the worker into a cheap-to-clone [`QueryResult`]
//! - **Callbacks and channels**: completions are delivered to closures or [`sync::Event`] receivers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zero_query::sync::{Mode, QueryScheduler, WorkerPool};
//! use zero_query::ConnectionRegistry;
//!
//! fn main() -> zero_query::Result<()> {
//!     let registry = Arc::new(ConnectionRegistry::from_url("sqlite:///data/northwind.db")?);
//!     let pool = Arc::new(WorkerPool::with_default_size(registry)?);
//!
//!     let scheduler = QueryScheduler::new(pool);
//!     scheduler.set_mode(Mode::Fifo);
//!     scheduler.start_exec_sql("SELECT COUNT(*) FROM orders")?;
//!     scheduler.wait_done(None);
//!
//!     let result = scheduler.result();
//!     println!("orders: {:?}", result.value(0, 0));
//!     Ok(())
//! }
//! ```

pub mod driver;
pub mod error;
pub mod handler;
pub mod opts;
pub mod registry;
pub mod result;
pub mod statement;
pub mod sync;
pub mod value;

#[cfg(feature = "tokio")]
pub mod tokio;

pub use error::{DbError, DbErrorKind, Error, Result};
pub use handler::{CollectHandler, RowHandler};
pub use opts::{Driver, Opts};
pub use registry::{ConnectionHandle, ConnectionRegistry};
pub use result::{Column, QueryResult, Record};
pub use statement::QueryRequest;
pub use value::{NumericalPrecisionPolicy, Value};
