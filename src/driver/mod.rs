//! Database drivers.
//!
//! A [`Connector`] opens one [`Connection`] per worker thread. The registry
//! keeps the connection and only ever runs it on the thread that opened it.

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::error::{Error, Result};
use crate::handler::RowHandler;
use crate::opts::{Driver, Opts};
use crate::statement::QueryRequest;

/// An open database connection.
pub trait Connection: Send {
    /// Execute one request and stream its columns and rows into `handler`.
    ///
    /// Prepared requests bind every value in [`QueryRequest::params`] before
    /// execution; raw requests run the text directly.
    fn run(&mut self, request: &QueryRequest, handler: &mut dyn RowHandler) -> Result<()>;

    /// Driver that produced this connection.
    fn driver(&self) -> Driver;
}

/// Opens connections from [`Opts`].
pub trait Connector: Send + Sync {
    fn connect(&self, opts: &Opts) -> Result<Box<dyn Connection>>;
}

/// Connector that dispatches on [`Opts::driver`] to the compiled-in drivers.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConnector;

impl Connector for DefaultConnector {
    fn connect(&self, opts: &Opts) -> Result<Box<dyn Connection>> {
        match opts.driver {
            #[cfg(feature = "sqlite")]
            Driver::Sqlite => Ok(Box::new(sqlite::SqliteConn::open(opts)?)),
            #[cfg(feature = "postgres")]
            Driver::Postgres => Ok(Box::new(postgres::PgConn::open(opts)?)),
            #[allow(unreachable_patterns)]
            other => Err(Error::Unsupported(format!(
                "driver '{}' is not compiled in",
                other.name()
            ))),
        }
    }
}
