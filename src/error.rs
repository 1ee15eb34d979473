//! Error types for zero-query.

use thiserror::Error;

/// Result type for zero-query operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Category of a database-level error carried by a [`QueryResult`](crate::QueryResult).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// The connection for the worker thread could not be opened or is unusable
    Connection,
    /// Prepare, bind or execute failed
    Statement,
    /// Anything the driver could not classify
    Unknown,
}

/// Database error descriptor.
///
/// This is the value stored in a failed result. It is plain data so a result
/// can be cloned and sent across threads freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbError {
    /// Error category
    pub kind: DbErrorKind,
    /// Primary message reported by the database or driver
    pub message: String,
    /// Driver-native error code (SQLSTATE for PostgreSQL, extended result code for SQLite)
    pub code: Option<String>,
}

impl DbError {
    /// Create a statement-level error descriptor.
    pub fn statement(message: impl Into<String>) -> Self {
        Self {
            kind: DbErrorKind::Statement,
            message: message.into(),
            code: None,
        }
    }

    /// Create a connection-level error descriptor.
    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: DbErrorKind::Connection,
            message: message.into(),
            code: None,
        }
    }

    /// Attach a driver-native error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(code) = &self.code {
            write!(f, " (code {})", code)?;
        }
        Ok(())
    }
}

/// Error type for zero-query.
#[derive(Debug, Error)]
pub enum Error {
    /// Error reported by the database while preparing, binding or executing
    #[error("Database error: {0}")]
    Database(DbError),

    /// Opening a connection failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// I/O error (spawning worker threads)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid usage (bad URL, handle used from a foreign thread, etc.)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// Unsupported feature or driver not compiled in
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// A cell could not be decoded into a [`Value`](crate::Value)
    #[error("Decode error: {0}")]
    Decode(String),

    /// The worker pool no longer accepts jobs
    #[error("Worker pool is shut down")]
    PoolShutdown,

    /// A task ended without delivering its result (its job panicked)
    #[error("Query task ended without a result")]
    TaskAborted,
}

impl Error {
    /// Convert into the descriptor stored in a failed result.
    pub fn into_db_error(self) -> DbError {
        match self {
            Error::Database(err) => err,
            Error::Connection(message) => DbError::connection(message),
            Error::Decode(message) => DbError::statement(message),
            other => DbError {
                kind: DbErrorKind::Unknown,
                message: other.to_string(),
                code: None,
            },
        }
    }

    /// Get the driver-native code if this is a database error.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Database(err) => err.code.as_deref(),
            _ => None,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(failure, _) => Some(failure.extended_code.to_string()),
            _ => None,
        };
        Error::Database(DbError {
            kind: DbErrorKind::Statement,
            message: err.to_string(),
            code,
        })
    }
}

#[cfg(feature = "postgres")]
impl From<postgres::Error> for Error {
    fn from(err: postgres::Error) -> Self {
        if err.is_closed() {
            return Error::Database(DbError::connection(err.to_string()));
        }
        let message = match err.as_db_error() {
            Some(db) => db.message().to_string(),
            None => err.to_string(),
        };
        Error::Database(DbError {
            kind: DbErrorKind::Statement,
            message,
            code: err.code().map(|state| state.code().to_string()),
        })
    }
}
