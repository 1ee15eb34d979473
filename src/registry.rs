//! Per-thread connection registry.
//!
//! Every worker thread gets its own connection, opened on first use and kept
//! until the thread exits or the registry is closed. Configure the registry
//! before the first query runs; connections that are already open keep the
//! options they were opened with.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zero_query::{ConnectionRegistry, Driver};
//!
//! let registry = Arc::new(ConnectionRegistry::default());
//! registry.set_driver(Driver::Sqlite);
//! registry.set_database_name("data/northwind.db");
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::driver::{Connection, Connector, DefaultConnector};
use crate::error::{Error, Result};
use crate::opts::{Driver, Opts};
use crate::value::NumericalPrecisionPolicy;

/// Handle to the connection of one thread.
///
/// Cloning is cheap. The handle remembers its owner thread and refuses to run
/// anywhere else.
#[derive(Clone)]
pub struct ConnectionHandle {
    owner: ThreadId,
    driver: Driver,
    conn: Arc<Mutex<Box<dyn Connection>>>,
}

impl ConnectionHandle {
    fn new(conn: Box<dyn Connection>) -> Self {
        Self {
            owner: thread::current().id(),
            driver: conn.driver(),
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Thread that opened the connection.
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    /// Run `f` with the connection.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUsage` if called from any thread but the owner.
    pub fn with<T>(&self, f: impl FnOnce(&mut dyn Connection) -> Result<T>) -> Result<T> {
        let current = thread::current().id();
        if current != self.owner {
            return Err(Error::InvalidUsage(format!(
                "connection of {:?} used from {:?}",
                self.owner, current
            )));
        }
        let mut conn = self.conn.lock();
        f(conn.as_mut())
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("owner", &self.owner)
            .field("driver", &self.driver)
            .finish()
    }
}

/// Maps worker threads to their database connections.
pub struct ConnectionRegistry {
    opts: RwLock<Opts>,
    conns: Mutex<HashMap<ThreadId, ConnectionHandle>>,
    connector: Arc<dyn Connector>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(Opts::default())
    }
}

impl ConnectionRegistry {
    /// Create a registry that opens connections with the compiled-in drivers.
    pub fn new(opts: Opts) -> Self {
        Self::with_connector(opts, Arc::new(DefaultConnector))
    }

    /// Create a registry with a custom connector.
    pub fn with_connector(opts: Opts, connector: Arc<dyn Connector>) -> Self {
        Self {
            opts: RwLock::new(opts),
            conns: Mutex::new(HashMap::new()),
            connector,
        }
    }

    /// Create a registry from a connection URL (see [`Opts`]).
    pub fn from_url(url: &str) -> Result<Self> {
        Ok(Self::new(Opts::try_from(url)?))
    }

    // === Configuration ===

    /// Snapshot of the current options.
    pub fn opts(&self) -> Opts {
        self.opts.read().clone()
    }

    /// Replace all options at once.
    pub fn set_opts(&self, opts: Opts) {
        *self.opts.write() = opts;
    }

    pub fn set_driver(&self, driver: Driver) {
        self.opts.write().driver = driver;
    }

    pub fn driver(&self) -> Driver {
        self.opts.read().driver
    }

    pub fn set_host_name(&self, host: impl Into<String>) {
        self.opts.write().host = host.into();
    }

    pub fn host_name(&self) -> String {
        self.opts.read().host.clone()
    }

    pub fn set_port(&self, port: Option<u16>) {
        self.opts.write().port = port;
    }

    pub fn port(&self) -> Option<u16> {
        self.opts.read().port
    }

    pub fn set_database_name(&self, name: impl Into<String>) {
        self.opts.write().database = name.into();
    }

    pub fn database_name(&self) -> String {
        self.opts.read().database.clone()
    }

    pub fn set_user_name(&self, user: impl Into<String>) {
        self.opts.write().user = user.into();
    }

    pub fn user_name(&self) -> String {
        self.opts.read().user.clone()
    }

    pub fn set_password(&self, password: Option<String>) {
        self.opts.write().password = password;
    }

    pub fn password(&self) -> Option<String> {
        self.opts.read().password.clone()
    }

    pub fn set_numerical_precision_policy(&self, policy: NumericalPrecisionPolicy) {
        self.opts.write().precision = policy;
    }

    pub fn numerical_precision_policy(&self) -> NumericalPrecisionPolicy {
        self.opts.read().precision
    }

    // === Connection maintenance ===

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.conns.lock().len()
    }

    /// Returns true if `thread` has an open connection.
    pub fn connection_exists(&self, thread: ThreadId) -> bool {
        self.conns.lock().contains_key(&thread)
    }

    /// Returns true if the current thread has an open connection.
    pub fn has_thread_connection(&self) -> bool {
        self.connection_exists(thread::current().id())
    }

    /// Open a connection for the current thread.
    ///
    /// Succeeds without doing anything if the thread already has one.
    pub fn open(&self) -> Result<()> {
        let current = thread::current().id();
        if self.connection_exists(current) {
            warn!("open: {:?} already has an open connection", current);
            return Ok(());
        }

        // Only this thread inserts under its own id, so connecting outside
        // the map lock cannot race with another open for the same key.
        let opts = self.opts();
        let conn = match self.connector.connect(&opts) {
            Ok(conn) => conn,
            Err(e) => {
                error!(
                    "open: {:?}: {} connection to '{}' failed: {}",
                    current,
                    opts.driver.name(),
                    opts.database,
                    e
                );
                return Err(e);
            }
        };
        debug!("open: {:?}: {} connection ready", current, opts.driver.name());
        self.conns.lock().insert(current, ConnectionHandle::new(conn));
        Ok(())
    }

    /// The current thread's connection, or `None` if it has none.
    pub fn thread_connection(&self) -> Option<ConnectionHandle> {
        self.conns.lock().get(&thread::current().id()).cloned()
    }

    /// Close the connection of `thread`. Nothing happens if it has none.
    pub fn close_one(&self, thread: ThreadId) {
        let removed = self.conns.lock().remove(&thread);
        match removed {
            Some(handle) => {
                debug!("close_one: closing {:?} connection", handle.owner());
                drop(handle);
            }
            None => warn!("close_one: no connection open for {:?}", thread),
        }
    }

    /// Close every connection.
    pub fn close_all(&self) {
        let drained: Vec<ConnectionHandle> = self.conns.lock().drain().map(|(_, h)| h).collect();
        if !drained.is_empty() {
            debug!("close_all: closing {} connection(s)", drained.len());
        }
    }

    /// Log every open connection.
    pub fn dump(&self) {
        let conns = self.conns.lock();
        info!("Database connections: {}", conns.len());
        for handle in conns.values() {
            info!("  {:?}", handle);
        }
    }
}

impl Drop for ConnectionRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::handler::CollectHandler;
    use crate::statement::QueryRequest;
    use crate::value::Value;

    #[test]
    fn test_open_is_idempotent() {
        let registry = ConnectionRegistry::new(Opts::sqlite(":memory:"));
        assert!(!registry.has_thread_connection());
        registry.open().unwrap();
        registry.open().unwrap();
        assert_eq!(registry.connection_count(), 1);
        assert!(registry.has_thread_connection());
    }

    #[test]
    fn test_thread_connection_never_creates() {
        let registry = ConnectionRegistry::new(Opts::sqlite(":memory:"));
        assert!(registry.thread_connection().is_none());
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_handle_runs_on_owner() {
        let registry = ConnectionRegistry::new(Opts::sqlite(":memory:"));
        registry.open().unwrap();
        let handle = registry.thread_connection().unwrap();
        let mut collect = CollectHandler::new();
        handle
            .with(|conn| conn.run(&QueryRequest::raw("SELECT 2"), &mut collect))
            .unwrap();
        assert_eq!(collect.into_result().value(0, 0), Some(&Value::Int(2)));
    }

    #[test]
    fn test_handle_rejects_foreign_thread() {
        let registry = ConnectionRegistry::new(Opts::sqlite(":memory:"));
        registry.open().unwrap();
        let handle = registry.thread_connection().unwrap();
        let result = std::thread::spawn(move || {
            handle.with(|conn| conn.run(&QueryRequest::raw("SELECT 1"), &mut CollectHandler::new()))
        })
        .join()
        .unwrap();
        assert!(matches!(result, Err(Error::InvalidUsage(_))));
    }

    #[test]
    fn test_close_one_and_all() {
        let registry = ConnectionRegistry::new(Opts::sqlite(":memory:"));
        registry.open().unwrap();
        let me = thread::current().id();
        registry.close_one(me);
        assert!(!registry.connection_exists(me));
        // closing again is a no-op
        registry.close_one(me);
        registry.open().unwrap();
        registry.close_all();
        assert_eq!(registry.connection_count(), 0);
    }

    #[test]
    fn test_config_change_does_not_touch_open_connection() {
        let registry = ConnectionRegistry::new(Opts::sqlite(":memory:"));
        registry.open().unwrap();
        registry.set_numerical_precision_policy(NumericalPrecisionPolicy::HighPrecision);
        let handle = registry.thread_connection().unwrap();
        let mut collect = CollectHandler::new();
        handle
            .with(|conn| conn.run(&QueryRequest::raw("SELECT 1.5"), &mut collect))
            .unwrap();
        assert_eq!(collect.into_result().value(0, 0), Some(&Value::Float(1.5)));
        assert_eq!(
            registry.numerical_precision_policy(),
            NumericalPrecisionPolicy::HighPrecision
        );
    }
}
