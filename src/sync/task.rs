//! Unit of work executed on a pool thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use crate::error::{DbError, DbErrorKind, Error};
use crate::handler::CollectHandler;
use crate::registry::ConnectionRegistry;
use crate::result::QueryResult;
use crate::statement::QueryRequest;

use super::pool::panic_message;
use super::scheduler::Shared;

/// One request bound for one scheduler.
///
/// Running the task always ends in exactly one call to the scheduler's
/// completion handler, whether the query succeeded or not.
pub(crate) struct WorkerTask {
    scheduler: Arc<Shared>,
    request: QueryRequest,
    delay: Duration,
}

impl WorkerTask {
    pub(crate) fn new(scheduler: Arc<Shared>, request: QueryRequest, delay: Duration) -> Self {
        Self {
            scheduler,
            request,
            delay,
        }
    }

    pub(crate) fn run(self) {
        let registry = self.scheduler.registry();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            execute(registry, &self.request, self.delay)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            error!("query task panicked: {}", message);
            QueryResult::from_error(DbError {
                kind: DbErrorKind::Unknown,
                message: format!("query task panicked: {}", message),
                code: None,
            })
        });
        self.scheduler.task_callback(result);
    }
}

/// Run `request` on the current thread's connection and materialize the outcome.
pub(crate) fn execute(
    registry: &ConnectionRegistry,
    request: &QueryRequest,
    delay: Duration,
) -> QueryResult {
    match try_execute(registry, request, delay) {
        Ok(result) => result,
        Err(err) => {
            debug!("query failed: {}", err);
            QueryResult::from_error(err)
        }
    }
}

fn try_execute(
    registry: &ConnectionRegistry,
    request: &QueryRequest,
    delay: Duration,
) -> Result<QueryResult, DbError> {
    if !registry.has_thread_connection() {
        registry.open().map_err(connection_error)?;
    }
    let handle = registry.thread_connection().ok_or_else(|| {
        DbError::connection(format!(
            "no connection registered for {:?}",
            thread::current().id()
        ))
    })?;

    if !delay.is_zero() {
        thread::sleep(delay);
    }

    let mut collect = CollectHandler::new();
    handle
        .with(|conn| conn.run(request, &mut collect))
        .map_err(Error::into_db_error)?;
    Ok(collect.into_result())
}

/// Anything that goes wrong while opening is reported as a connection failure.
fn connection_error(err: Error) -> DbError {
    DbError {
        kind: DbErrorKind::Connection,
        ..err.into_db_error()
    }
}
