use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::result::QueryResult;
use crate::statement::QueryRequest;
use crate::sync::{QueryScheduler, WorkerPool};

/// Run one request on the pool and await its result.
///
/// The query still runs on a pool thread; only the wait is async. Failed
/// statements resolve to an invalid [`QueryResult`], not an `Err`.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use zero_query::sync::WorkerPool;
/// # async fn run(pool: Arc<WorkerPool>) -> zero_query::Result<()> {
/// let result = zero_query::tokio::exec(&pool, "SELECT count(*) FROM orders").await?;
/// assert!(result.is_valid());
/// # Ok(())
/// # }
/// ```
pub async fn exec(
    pool: &Arc<WorkerPool>,
    request: impl Into<QueryRequest>,
) -> Result<QueryResult> {
    let (tx, rx) = oneshot::channel();
    QueryScheduler::exec_once(Arc::clone(pool), request, move |result| {
        let _ = tx.send(result.clone());
    })?;
    rx.await.map_err(|_| Error::TaskAborted)
}
