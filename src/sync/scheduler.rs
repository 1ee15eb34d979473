//! Query scheduler.
//!
//! A [`QueryScheduler`] hands requests to the worker pool according to its
//! [`Mode`] and reports completions through callbacks or an event channel.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zero_query::{ConnectionRegistry, Opts};
//! use zero_query::sync::{Mode, QueryScheduler, WorkerPool};
//!
//! fn main() -> zero_query::Result<()> {
//!     let registry = Arc::new(ConnectionRegistry::new(Opts::sqlite("shop.db")));
//!     let pool = Arc::new(WorkerPool::with_default_size(registry)?);
//!
//!     let mut scheduler = QueryScheduler::new(pool);
//!     scheduler.set_mode(Mode::SkipPrevious);
//!     scheduler.on_exec_done(|result| {
//!         tracing::info!("{} row(s)", result.count());
//!     });
//!
//!     scheduler.prepare("SELECT name FROM product WHERE price < :price");
//!     scheduler.bind_value(":price", 20);
//!     scheduler.start_exec()?;
//!     scheduler.wait_done(None);
//!     Ok(())
//! }
//! ```

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error};

use crate::error::Result;
use crate::registry::ConnectionRegistry;
use crate::result::QueryResult;
use crate::statement::QueryRequest;
use crate::value::Value;

use super::pool::{WorkerPool, panic_message};
use super::task::WorkerTask;

/// How a scheduler treats a request submitted while another one is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Every request runs immediately, with no ordering guarantee.
    #[default]
    Parallel,
    /// One at a time, in submission order.
    Fifo,
    /// One at a time; pending requests are replaced by newer ones.
    SkipPrevious,
}

/// Notification delivered to [`QueryScheduler::subscribe`] receivers.
#[derive(Debug, Clone)]
pub enum Event {
    /// A request finished (successfully or not).
    ExecDone(QueryResult),
    /// The scheduler went from idle to busy (`true`) or back (`false`).
    BusyChanged(bool),
}

type ExecDoneFn = Arc<dyn Fn(&QueryResult) + Send + Sync>;
type BusyChangedFn = Arc<dyn Fn(bool) + Send + Sync>;

struct State {
    mode: Mode,
    task_count: usize,
    queue: VecDeque<QueryRequest>,
    result: QueryResult,
    delay: Duration,
    /// Notifications in the order their transitions happened.
    outbox: VecDeque<Event>,
    /// Set while some thread is draining `outbox`.
    delivering: bool,
}

#[derive(Default)]
struct Listeners {
    exec_done: Vec<ExecDoneFn>,
    busy_changed: Vec<BusyChangedFn>,
    events: Vec<Sender<Event>>,
}

impl Listeners {
    fn clear(&mut self) {
        self.exec_done.clear();
        self.busy_changed.clear();
        self.events.clear();
    }
}

/// State shared between a scheduler and its in-flight tasks.
pub(crate) struct Shared {
    state: Mutex<State>,
    idle: Condvar,
    pool: Arc<WorkerPool>,
    listeners: Mutex<Listeners>,
    one_shot: bool,
}

impl Shared {
    fn new(pool: Arc<WorkerPool>, one_shot: bool) -> Self {
        Self {
            state: Mutex::new(State {
                mode: Mode::default(),
                task_count: 0,
                queue: VecDeque::new(),
                result: QueryResult::default(),
                delay: Duration::ZERO,
                outbox: VecDeque::new(),
                delivering: false,
            }),
            idle: Condvar::new(),
            pool,
            listeners: Mutex::new(Listeners::default()),
            one_shot,
        }
    }

    pub(crate) fn registry(&self) -> &ConnectionRegistry {
        self.pool.registry()
    }

    fn spawn(self: &Arc<Self>, request: QueryRequest, delay: Duration) -> Result<()> {
        let task = WorkerTask::new(Arc::clone(self), request, delay);
        self.pool.execute(Box::new(move || task.run()))
    }

    /// Apply the mode policy to a new request.
    fn dispatch(self: &Arc<Self>, request: QueryRequest) -> Result<()> {
        let mut state = self.state.lock();
        if state.mode != Mode::Parallel && state.task_count > 0 {
            if state.mode == Mode::SkipPrevious {
                for skipped in state.queue.drain(..) {
                    debug!("skipping superseded request: {}", skipped.sql());
                }
            }
            state.queue.push_back(request);
            return Ok(());
        }

        state.task_count += 1;
        if state.task_count == 1 {
            state.outbox.push_back(Event::BusyChanged(true));
        }
        let delay = state.delay;
        let spawned = self.spawn(request, delay);
        if let Err(e) = &spawned {
            error!("cannot start request: {}", e);
            state.task_count -= 1;
            if state.task_count == 0 {
                // nothing can run them any more
                state.queue.clear();
                state.outbox.push_back(Event::BusyChanged(false));
                self.idle.notify_all();
            }
        }
        self.deliver(state);
        spawned
    }

    /// Completion handler, called once per finished task on its worker thread.
    pub(crate) fn task_callback(self: &Arc<Self>, result: QueryResult) {
        let mut state = self.state.lock();
        state.result = result.clone();
        let mut handed_off = false;
        while let Some(next) = state.queue.pop_front() {
            let delay = state.delay;
            match self.spawn(next, delay) {
                Ok(()) => {
                    handed_off = true;
                    break;
                }
                Err(e) => error!("cannot run pending request: {}", e),
            }
        }
        if !handed_off {
            state.task_count = state.task_count.saturating_sub(1);
            if state.task_count == 0 {
                state.outbox.push_back(Event::BusyChanged(false));
                self.idle.notify_all();
            }
        }
        state.outbox.push_back(Event::ExecDone(result));
        self.deliver(state);
    }

    /// Drain the outbox unless another thread already is.
    ///
    /// Notifications are queued under the state lock, so they leave in the
    /// order the transitions happened. Listeners run with the lock released;
    /// a listener that dispatches again only queues, and the running drain
    /// picks its notifications up.
    fn deliver(&self, mut state: MutexGuard<'_, State>) {
        if state.delivering {
            return;
        }
        state.delivering = true;
        while let Some(event) = state.outbox.pop_front() {
            MutexGuard::unlocked(&mut state, || self.notify(&event));
        }
        state.delivering = false;
    }

    fn notify(&self, event: &Event) {
        match event {
            Event::BusyChanged(busy) => {
                let callbacks = self.listeners.lock().busy_changed.clone();
                for callback in callbacks {
                    guarded(|| callback(*busy));
                }
            }
            Event::ExecDone(result) => {
                let callbacks = self.listeners.lock().exec_done.clone();
                for callback in callbacks {
                    guarded(|| callback(result));
                }
            }
        }

        // unbounded channels never block, so sending under the lock is fine
        let mut listeners = self.listeners.lock();
        listeners.events.retain(|tx| tx.send(event.clone()).is_ok());
        if self.one_shot && matches!(event, Event::ExecDone(_)) {
            listeners.clear();
        }
    }
}

/// Run a listener, logging instead of unwinding through the drain.
fn guarded(f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        error!("scheduler listener panicked: {}", panic_message(payload.as_ref()));
    }
}

/// Runs queries on a [`WorkerPool`] according to a [`Mode`].
///
/// The scheduler owns one pending request slot filled by [`prepare`] and
/// [`bind_value`]. Raw SQL can be dispatched from any thread through a shared
/// reference with [`start_exec_sql`] or [`submit`].
///
/// Dropping the scheduler does not cancel running work; completions are still
/// delivered to registered listeners.
///
/// [`prepare`]: QueryScheduler::prepare
/// [`bind_value`]: QueryScheduler::bind_value
/// [`start_exec_sql`]: QueryScheduler::start_exec_sql
/// [`submit`]: QueryScheduler::submit
pub struct QueryScheduler {
    shared: Arc<Shared>,
    current: QueryRequest,
}

impl QueryScheduler {
    /// Create a scheduler in [`Mode::Parallel`] with no delay.
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            shared: Arc::new(Shared::new(pool, false)),
            current: QueryRequest::prepared(""),
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.shared.pool
    }

    pub fn set_mode(&self, mode: Mode) {
        self.shared.state.lock().mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.shared.state.lock().mode
    }

    /// Set the statement text of the pending slot and forget earlier bindings.
    pub fn prepare(&mut self, sql: impl Into<String>) {
        self.current.reset(sql.into());
        self.current.set_prepared(true);
    }

    /// Bind a named placeholder of the pending slot.
    ///
    /// `name` may be given with or without its `:` sigil.
    pub fn bind_value(&mut self, name: &str, value: impl Into<Value>) {
        self.current.bind_value(name, value);
    }

    /// Dispatch a copy of the pending prepared request.
    ///
    /// The slot keeps its text and bindings, so it can be re-bound and sent
    /// again.
    pub fn start_exec(&self) -> Result<()> {
        self.shared.dispatch(self.current.clone())
    }

    /// Dispatch raw SQL.
    pub fn start_exec_sql(&self, sql: impl Into<String>) -> Result<()> {
        self.shared.dispatch(QueryRequest::raw(sql))
    }

    /// Dispatch an already built request.
    pub fn submit(&self, request: impl Into<QueryRequest>) -> Result<()> {
        self.shared.dispatch(request.into())
    }

    /// Returns true while any request of this scheduler is running.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().task_count > 0
    }

    /// The most recently completed result.
    pub fn result(&self) -> QueryResult {
        self.shared.state.lock().result.clone()
    }

    /// Block until no request is running.
    ///
    /// Returns `false` only if `timeout` elapsed first. `None` waits forever.
    pub fn wait_done(&self, timeout: Option<Duration>) -> bool {
        let mut state = self.shared.state.lock();
        match timeout {
            None => self.shared.idle.wait_while(&mut state, |s| s.task_count > 0),
            Some(timeout) => {
                let _ = self
                    .shared
                    .idle
                    .wait_while_for(&mut state, |s| s.task_count > 0, timeout);
            }
        }
        state.task_count == 0
    }

    /// Sleep this long on the worker before running each later request.
    pub fn set_delay_ms(&self, ms: u64) {
        self.shared.state.lock().delay = Duration::from_millis(ms);
    }

    pub fn delay(&self) -> Duration {
        self.shared.state.lock().delay
    }

    /// Call `f` with every completed result, on the worker thread.
    pub fn on_exec_done(&self, f: impl Fn(&QueryResult) + Send + Sync + 'static) {
        self.shared.listeners.lock().exec_done.push(Arc::new(f));
    }

    /// Call `f` on every idle/busy transition.
    pub fn on_busy_changed(&self, f: impl Fn(bool) + Send + Sync + 'static) {
        self.shared.listeners.lock().busy_changed.push(Arc::new(f));
    }

    /// Receive every later [`Event`] on a channel.
    pub fn subscribe(&self) -> Receiver<Event> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.shared.listeners.lock().events.push(tx);
        rx
    }

    /// Run one request and hand its result to `handler`.
    ///
    /// No scheduler is kept by the caller: the in-flight task holds the only
    /// reference, and everything is released after `handler` returns.
    pub fn exec_once<F>(
        pool: Arc<WorkerPool>,
        request: impl Into<QueryRequest>,
        handler: F,
    ) -> Result<()>
    where
        F: FnOnce(&QueryResult) + Send + 'static,
    {
        let shared = Arc::new(Shared::new(pool, true));
        let handler = Mutex::new(Some(handler));
        shared
            .listeners
            .lock()
            .exec_done
            .push(Arc::new(move |result: &QueryResult| {
                if let Some(handler) = handler.lock().take() {
                    handler(result);
                }
            }));
        shared.dispatch(request.into())
    }
}

impl std::fmt::Debug for QueryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("QueryScheduler")
            .field("mode", &state.mode)
            .field("task_count", &state.task_count)
            .field("pending", &state.queue.len())
            .field("delay", &state.delay)
            .finish()
    }
}
