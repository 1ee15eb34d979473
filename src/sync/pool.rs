use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::registry::ConnectionRegistry;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of worker threads that run queries.
///
/// Each worker thread opens its own connection through the registry the
/// first time it runs a query and closes it when the pool shuts down.
pub struct WorkerPool {
    registry: Arc<ConnectionRegistry>,
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` worker threads (at least one).
    pub fn new(registry: Arc<ConnectionRegistry>, size: usize) -> Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let receiver = receiver.clone();
            let registry = Arc::clone(&registry);
            let handle = thread::Builder::new()
                .name(format!("zero-query-worker-{}", i))
                .spawn(move || worker_loop(receiver, registry))?;
            workers.push(handle);
        }
        debug!("worker pool started with {} thread(s)", size);
        Ok(Self {
            registry,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            size,
        })
    }

    /// One worker per logical CPU.
    pub fn with_default_size(registry: Arc<ConnectionRegistry>) -> Result<Self> {
        Self::new(registry, num_cpus::get())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Queue a job. Fails once the pool is shut down.
    pub(crate) fn execute(&self, job: Job) -> Result<()> {
        let sender = self.sender.lock().clone().ok_or(Error::PoolShutdown)?;
        sender.send(job).map_err(|_| Error::PoolShutdown)
    }

    /// Stop accepting jobs, let queued jobs finish, and join the workers.
    ///
    /// Safe to call more than once, and from a worker thread (that thread is
    /// left to exit on its own).
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        let current = thread::current().id();
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("worker thread exited with a panic");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: Receiver<Job>, registry: Arc<ConnectionRegistry>) {
    for job in receiver.iter() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            error!("worker job panicked: {}", panic_message(payload.as_ref()));
        }
    }
    if registry.has_thread_connection() {
        registry.close_one(thread::current().id());
    }
}

/// Text of a panic payload, for logs and error results.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::opts::Opts;

    fn registry() -> Arc<ConnectionRegistry> {
        Arc::new(ConnectionRegistry::new(Opts::sqlite(":memory:")))
    }

    #[test]
    fn test_runs_all_jobs_before_shutdown() {
        let pool = WorkerPool::new(registry(), 3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            pool.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_execute_after_shutdown_fails() {
        let pool = WorkerPool::new(registry(), 1).unwrap();
        pool.shutdown();
        let err = pool.execute(Box::new(|| {})).unwrap_err();
        assert!(matches!(err, Error::PoolShutdown));
    }

    #[test]
    fn test_panicking_job_keeps_worker_alive() {
        let pool = WorkerPool::new(registry(), 1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        pool.execute(Box::new(|| panic!("boom"))).unwrap();
        let c = Arc::clone(&counter);
        pool.execute(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_size_is_at_least_one() {
        let pool = WorkerPool::new(registry(), 0).unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn test_workers_close_their_connections() {
        let registry = registry();
        let pool = WorkerPool::new(Arc::clone(&registry), 2).unwrap();
        let reg = Arc::clone(&registry);
        pool.execute(Box::new(move || {
            let _ = reg.open();
        }))
        .unwrap();
        pool.shutdown();
        assert_eq!(registry.connection_count(), 0);
    }
}
