//! Thread-pooled query scheduling.

mod pool;
mod scheduler;
mod task;

pub use pool::WorkerPool;
pub use scheduler::{Event, Mode, QueryScheduler};
