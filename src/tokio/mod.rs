//! Async helpers for Tokio.

mod exec;

pub use exec::exec;
