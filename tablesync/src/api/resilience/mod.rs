//! Load limiting for store requests
//!
//! Bounds how many batch requests a run keeps in flight against the store.

pub mod config;
pub mod concurrency;

pub use config::ConcurrencyConfig;
pub use concurrency::ConcurrencyLimiter;
