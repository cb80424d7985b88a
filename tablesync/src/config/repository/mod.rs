//! Repository layer for database operations

pub mod mappings;
pub mod migrations;

pub use migrations::{open_pool, run_migrations};
