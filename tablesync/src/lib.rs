//! Reconcile uploaded spreadsheet rows into keyed tables.
//!
//! The [`sync`] module holds the engine; [`store`] and [`config`] provide the
//! SQLite persistence used by the `tablesync` binary.

pub mod api;
pub mod cli;
pub mod config;
pub mod input;
pub mod store;
pub mod sync;
pub mod tables;
