//! Subcommand definitions and handlers

pub mod mappings;
pub mod sync;
pub mod tables;
