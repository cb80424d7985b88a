//! Spreadsheet-to-table reconciliation
//!
//! This module turns an uploaded spreadsheet into the minimal set of
//! inserts, field-level updates and deletions that bring a keyed table in
//! line with it.

pub mod types;
pub mod error;
pub mod mapping;
pub mod normalize;
pub mod fingerprint;
pub mod fetch;
pub mod diff;
pub mod deletion;
pub mod executor;
pub mod engine;

#[cfg(test)]
pub mod testing;

pub use types::*;
pub use error::{FetchStage, SyncError};
pub use mapping::{ColumnMapping, merge_mappings, normalize_header, resolve_mapping};
pub use normalize::{NormalizedRow, NormalizedUpload, normalize_rows};
pub use fingerprint::content_fingerprint;
pub use engine::{EngineSettings, SyncEngine};
