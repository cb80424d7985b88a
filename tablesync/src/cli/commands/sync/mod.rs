//! `tablesync sync`

pub mod handler;

use std::path::PathBuf;

use clap::Args;

use crate::sync::{DeletionPolicy, MappingEntry};

pub use handler::handle_sync_command;

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Target table name
    #[arg(short, long)]
    pub table: String,

    /// Upload file (.xlsx, .xls, .ods, .csv, .tsv or .json)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Worksheet to read (defaults to the first sheet)
    #[arg(long)]
    pub sheet: Option<String>,

    /// Which persisted rows absent from the upload get removed
    #[arg(long, default_value = "none")]
    pub policy: DeletionPolicy,

    /// Header mapping for this run only, as "Header=field" (repeatable)
    #[arg(long = "map", value_parser = parse_mapping)]
    pub map: Vec<MappingEntry>,

    /// Records per upsert request (0 sends one request per record)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Plan the run and report it without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parse a `Header=field` override
pub fn parse_mapping(s: &str) -> Result<MappingEntry, String> {
    let (header, field) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected Header=field, got '{}'", s))?;
    let (header, field) = (header.trim(), field.trim());
    if header.is_empty() || field.is_empty() {
        return Err(format!("expected Header=field, got '{}'", s));
    }
    Ok(MappingEntry::new(header, field))
}
