//! `tablesync mappings`

pub mod handler;

use clap::Subcommand;

pub use handler::handle_mappings_command;

#[derive(Subcommand, Debug)]
pub enum MappingsCommands {
    /// Show persisted and built-in header mappings for a table
    List {
        #[arg(short, long)]
        table: String,
    },
    /// Map a header label to a field (replaces an existing mapping)
    Set {
        #[arg(short, long)]
        table: String,
        /// Header label as it appears in uploads
        header: String,
        /// Canonical field name
        field: String,
    },
    /// Remove the persisted mapping for a header, or all with --all
    Remove {
        #[arg(short, long)]
        table: String,
        #[arg(required_unless_present = "all")]
        header: Option<String>,
        #[arg(long, conflicts_with = "header")]
        all: bool,
    },
}
