//! Command-line interface

pub mod commands;
pub mod context;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::mappings::MappingsCommands;
use commands::sync::SyncArgs;
pub use context::AppContext;

#[derive(Parser, Debug)]
#[command(name = "tablesync")]
#[command(about = "Reconcile spreadsheet uploads into keyed tables")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database url, overriding the config file
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync an upload file into a table
    Sync(SyncArgs),
    /// Manage persisted header mappings
    Mappings {
        #[command(subcommand)]
        command: MappingsCommands,
    },
    /// List known tables and their columns
    Tables,
}

/// Run a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    let ctx = AppContext::load(cli.config.as_deref(), cli.database)?;

    match cli.command {
        Commands::Sync(args) => commands::sync::handle_sync_command(&ctx, args).await,
        Commands::Mappings { command } => commands::mappings::handle_mappings_command(&ctx, command).await,
        Commands::Tables => commands::tables::handle_tables_command(&ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::DeletionPolicy;

    #[test]
    fn test_parse_sync_command() {
        let cli = Cli::try_parse_from([
            "tablesync",
            "--database",
            "sqlite::memory:",
            "sync",
            "--table",
            "materials",
            "--input",
            "upload.xlsx",
            "--policy",
            "missing",
            "--map",
            "Mat. No=material_number",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.database.as_deref(), Some("sqlite::memory:"));
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.table, "materials");
        assert_eq!(args.policy, DeletionPolicy::Missing);
        assert_eq!(args.map[0].header, "Mat. No");
        assert_eq!(args.map[0].field, "material_number");
        assert!(args.dry_run);
    }

    #[test]
    fn test_bad_policy_rejected() {
        let result = Cli::try_parse_from([
            "tablesync", "sync", "--table", "materials", "--input", "a.csv", "--policy", "some",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["tablesync", "tables", "-v", "--no-color"]).unwrap();
        assert!(cli.verbose);
        assert!(cli.no_color);
    }
}
