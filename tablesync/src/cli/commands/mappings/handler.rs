//! Mappings command handler

use anyhow::{Result, bail};
use colored::*;

use super::MappingsCommands;
use crate::cli::AppContext;
use crate::config::repository::mappings;

/// Handle `tablesync mappings`
pub async fn handle_mappings_command(ctx: &AppContext, command: MappingsCommands) -> Result<()> {
    let pool = ctx.pool().await?;

    match command {
        MappingsCommands::List { table } => {
            let spec = ctx.table(&table)?;
            let stored = mappings::get_column_mappings(&pool, &spec.name).await?;

            println!("{}", format!("Header mappings for '{}'", spec.name).bold());
            if stored.is_empty() {
                println!("  {}", "(no persisted mappings)".dimmed());
            }
            for mapping in &stored {
                println!("  {} -> {}", mapping.header_label.cyan(), mapping.field_name);
            }
            for entry in &spec.builtin_mapping {
                println!(
                    "  {} -> {} {}",
                    entry.header.cyan(),
                    entry.field,
                    "(built-in)".dimmed()
                );
            }
        }
        MappingsCommands::Set {
            table,
            header,
            field,
        } => {
            let spec = ctx.table(&table)?;
            if !spec.has_column(&field) {
                bail!("'{}' is not a column of '{}'", field, spec.name);
            }
            mappings::set_column_mapping(&pool, &spec.name, &header, &field).await?;
            println!("{} {} -> {}", "Saved".green(), header.cyan(), field);
        }
        MappingsCommands::Remove { table, header, all } => {
            let spec = ctx.table(&table)?;
            if all {
                let removed = mappings::clear_column_mappings(&pool, &spec.name).await?;
                println!("{} {} mapping(s) from '{}'", "Removed".green(), removed, spec.name);
            } else if let Some(header) = header {
                if mappings::delete_column_mapping(&pool, &spec.name, &header).await? {
                    println!("{} {}", "Removed".green(), header.cyan());
                } else {
                    println!("{} '{}' has no persisted mapping", "Note:".yellow(), header);
                }
            }
        }
    }

    Ok(())
}
