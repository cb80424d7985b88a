//! `tablesync tables`

use anyhow::Result;
use colored::*;

use crate::cli::AppContext;
use crate::sync::Fallback;

/// List every known table with its columns
pub fn handle_tables_command(ctx: &AppContext) -> Result<()> {
    for spec in ctx.tables() {
        println!("{} (key: {})", spec.name.bold(), spec.key_field.cyan());
        for column in &spec.columns {
            let mut notes = Vec::new();
            if let Some(rule) = spec.required_field(&column.field) {
                notes.push(match &rule.fallback {
                    Fallback::Key => "required, defaults to key".to_string(),
                    Fallback::Literal(s) => format!("required, defaults to '{}'", s),
                });
            }
            if spec.fingerprint_field.as_deref() == Some(column.field.as_str()) {
                notes.push("content fingerprint".to_string());
            }
            let notes = if notes.is_empty() {
                String::new()
            } else {
                format!("({})", notes.join("; "))
            };
            println!("  {:<20} {:<7} {}", column.field, column.kind.to_string(), notes.dimmed());
        }
        println!();
    }
    Ok(())
}
