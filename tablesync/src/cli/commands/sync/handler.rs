//! Sync command handler

use anyhow::{Context, Result, bail};
use colored::*;
use std::time::Instant;

use super::SyncArgs;
use crate::cli::AppContext;
use crate::input::read_rows;
use crate::sync::{
    RowClassification, RowErrorKind, RunSummary, SyncEngine, SyncOptions, SyncPlan, UpsertMode,
    record_to_json,
};

/// Handle `tablesync sync`
pub async fn handle_sync_command(ctx: &AppContext, args: SyncArgs) -> Result<()> {
    let spec = ctx.table(&args.table)?;

    if !args.input.exists() {
        bail!("Input file does not exist: {}", args.input.display());
    }
    let rows = read_rows(&args.input, args.sheet.as_deref())?;

    let upsert_mode = match args.batch_size {
        Some(0) => UpsertMode::PerRecord,
        Some(n) => UpsertMode::Batched { batch_size: n },
        None => ctx.config.engine.upsert_mode(),
    };

    let mut options = SyncOptions::default()
        .with_policy(args.policy)
        .with_upsert_mode(upsert_mode)
        .dry_run(args.dry_run);
    options.header_overrides = args.map;

    let store = ctx.open_store(&spec).await?;
    let engine = SyncEngine::new(store.clone(), store, ctx.config.engine.settings());

    let start = Instant::now();
    let summary = if args.dry_run {
        let plan = engine
            .plan_sync(&spec, &rows, &options)
            .await
            .context("Sync aborted")?;
        if !args.json {
            print_plan(&plan);
        }
        plan.to_summary()
    } else {
        engine
            .sync_table(&spec, &rows, &options)
            .await
            .context("Sync aborted")?
    };
    let elapsed = start.elapsed();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&spec.name, &summary, args.dry_run);
        println!("{}", format!("Finished in {:.2}s", elapsed.as_secs_f64()).dimmed());
    }

    if !summary.ok {
        let failed = summary
            .errors
            .iter()
            .filter(|e| e.kind == RowErrorKind::MutationFailure)
            .count();
        bail!("{} change(s) could not be applied to '{}'", failed, spec.name);
    }

    Ok(())
}

fn print_plan(plan: &SyncPlan) {
    for classification in &plan.classifications {
        match classification {
            RowClassification::Insert { key, .. } => {
                println!("  {} {}", "+".green().bold(), key);
            }
            RowClassification::Update { key, patch } => {
                println!("  {} {} {}", "~".yellow().bold(), key, record_to_json(patch).to_string().dimmed());
            }
            RowClassification::Skip { .. } => {}
        }
    }
    for key in &plan.deletions {
        println!("  {} {}", "-".red().bold(), key);
    }
}

fn print_summary(table: &str, summary: &RunSummary, dry_run: bool) {
    let heading = if dry_run {
        format!("Dry run for '{}' (nothing written)", table)
    } else {
        format!("Synced '{}'", table)
    };
    println!();
    println!("{}", heading.bold());
    println!("  Rows:     {}", summary.total);
    println!("  Inserted: {}", summary.inserted.to_string().green());
    println!("  Updated:  {}", summary.updated.to_string().yellow());
    println!("  Skipped:  {}", summary.skipped.to_string().dimmed());
    println!("  Deleted:  {}", summary.deleted.to_string().red());

    if summary.errors.is_empty() {
        return;
    }

    println!();
    println!("{}", format!("{} issue(s):", summary.errors.len()).bold());
    for error in &summary.errors {
        let tag = match error.kind {
            RowErrorKind::KeyMissing => "missing key".yellow(),
            RowErrorKind::DuplicateKey => "duplicate".yellow(),
            RowErrorKind::MutationFailure => "failed".red().bold(),
        };
        println!("  [{}] {}", tag, error);
    }
}
