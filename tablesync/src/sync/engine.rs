//! Sync orchestration: mapping -> normalize -> fetch -> diff -> mutate
//!
//! Phases run strictly one after the other. Reads finish before the diff
//! starts, and the diff finishes before the first mutation, because the
//! classification is only correct against complete existing state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{ConcurrencyConfig, ConcurrencyLimiter, MappingSource, TableStore};

use super::deletion::deletion_set;
use super::diff::classify_all;
use super::error::SyncError;
use super::executor::MutationExecutor;
use super::fetch::{ExistingRecords, fetch_existing, fetch_key_universe};
use super::mapping::resolve_mapping;
use super::normalize::normalize_rows;
use super::types::{
    DeletionPolicy, RawRow, Record, RowClassification, RunSummary, SyncOptions, SyncPlan,
    TableSpec, all_applied,
};

/// Batch sizes and load limits shared by every run of an engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Keys per existing-record lookup
    pub fetch_batch_size: usize,
    /// Keys per page when scanning the persisted key universe
    pub key_page_size: usize,
    /// Keys per delete request
    pub delete_batch_size: usize,
    /// Bound on in-flight store requests
    pub concurrency: ConcurrencyConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fetch_batch_size: 1000,
            key_page_size: 1000,
            delete_batch_size: 100,
            concurrency: ConcurrencyConfig::default(),
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.fetch_batch_size == 0 {
            return Err("fetch_batch_size must be greater than 0".to_string());
        }
        if self.key_page_size == 0 {
            return Err("key_page_size must be greater than 0".to_string());
        }
        if self.delete_batch_size == 0 {
            return Err("delete_batch_size must be greater than 0".to_string());
        }
        self.concurrency.validate()
    }
}

/// Reconciles uploads into tables behind a [`TableStore`]
pub struct SyncEngine {
    store: Arc<dyn TableStore>,
    mappings: Arc<dyn MappingSource>,
    limiter: ConcurrencyLimiter,
    settings: EngineSettings,
}

impl SyncEngine {
    pub fn new(
        store: Arc<dyn TableStore>,
        mappings: Arc<dyn MappingSource>,
        settings: EngineSettings,
    ) -> Self {
        let limiter = ConcurrencyLimiter::new(settings.concurrency.clone());
        Self {
            store,
            mappings,
            limiter,
            settings,
        }
    }

    /// Run a full sync of `rows` into the table described by `spec`.
    ///
    /// Only a failed read of existing state (or an invalid spec) returns
    /// `Err`; in that case nothing has been written. Row and batch failures
    /// are reported in [`RunSummary::errors`].
    pub async fn sync_table(
        &self,
        spec: &TableSpec,
        rows: &[RawRow],
        options: &SyncOptions,
    ) -> Result<RunSummary, SyncError> {
        let run_id = Uuid::new_v4();
        log::info!(
            "[{}] Sync of {} rows into '{}' (deletion policy: {}{})",
            run_id,
            rows.len(),
            spec.name,
            options.deletion_policy,
            if options.dry_run { ", dry run" } else { "" }
        );

        let plan = match self.plan_sync(spec, rows, options).await {
            Ok(plan) => plan,
            Err(e) => {
                log::error!("[{}] {}", run_id, e);
                return Err(e);
            }
        };

        let summary = if options.dry_run {
            plan.to_summary()
        } else {
            self.apply_plan(spec, &plan, options).await
        };

        log::info!(
            "[{}] '{}' done: {} total, {} inserted, {} updated, {} skipped, {} deleted, {} errors",
            run_id,
            spec.name,
            summary.total,
            summary.inserted,
            summary.updated,
            summary.skipped,
            summary.deleted,
            summary.errors.len()
        );

        Ok(summary)
    }

    /// Read phase: map, normalize, fetch and diff without writing anything
    pub async fn plan_sync(
        &self,
        spec: &TableSpec,
        rows: &[RawRow],
        options: &SyncOptions,
    ) -> Result<SyncPlan, SyncError> {
        spec.validate().map_err(|message| SyncError::InvalidTable {
            table: spec.name.clone(),
            message,
        })?;

        let mapping = resolve_mapping(self.mappings.as_ref(), spec, &options.header_overrides).await;
        let upload = normalize_rows(rows, &mapping, spec);
        let keys = upload.keys();

        // Everything is removed before inserting under `All`, so every row
        // is diffed against an empty table.
        let existing = match options.deletion_policy {
            DeletionPolicy::All => ExistingRecords::new(),
            _ => {
                fetch_existing(
                    self.store.as_ref(),
                    &self.limiter,
                    spec,
                    &keys,
                    self.settings.fetch_batch_size,
                )
                .await?
            }
        };

        let deletions = match options.deletion_policy {
            DeletionPolicy::None => Vec::new(),
            policy => {
                let universe =
                    fetch_key_universe(self.store.as_ref(), spec, self.settings.key_page_size).await?;
                deletion_set(policy, &universe, &keys)
            }
        };

        let classifications = classify_all(spec, &upload, &existing);

        Ok(SyncPlan {
            total: rows.len(),
            dropped: upload.skipped,
            classifications,
            deletions,
            errors: upload.errors,
        })
    }

    /// Write phase: deletions, then inserts, then updates
    pub async fn apply_plan(&self, spec: &TableSpec, plan: &SyncPlan, options: &SyncOptions) -> RunSummary {
        let executor = MutationExecutor::new(self.store.as_ref(), &self.limiter, spec);

        let deleted = executor
            .delete(&plan.deletions, self.settings.delete_batch_size)
            .await;

        let mut inserts: Vec<(String, Record)> = Vec::new();
        let mut updates: Vec<(String, Record)> = Vec::new();
        for classification in &plan.classifications {
            match classification {
                RowClassification::Insert { key, record, .. } => {
                    inserts.push((key.clone(), record.clone()))
                }
                RowClassification::Update { key, patch } => updates.push((key.clone(), patch.clone())),
                RowClassification::Skip { .. } => {}
            }
        }

        let inserted = executor.upsert(&inserts, options.upsert_mode).await;
        let updated = executor.upsert(&updates, options.upsert_mode).await;

        let mut errors = plan.errors.clone();
        errors.extend(deleted.errors);
        errors.extend(inserted.errors);
        errors.extend(updated.errors);

        RunSummary {
            ok: all_applied(&errors),
            total: plan.total,
            inserted: inserted.applied,
            updated: updated.applied,
            skipped: plan.skip_count(),
            deleted: deleted.applied,
            errors,
        }
    }
}
