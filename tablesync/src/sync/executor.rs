//! Apply planned upserts and deletions to the store.
//!
//! Every request result is collected; a failing record or batch is recorded
//! as a [`RowError`] and the remaining work continues. Requests run under the
//! shared [`ConcurrencyLimiter`], and results are gathered in submission
//! order so the error list is deterministic.

use std::collections::VecDeque;

use anyhow::anyhow;
use futures::future::join_all;

use crate::api::{ConcurrencyLimiter, TableStore};

use super::types::{Record, RowError, RowErrorKind, TableSpec, UpsertMode};

/// Counts and errors from one mutation phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseOutcome {
    /// Records or keys the store accepted
    pub applied: usize,
    pub errors: Vec<RowError>,
}

impl PhaseOutcome {
    fn merge(&mut self, other: PhaseOutcome) {
        self.applied += other.applied;
        self.errors.extend(other.errors);
    }
}

/// Issues mutations for one table
pub struct MutationExecutor<'a> {
    store: &'a dyn TableStore,
    limiter: &'a ConcurrencyLimiter,
    spec: &'a TableSpec,
}

impl<'a> MutationExecutor<'a> {
    pub fn new(store: &'a dyn TableStore, limiter: &'a ConcurrencyLimiter, spec: &'a TableSpec) -> Self {
        Self {
            store,
            limiter,
            spec,
        }
    }

    /// Upsert `(key, record)` pairs by natural key
    pub async fn upsert(&self, items: &[(String, Record)], mode: UpsertMode) -> PhaseOutcome {
        if items.is_empty() {
            return PhaseOutcome::default();
        }
        match mode {
            UpsertMode::PerRecord => self.upsert_each(items).await,
            UpsertMode::Batched { batch_size } => self.upsert_batched(items, batch_size.max(1)).await,
        }
    }

    async fn upsert_each(&self, items: &[(String, Record)]) -> PhaseOutcome {
        let futures = items.iter().map(|(key, record)| async move {
            let result = self
                .limiter
                .run(self.store.upsert(&self.spec.name, record, &self.spec.key_field))
                .await
                .map_err(|e| anyhow!("request slot unavailable: {}", e))
                .and_then(|r| r);
            (key, result)
        });

        let mut outcome = PhaseOutcome::default();
        for (key, result) in join_all(futures).await {
            match result {
                Ok(()) => outcome.applied += 1,
                Err(e) => {
                    log::warn!("Upsert of '{}' into '{}' failed: {:#}", key, self.spec.name, e);
                    outcome.errors.push(RowError::new(
                        RowErrorKind::MutationFailure,
                        key.clone(),
                        format!("{:#}", e),
                    ));
                }
            }
        }
        outcome
    }

    async fn upsert_batched(&self, items: &[(String, Record)], batch_size: usize) -> PhaseOutcome {
        let futures = items
            .chunks(batch_size)
            .map(|chunk| self.upsert_splitting(chunk));

        let mut outcome = PhaseOutcome::default();
        for batch_outcome in join_all(futures).await {
            outcome.merge(batch_outcome);
        }
        outcome
    }

    /// Send one batch; on failure retry its halves until single records are
    /// left, which are then recorded as errors.
    async fn upsert_splitting(&self, chunk: &[(String, Record)]) -> PhaseOutcome {
        let mut outcome = PhaseOutcome::default();
        let mut pending: VecDeque<&[(String, Record)]> = VecDeque::from([chunk]);

        while let Some(batch) = pending.pop_front() {
            let records: Vec<Record> = batch.iter().map(|(_, r)| r.clone()).collect();
            let result = self
                .limiter
                .run(
                    self.store
                        .upsert_many(&self.spec.name, &records, &self.spec.key_field),
                )
                .await
                .map_err(|e| anyhow!("request slot unavailable: {}", e))
                .and_then(|r| r);

            match result {
                Ok(()) => outcome.applied += batch.len(),
                Err(e) if batch.len() > 1 => {
                    log::debug!(
                        "Batch of {} upserts into '{}' failed, splitting: {:#}",
                        batch.len(),
                        self.spec.name,
                        e
                    );
                    let (left, right) = batch.split_at(batch.len() / 2);
                    // Keep original order: left half first
                    pending.push_front(right);
                    pending.push_front(left);
                }
                Err(e) => {
                    let key = &batch[0].0;
                    log::warn!("Upsert of '{}' into '{}' failed: {:#}", key, self.spec.name, e);
                    outcome.errors.push(RowError::new(
                        RowErrorKind::MutationFailure,
                        key.clone(),
                        format!("{:#}", e),
                    ));
                }
            }
        }

        outcome
    }

    /// Delete keys in batches of `batch_size`
    pub async fn delete(&self, keys: &[String], batch_size: usize) -> PhaseOutcome {
        if keys.is_empty() {
            return PhaseOutcome::default();
        }

        let futures = keys.chunks(batch_size.max(1)).map(|batch| async move {
            let result = self
                .limiter
                .run(
                    self.store
                        .delete_by_keys(&self.spec.name, &self.spec.key_field, batch),
                )
                .await
                .map_err(|e| anyhow!("request slot unavailable: {}", e))
                .and_then(|r| r);
            (batch, result)
        });

        let mut outcome = PhaseOutcome::default();
        for (batch, result) in join_all(futures).await {
            match result {
                Ok(()) => outcome.applied += batch.len(),
                Err(e) => {
                    log::warn!(
                        "Deleting {} keys from '{}' failed: {:#}",
                        batch.len(),
                        self.spec.name,
                        e
                    );
                    outcome.errors.push(RowError::new(
                        RowErrorKind::MutationFailure,
                        batch.join(","),
                        format!("delete batch failed: {:#}", e),
                    ));
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ConcurrencyConfig;
    use crate::sync::testing::{MemoryStore, materials_spec, record};

    fn items(keys: &[&str]) -> Vec<(String, Record)> {
        keys.iter()
            .map(|k| (k.to_string(), record(&[("material_number", k), ("material_name", "x")])))
            .collect()
    }

    #[tokio::test]
    async fn test_per_record_isolates_failures() {
        let store = MemoryStore::new();
        store.fail_key("M-2");
        let limiter = ConcurrencyLimiter::default();
        let spec = materials_spec();
        let executor = MutationExecutor::new(&store, &limiter, &spec);

        let outcome = executor
            .upsert(&items(&["M-1", "M-2", "M-3"]), UpsertMode::PerRecord)
            .await;

        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].key, "M-2");
        assert_eq!(outcome.errors[0].kind, RowErrorKind::MutationFailure);
        assert!(store.find("materials", "material_number", "M-3").is_some());
        assert_eq!(store.upsert_calls(), 3);
    }

    #[tokio::test]
    async fn test_batched_splits_down_to_failing_record() {
        let store = MemoryStore::new();
        store.fail_key("M-3");
        let limiter = ConcurrencyLimiter::new(ConcurrencyConfig::sequential());
        let spec = materials_spec();
        let executor = MutationExecutor::new(&store, &limiter, &spec);

        let outcome = executor
            .upsert(
                &items(&["M-1", "M-2", "M-3", "M-4", "M-5"]),
                UpsertMode::Batched { batch_size: 4 },
            )
            .await;

        assert_eq!(outcome.applied, 4);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].key, "M-3");
        assert_eq!(store.rows("materials").len(), 4);
        // [1..4] fails -> [1,2] ok, [3,4] fails -> [3] fails, [4] ok; [5] ok
        assert_eq!(store.upsert_many_calls(), 6);
    }

    #[tokio::test]
    async fn test_delete_batches_isolated() {
        let store = MemoryStore::new();
        for k in ["A", "B", "C", "D", "E"] {
            store.seed("materials", record(&[("material_number", k)]));
        }
        store.fail_key("C");
        let limiter = ConcurrencyLimiter::default();
        let spec = materials_spec();
        let executor = MutationExecutor::new(&store, &limiter, &spec);

        let keys: Vec<String> = ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect();
        let outcome = executor.delete(&keys, 2).await;

        assert_eq!(outcome.applied, 3);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].key, "C,D");
        assert_eq!(store.delete_calls(), 3);
        let left: Vec<String> = store
            .rows("materials")
            .iter()
            .map(|r| r["material_number"].to_string())
            .collect();
        assert_eq!(left, vec!["C".to_string(), "D".to_string()]);
    }
}
