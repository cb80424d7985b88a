//! Fetch existing state from the store before diffing.
//!
//! This module handles:
//! - Batched lookup of the uploaded keys (bounded parallelism)
//! - Paginated scan of the full persisted key universe
//!
//! Any failure here aborts the run: diffing against partial state would turn
//! updates into inserts and skips into updates.

use std::collections::HashMap;

use anyhow::anyhow;
use futures::future::join_all;

use crate::api::{ConcurrencyLimiter, TableStore};

use super::error::{FetchStage, SyncError};
use super::types::{Record, TableSpec};

/// Persisted records by trimmed natural key
pub type ExistingRecords = HashMap<String, Record>;

/// Fetch persisted records for the uploaded keys in batches of `batch_size`
pub async fn fetch_existing(
    store: &dyn TableStore,
    limiter: &ConcurrencyLimiter,
    spec: &TableSpec,
    keys: &[String],
    batch_size: usize,
) -> Result<ExistingRecords, SyncError> {
    let batch_size = batch_size.max(1);
    let mut existing = ExistingRecords::with_capacity(keys.len());
    if keys.is_empty() {
        return Ok(existing);
    }

    let batches: Vec<&[String]> = keys.chunks(batch_size).collect();
    log::debug!(
        "Fetching existing '{}' records: {} keys in {} batches",
        spec.name,
        keys.len(),
        batches.len()
    );

    let futures = batches.iter().enumerate().map(|(index, batch)| async move {
        let result = limiter
            .run(store.get_by_keys(&spec.name, &spec.key_field, batch))
            .await
            .map_err(|e| anyhow!("request slot unavailable: {}", e))
            .and_then(|r| r);
        (index, result)
    });

    for (index, result) in join_all(futures).await {
        let records = result.map_err(|e| {
            log::error!("Existing-state batch {} for '{}' failed: {:#}", index + 1, spec.name, e);
            SyncError::Fetch {
                table: spec.name.clone(),
                stage: FetchStage::ExistingRecords,
                source: e,
            }
        })?;

        for record in records {
            match record.get(&spec.key_field).and_then(|v| v.as_key()) {
                Some(key) => {
                    existing.insert(key, record);
                }
                None => log::warn!(
                    "Store returned a '{}' record without '{}', ignoring it",
                    spec.name,
                    spec.key_field
                ),
            }
        }
    }

    log::info!(
        "Found {} existing '{}' records for {} uploaded keys",
        existing.len(),
        spec.name,
        keys.len()
    );
    Ok(existing)
}

/// Fetch every persisted key, one page of `page_size` at a time, until a
/// short page signals the end
pub async fn fetch_key_universe(
    store: &dyn TableStore,
    spec: &TableSpec,
    page_size: usize,
) -> Result<Vec<String>, SyncError> {
    let page_size = page_size.max(1);
    let mut keys = Vec::new();
    let mut offset = 0;

    loop {
        let page = store
            .get_keys_page(&spec.name, &spec.key_field, offset, page_size)
            .await
            .map_err(|e| {
                log::error!(
                    "Key page at offset {} for '{}' failed: {:#}",
                    offset,
                    spec.name,
                    e
                );
                SyncError::Fetch {
                    table: spec.name.clone(),
                    stage: FetchStage::KeyUniverse,
                    source: e,
                }
            })?;

        let fetched = page.len();
        log::debug!("Fetched {} keys of '{}' at offset {}", fetched, spec.name, offset);
        keys.extend(page);
        offset += fetched;

        if fetched < page_size {
            break;
        }
    }

    log::info!("'{}' holds {} persisted keys", spec.name, keys.len());
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ConcurrencyConfig;
    use crate::sync::testing::{MemoryStore, materials_spec, record};

    #[tokio::test]
    async fn test_fetch_existing_batches() {
        let store = MemoryStore::new();
        for i in 0..25 {
            store.seed("materials", record(&[("material_number", &format!("M-{}", i))]));
        }
        let keys: Vec<String> = (0..30).map(|i| format!("M-{}", i)).collect();
        let limiter = ConcurrencyLimiter::new(ConcurrencyConfig::with_limit(3));

        let existing = fetch_existing(&store, &limiter, &materials_spec(), &keys, 10)
            .await
            .unwrap();

        assert_eq!(existing.len(), 25);
        assert!(existing.contains_key("M-24"));
        assert_eq!(store.get_by_keys_calls(), 3);
    }

    #[tokio::test]
    async fn test_fetch_existing_failure_is_fatal() {
        let store = MemoryStore::new();
        store.fail_get_by_keys(true);
        let limiter = ConcurrencyLimiter::default();

        let err = fetch_existing(&store, &limiter, &materials_spec(), &["M-1".to_string()], 10)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Fetch {
                stage: FetchStage::ExistingRecords,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_key_universe_paginates_until_short_page() {
        let store = MemoryStore::new();
        for i in 0..7 {
            store.seed("materials", record(&[("material_number", &format!("M-{}", i))]));
        }

        let keys = fetch_key_universe(&store, &materials_spec(), 3).await.unwrap();

        assert_eq!(keys.len(), 7);
        // 3 + 3 + 1
        assert_eq!(store.key_page_calls(), 3);
    }

    #[tokio::test]
    async fn test_key_universe_exact_multiple_needs_empty_page() {
        let store = MemoryStore::new();
        for i in 0..6 {
            store.seed("materials", record(&[("material_number", &format!("M-{}", i))]));
        }

        let keys = fetch_key_universe(&store, &materials_spec(), 3).await.unwrap();

        assert_eq!(keys.len(), 6);
        assert_eq!(store.key_page_calls(), 3);
    }
}
