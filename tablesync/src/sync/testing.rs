//! In-memory store with failure injection for engine tests

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::api::{MappingSource, TableStore};

use super::types::{CellValue, Record, TableSpec};

/// Build a record from string pairs
pub fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), CellValue::from(*v)))
        .collect()
}

pub fn materials_spec() -> TableSpec {
    crate::tables::materials()
}

pub fn products_spec() -> TableSpec {
    crate::tables::products()
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<String, Vec<Record>>>,
    failing_keys: Mutex<HashSet<String>>,
    fail_get_by_keys: AtomicBool,
    fail_key_pages: AtomicBool,
    fail_upsert_many: AtomicBool,
    get_by_keys_calls: AtomicUsize,
    key_page_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    upsert_many_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, table: &str, record: Record) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(record);
    }

    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn find(&self, table: &str, key_field: &str, key: &str) -> Option<Record> {
        self.rows(table)
            .into_iter()
            .find(|r| key_of(r, key_field).as_deref() == Some(key))
    }

    /// Any upsert or delete touching this key fails
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_get_by_keys(&self, fail: bool) {
        self.fail_get_by_keys.store(fail, Ordering::SeqCst);
    }

    pub fn fail_key_pages(&self, fail: bool) {
        self.fail_key_pages.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upsert_many(&self, fail: bool) {
        self.fail_upsert_many.store(fail, Ordering::SeqCst);
    }

    pub fn get_by_keys_calls(&self) -> usize {
        self.get_by_keys_calls.load(Ordering::SeqCst)
    }

    pub fn key_page_calls(&self) -> usize {
        self.key_page_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_many_calls(&self) -> usize {
        self.upsert_many_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn check_keys<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Result<()> {
        let failing = self.failing_keys.lock().unwrap();
        for key in keys {
            if failing.contains(key) {
                bail!("constraint violation on '{}'", key);
            }
        }
        Ok(())
    }

    fn apply_upsert(&self, table: &str, record: &Record, conflict_key: &str) -> Result<()> {
        let Some(key) = key_of(record, conflict_key) else {
            bail!("record has no '{}'", conflict_key);
        };
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        match rows
            .iter_mut()
            .find(|r| key_of(r, conflict_key).as_deref() == Some(key.as_str()))
        {
            Some(existing) => {
                for (field, value) in record {
                    existing.insert(field.clone(), value.clone());
                }
            }
            None => rows.push(record.clone()),
        }
        Ok(())
    }
}

fn key_of(record: &Record, key_field: &str) -> Option<String> {
    record.get(key_field).and_then(|v| v.as_key())
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn get_by_keys(&self, table: &str, key_field: &str, keys: &[String]) -> Result<Vec<Record>> {
        self.get_by_keys_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get_by_keys.load(Ordering::SeqCst) {
            bail!("connection reset");
        }
        let wanted: HashSet<&str> = keys.iter().map(|k| k.as_str()).collect();
        Ok(self
            .rows(table)
            .into_iter()
            .filter(|r| {
                key_of(r, key_field)
                    .map(|k| wanted.contains(k.as_str()))
                    .unwrap_or(false)
            })
            .collect())
    }

    async fn get_keys_page(
        &self,
        table: &str,
        key_field: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>> {
        self.key_page_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_key_pages.load(Ordering::SeqCst) {
            bail!("timeout");
        }
        let mut keys: Vec<String> = self
            .rows(table)
            .iter()
            .filter_map(|r| key_of(r, key_field))
            .collect();
        keys.sort();
        Ok(keys.into_iter().skip(offset).take(limit).collect())
    }

    async fn upsert(&self, table: &str, record: &Record, conflict_key: &str) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_keys(key_of(record, conflict_key).as_deref())?;
        self.apply_upsert(table, record, conflict_key)
    }

    async fn upsert_many(&self, table: &str, records: &[Record], conflict_key: &str) -> Result<()> {
        self.upsert_many_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_upsert_many.load(Ordering::SeqCst) {
            bail!("payload too large");
        }
        let keys: Vec<String> = records.iter().filter_map(|r| key_of(r, conflict_key)).collect();
        self.check_keys(keys.iter().map(|k| k.as_str()))?;
        for record in records {
            self.apply_upsert(table, record, conflict_key)?;
        }
        Ok(())
    }

    async fn delete_by_keys(&self, table: &str, key_field: &str, keys: &[String]) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_keys(keys.iter().map(|k| k.as_str()))?;
        let doomed: HashSet<&str> = keys.iter().map(|k| k.as_str()).collect();
        let mut tables = self.tables.lock().unwrap();
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|r| {
                key_of(r, key_field)
                    .map(|k| !doomed.contains(k.as_str()))
                    .unwrap_or(true)
            });
        }
        Ok(())
    }
}

/// Mapping source serving fixed rows, or failing
pub struct StaticMappings {
    pub rows: Vec<(String, String)>,
    pub fail: bool,
}

#[async_trait]
impl MappingSource for StaticMappings {
    async fn column_mappings(&self, _table: &str) -> Result<Vec<(String, String)>> {
        if self.fail {
            bail!("mapping table locked");
        }
        Ok(self.rows.clone())
    }
}
