//! Persistence seam used by the sync engine
//!
//! The engine never talks to a database directly. Hosts hand it a
//! [`TableStore`] for the target table and a [`MappingSource`] for the
//! user-editable header mappings.

pub mod resilience;

use anyhow::Result;
use async_trait::async_trait;

use crate::sync::Record;

pub use resilience::{ConcurrencyConfig, ConcurrencyLimiter};

/// Keyed access to one or more target tables
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Fetch the persisted records whose key is in `keys`.
    ///
    /// Keys with no persisted record are simply absent from the result.
    async fn get_by_keys(&self, table: &str, key_field: &str, keys: &[String]) -> Result<Vec<Record>>;

    /// One page of persisted keys, in a stable order
    async fn get_keys_page(
        &self,
        table: &str,
        key_field: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<String>>;

    /// Insert the record, or update the provided fields of the row sharing
    /// its `conflict_key` value. Fields not in `record` are left alone.
    async fn upsert(&self, table: &str, record: &Record, conflict_key: &str) -> Result<()>;

    /// Upsert several records in one request. Either all apply or none do.
    async fn upsert_many(&self, table: &str, records: &[Record], conflict_key: &str) -> Result<()> {
        for record in records {
            self.upsert(table, record, conflict_key).await?;
        }
        Ok(())
    }

    /// Delete every row whose key is in `keys`
    async fn delete_by_keys(&self, table: &str, key_field: &str, keys: &[String]) -> Result<()>;
}

/// Read access to the persisted, user-editable header mappings
#[async_trait]
pub trait MappingSource: Send + Sync {
    /// `(header label, canonical field)` pairs for a table, in edit order
    async fn column_mappings(&self, table: &str) -> Result<Vec<(String, String)>>;
}

/// A mapping source with nothing persisted
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMappings;

#[async_trait]
impl MappingSource for NoMappings {
    async fn column_mappings(&self, _table: &str) -> Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }
}
