//! Shared state for command handlers

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::config::repository::open_pool;
use crate::store::SqliteStore;
use crate::sync::TableSpec;
use crate::tables;

/// Loaded config plus the resolved database url
pub struct AppContext {
    pub config: AppConfig,
    pub database_url: String,
}

impl AppContext {
    pub fn load(config_path: Option<&Path>, database: Option<String>) -> Result<Self> {
        let config = AppConfig::load(config_path)?;
        let database_url = database.unwrap_or_else(|| config.database_url());
        Ok(Self {
            config,
            database_url,
        })
    }

    /// Built-in tables merged with configured ones
    pub fn tables(&self) -> Vec<TableSpec> {
        tables::all_tables(&self.config.tables)
    }

    pub fn table(&self, name: &str) -> Result<TableSpec> {
        tables::find_table(&self.config.tables, name).ok_or_else(|| {
            let known: Vec<String> = self.tables().into_iter().map(|t| t.name).collect();
            anyhow!("Unknown table '{}' (known: {})", name, known.join(", "))
        })
    }

    /// Open the database, creating its directory if needed
    pub async fn pool(&self) -> Result<SqlitePool> {
        if let Some(parent) = sqlite_file_parent(&self.database_url) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        open_pool(&self.database_url).await
    }

    /// Open the store and make sure the table exists
    pub async fn open_store(&self, spec: &TableSpec) -> Result<Arc<SqliteStore>> {
        let store = SqliteStore::new(self.pool().await?);
        store.ensure_table(spec).await?;
        Ok(Arc::new(store))
    }
}

/// Directory of a file-backed sqlite url, if it has one
fn sqlite_file_parent(url: &str) -> Option<&Path> {
    let path = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    if path.starts_with(":memory:") {
        return None;
    }
    let path = path.split('?').next()?;
    Path::new(path).parent().filter(|p| !p.as_os_str().is_empty())
}
