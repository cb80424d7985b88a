//! `config.toml` loading, plus the sqlite repository for saved mappings

pub mod repository;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::ConcurrencyConfig;
use crate::sync::{EngineSettings, TableSpec, UpsertMode};

/// Top-level `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite url; defaults to a file in the user data dir
    pub database_url: Option<String>,
    pub engine: EngineConfig,
    /// Tables added to, or replacing, the built-in ones
    pub tables: Vec<TableSpec>,
}

/// `[engine]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fetch_batch_size: usize,
    pub key_page_size: usize,
    pub delete_batch_size: usize,
    /// Records per upsert request; 0 or unset means one request per record
    pub upsert_batch_size: Option<usize>,
    pub max_concurrent_requests: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let settings = EngineSettings::default();
        Self {
            fetch_batch_size: settings.fetch_batch_size,
            key_page_size: settings.key_page_size,
            delete_batch_size: settings.delete_batch_size,
            upsert_batch_size: None,
            max_concurrent_requests: settings.concurrency.max_concurrent_requests,
        }
    }
}

impl EngineConfig {
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            fetch_batch_size: self.fetch_batch_size,
            key_page_size: self.key_page_size,
            delete_batch_size: self.delete_batch_size,
            concurrency: ConcurrencyConfig::with_limit(self.max_concurrent_requests),
        }
    }

    pub fn upsert_mode(&self) -> UpsertMode {
        match self.upsert_batch_size {
            Some(n) if n > 0 => UpsertMode::Batched { batch_size: n },
            _ => UpsertMode::PerRecord,
        }
    }
}

impl AppConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tablesync").join("config.toml"))
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => {
                    log::debug!("No config directory on this platform, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !explicit && !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        log::debug!(
            "Loaded config from {} ({} extra tables)",
            path.display(),
            config.tables.len()
        );
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.engine
            .settings()
            .validate()
            .map_err(|e| anyhow::anyhow!("[engine] {}", e))?;
        for table in &self.tables {
            table
                .validate()
                .map_err(|e| anyhow::anyhow!("[[tables]] '{}': {}", table.name, e))?;
        }
        Ok(())
    }

    /// Database url from config, or the default file in the user data dir
    pub fn database_url(&self) -> String {
        if let Some(url) = &self.database_url {
            return url.clone();
        }
        match dirs::data_dir() {
            Some(dir) => format!("sqlite://{}", dir.join("tablesync").join("tablesync.db").display()),
            None => "sqlite://tablesync.db".to_string(),
        }
    }
}
