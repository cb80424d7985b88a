//! Run-level options

use serde::{Deserialize, Serialize};

use super::MappingEntry;

/// Which persisted rows absent from the upload get removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionPolicy {
    /// Remove nothing
    #[default]
    None,
    /// Remove persisted keys that are not in the current upload
    Missing,
    /// Remove every persisted key, then insert the upload
    All,
}

impl std::fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeletionPolicy::None => write!(f, "none"),
            DeletionPolicy::Missing => write!(f, "missing"),
            DeletionPolicy::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for DeletionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(DeletionPolicy::None),
            "missing" => Ok(DeletionPolicy::Missing),
            "all" => Ok(DeletionPolicy::All),
            other => Err(format!(
                "unknown deletion policy '{}' (expected none, missing or all)",
                other
            )),
        }
    }
}

/// How inserts and updates are sent to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertMode {
    /// One request per record; a failing record never blocks another
    #[default]
    PerRecord,
    /// One request per `batch_size` records, splitting failed batches
    Batched { batch_size: usize },
}

/// Options for a single sync run
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Header mappings that win over persisted and built-in ones
    pub header_overrides: Vec<MappingEntry>,
    pub deletion_policy: DeletionPolicy,
    pub upsert_mode: UpsertMode,
    /// Plan only; report the counts without touching the store
    pub dry_run: bool,
}

impl SyncOptions {
    pub fn with_policy(mut self, policy: DeletionPolicy) -> Self {
        self.deletion_policy = policy;
        self
    }

    pub fn with_override(mut self, header: impl Into<String>, field: impl Into<String>) -> Self {
        self.header_overrides.push(MappingEntry::new(header, field));
        self
    }

    pub fn with_upsert_mode(mut self, mode: UpsertMode) -> Self {
        self.upsert_mode = mode;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Missing".parse::<DeletionPolicy>(), Ok(DeletionPolicy::Missing));
        assert_eq!(" all ".parse::<DeletionPolicy>(), Ok(DeletionPolicy::All));
        assert!("some".parse::<DeletionPolicy>().is_err());
        assert_eq!(DeletionPolicy::default(), DeletionPolicy::None);
    }
}
