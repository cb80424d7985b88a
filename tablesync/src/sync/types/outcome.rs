//! Row classifications, run plans and run summaries

use serde::{Deserialize, Serialize};

use super::Record;

/// Why a row or batch ended up in the error list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorKind {
    /// No non-blank value under any key header
    KeyMissing,
    /// Key already seen earlier in the same upload
    DuplicateKey,
    /// Upsert or delete rejected by the store
    MutationFailure,
}

/// A per-row or per-batch problem. Never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Natural key, or comma-joined keys for a batch, or `row N` when no key
    pub key: String,
    /// Canonical field the problem relates to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub message: String,
    pub kind: RowErrorKind,
}

impl RowError {
    pub fn new(kind: RowErrorKind, key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            column: None,
            message: message.into(),
            kind,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.column {
            Some(column) => write!(f, "{} [{}]: {}", self.key, column, self.message),
            None => write!(f, "{}: {}", self.key, self.message),
        }
    }
}

/// Decision for a single normalized row
#[derive(Debug, Clone, PartialEq)]
pub enum RowClassification {
    /// No persisted record; `record` is the full row with fallbacks applied
    Insert {
        key: String,
        record: Record,
        fingerprint: String,
    },
    /// Persisted record differs; `patch` holds the key plus changed fields only
    Update { key: String, patch: Record },
    /// Persisted record already matches the upload
    Skip { key: String },
}

impl RowClassification {
    pub fn key(&self) -> &str {
        match self {
            RowClassification::Insert { key, .. }
            | RowClassification::Update { key, .. }
            | RowClassification::Skip { key } => key,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, RowClassification::Insert { .. })
    }

    pub fn is_update(&self) -> bool {
        matches!(self, RowClassification::Update { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, RowClassification::Skip { .. })
    }
}

/// Everything a run intends to do, computed before any mutation
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// Rows seen in the upload
    pub total: usize,
    /// Rows dropped by the normalizer (missing or duplicate key)
    pub dropped: usize,
    /// One classification per surviving row, in upload order
    pub classifications: Vec<RowClassification>,
    /// Persisted keys to delete
    pub deletions: Vec<String>,
    /// Errors recorded while normalizing
    pub errors: Vec<RowError>,
}

impl SyncPlan {
    pub fn insert_count(&self) -> usize {
        self.classifications.iter().filter(|c| c.is_insert()).count()
    }

    pub fn update_count(&self) -> usize {
        self.classifications.iter().filter(|c| c.is_update()).count()
    }

    /// Unchanged rows plus dropped rows
    pub fn skip_count(&self) -> usize {
        self.classifications.iter().filter(|c| c.is_skip()).count() + self.dropped
    }

    pub fn delete_count(&self) -> usize {
        self.deletions.len()
    }

    /// Summary as if every planned mutation succeeded
    pub fn to_summary(&self) -> RunSummary {
        RunSummary {
            ok: all_applied(&self.errors),
            total: self.total,
            inserted: self.insert_count(),
            updated: self.update_count(),
            skipped: self.skip_count(),
            deleted: self.delete_count(),
            errors: self.errors.clone(),
        }
    }
}

/// True when no recorded error came from a rejected mutation.
///
/// Dropped rows (missing or duplicate keys) are reported but do not make a
/// run unsuccessful.
pub fn all_applied(errors: &[RowError]) -> bool {
    !errors
        .iter()
        .any(|e| e.kind == RowErrorKind::MutationFailure)
}

/// The engine's only output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// True when every planned mutation was applied
    pub ok: bool,
    pub total: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub errors: Vec<RowError>,
}
