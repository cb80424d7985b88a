//! Run-level errors
//!
//! Only problems that make the whole run meaningless end up here. Row and
//! batch problems are collected as [`RowError`](super::RowError)s instead.

/// Fatal error for a sync run
#[derive(Debug)]
pub enum SyncError {
    /// The table spec is inconsistent (unknown key field, etc.)
    InvalidTable { table: String, message: String },
    /// Existing state could not be read completely; nothing was mutated
    Fetch {
        table: String,
        stage: FetchStage,
        source: anyhow::Error,
    },
}

/// Which read failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// Batched lookup of the uploaded keys
    ExistingRecords,
    /// Paginated scan of all persisted keys
    KeyUniverse,
}

impl std::fmt::Display for FetchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStage::ExistingRecords => write!(f, "existing records"),
            FetchStage::KeyUniverse => write!(f, "persisted keys"),
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::InvalidTable { table, message } => {
                write!(f, "Invalid table spec '{}': {}", table, message)
            }
            SyncError::Fetch {
                table,
                stage,
                source,
            } => {
                write!(
                    f,
                    "Failed to fetch {} for '{}', run aborted before any change: {:#}",
                    stage, table, source
                )
            }
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::InvalidTable { .. } => None,
            SyncError::Fetch { source, .. } => Some(&**source),
        }
    }
}

impl SyncError {
    /// True when the error came from reading existing state
    pub fn is_fetch(&self) -> bool {
        matches!(self, SyncError::Fetch { .. })
    }
}
