// Error taxonomy for the import pipeline
//
// Row-level problems never surface here: they become skip events on the sink.
// What is left is what stops an import.

use crate::entities::EntityKind;
use crate::import::ImportSummary;
use thiserror::Error;

/// Failure reported by a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A natural-key / unique index rejected the write.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A child was handed to the store before its parent had an id.
    #[error("{kind} references a parent that was never persisted")]
    UnresolvedParent { kind: EntityKind },

    /// An update was requested for an entity that was never inserted.
    #[error("cannot update {kind} without an id")]
    NotPersisted { kind: EntityKind },

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                StoreError::UniqueViolation(
                    message.clone().unwrap_or_else(|| code.to_string()),
                )
            }
            _ => StoreError::Sqlite(err),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Pipeline-level outcome that is not a success.
#[derive(Debug, Error)]
pub enum ImportError {
    /// DropAndReplace could not empty the tables; nothing was read.
    #[error("destructive reset failed, import aborted before reading rows")]
    Reset(#[source] StoreError),

    /// A batch could not be written. Batches committed before it remain.
    #[error("flush failed after {committed_flushes} committed batch(es)")]
    Flush {
        committed_flushes: usize,
        #[source]
        source: StoreError,
    },

    /// The CSV source itself failed (I/O, missing header row).
    #[error("failed to read CSV input")]
    Read(#[source] csv::Error),

    /// The run was cancelled. Not a failure; the summary covers committed work.
    #[error("import cancelled after {} processed row(s)", .summary.processed)]
    Cancelled { summary: ImportSummary },
}

impl ImportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ImportError::Cancelled { .. })
    }
}

/// Upload rejected before any import work starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("no file was uploaded")]
    Empty,

    #[error("only CSV files are supported (got {0:?})")]
    NotCsv(String),

    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
}

/// Invalid configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive integer (got {value:?})")]
    NotPositive { key: &'static str, value: String },

    #[error("unknown import mode {0:?} (expected UpdateAndAdd, AddOnly or DropAndReplace)")]
    UnknownMode(String),
}
