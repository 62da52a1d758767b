//! Failure taxonomy shared by the content store, the SQL layer and the
//! repository.
//!
//! Every failure below the HTTP facade is one of these variants. The
//! facade maps them to status codes and logs the cause; nothing here is
//! swallowed except the missing-image fallback in
//! [`ContentStore::locate`](crate::storage::ContentStore::locate).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T, E = ListingError> = std::result::Result<T, E>;

/// Errors produced while ingesting or reading listings
#[derive(Debug, Error)]
pub enum ListingError {
    /// Missing or malformed input
    #[error("invalid input: {0}")]
    Validation(String),

    /// No row exists for the requested item id
    #[error("item not found: id={0}")]
    NotFound(i64),

    /// Filesystem failure in the content store
    #[error("storage failure at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Database failure, tagged with the step that failed
    #[error("persistence failure during {step}: {source}")]
    Persistence {
        step: PersistenceStep,
        #[source]
        source: rusqlite::Error,
    },

    /// A concurrent transaction created the same category first
    #[error("category already exists: {0}")]
    Conflict(String),

    /// A blocking database task panicked or was cancelled
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ListingError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn persistence(step: PersistenceStep, source: rusqlite::Error) -> Self {
        Self::Persistence { step, source }
    }

    /// True for the not-found variant
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// The database step a [`ListingError::Persistence`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceStep {
    /// Opening or checking out a pooled connection
    Checkout,
    /// Running schema statements
    Migrate,
    /// Opening the ingestion transaction
    Begin,
    /// Looking up or inserting the category row
    ResolveCategory,
    /// Inserting the item row
    InsertItem,
    /// Committing the ingestion transaction
    Commit,
    /// A read-only query
    Query,
}

impl fmt::Display for PersistenceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            PersistenceStep::Checkout => "checkout",
            PersistenceStep::Migrate => "migrate",
            PersistenceStep::Begin => "begin",
            PersistenceStep::ResolveCategory => "resolve category",
            PersistenceStep::InsertItem => "insert item",
            PersistenceStep::Commit => "commit",
            PersistenceStep::Query => "query",
        };
        write!(f, "{}", step)
    }
}
