//! Error taxonomy for the store, the guarded query layer and the seed path.
//!
//! Validation rejections and store failures are deliberately separate types
//! so the tool surface can tell a refusal apart from a transient failure.

use thiserror::Error;

// ---

/// Failure reported by the underlying database.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cannot decode column `{column}` of type {type_name}")]
    Decode { column: String, type_name: String },

    #[error("unexpected row shape: {0}")]
    RowShape(String),
}

/// The rule a raw query violated. `Display` names the rule only and never
/// echoes the rejected text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    NotSelect,
    ForbiddenKeyword(&'static str),
    MultipleStatements,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Empty => write!(f, "query is empty"),
            RejectReason::NotSelect => {
                write!(f, "only SELECT queries are allowed; query must start with SELECT")
            }
            RejectReason::ForbiddenKeyword(kw) => {
                write!(f, "query contains forbidden keyword: {kw}")
            }
            RejectReason::MultipleStatements => {
                write!(f, "only a single statement is allowed")
            }
        }
    }
}

/// Error returned by every read operation of the query layer.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("rejected query: {0}")]
    Rejected(RejectReason),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A batch insert failed; nothing after `offset` was written.
#[derive(Debug, Error)]
#[error("batch starting at row {offset} ({size} rows) failed: {source}")]
pub struct PersistError {
    pub offset: usize,
    pub size: usize,
    #[source]
    pub source: StoreError,
}

/// Error returned by the ingest path.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("validation failed: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error(transparent)]
    Store(#[from] StoreError),
}
