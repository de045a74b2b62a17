//! Persistence layer error types

use std::fmt;

use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// An update or delete addressed a row that does not exist.
    ///
    /// A unique-result query matching zero rows is *not* an error; it
    /// surfaces as `Ok(None)`.
    #[error("entity not found: {entity_type} with key {key}")]
    NotFound {
        entity_type: &'static str,
        key: String,
    },

    /// A save targeted a key that is already present.
    #[error("write conflict: {entity_type} with key {key} already exists")]
    Conflict {
        entity_type: &'static str,
        key: String,
    },

    /// A unique-result query matched more than one row.
    #[error("unique query over {entity_type} matched {count} rows")]
    TooManyResults {
        entity_type: &'static str,
        count: usize,
    },

    /// Transaction demarcation itself failed.
    #[error("transaction {phase} failed: {reason}")]
    Transaction { phase: TxPhase, reason: String },

    /// The store is unreachable or the connection is invalid.
    #[error("store unreachable: {0}")]
    Connectivity(String),

    /// An operation was invoked after the session was released.
    #[error("session has been closed")]
    SessionClosed,

    /// A selection bound a parameter no attribute of the entity matches.
    #[error("invalid query parameters: {0}")]
    InvalidQuery(String),
}

/// Phase of transaction demarcation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPhase {
    Begin,
    Commit,
    Rollback,
}

impl fmt::Display for TxPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::Commit => write!(f, "commit"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
