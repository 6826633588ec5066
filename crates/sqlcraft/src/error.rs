//! Error types for sqlcraft

use std::time::Duration;
use thiserror::Error;

/// Result type alias for sqlcraft operations
pub type DbResult<T> = Result<T, DbError>;

/// Error types for building and executing statements
#[derive(Debug, Error)]
pub enum DbError {
    /// Invalid configuration (unsupported placeholder style, bad identifiers, pool sizing)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Statement could not be built (ambiguous FROM, HAVING without GROUP BY, ...)
    #[error("Build error: {0}")]
    Build(String),

    /// Statement was built without a database and cannot be executed
    #[error("Statement has no database to execute against")]
    NoDatabase,

    /// Column lookup on a table expression failed
    #[error("Unknown column '{column}' on '{owner}'")]
    UnknownColumn { owner: String, column: String },

    /// Rebinding a named parameter that the query does not have
    #[error("Unknown parameter: {0}")]
    UnknownParam(String),

    /// Driver failed to open a connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// Driver failed while executing a statement
    #[error("Driver error: {0}")]
    Driver(String),

    /// PostgreSQL driver error, passed through unchanged
    #[cfg(feature = "postgres")]
    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Pool error (closed pool)
    #[error("Pool error: {0}")]
    Pool(String),

    /// Connection checkout timed out
    #[error("Checkout timeout after {0:?}")]
    Timeout(Duration),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },
}

impl DbError {
    /// Create a build error
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an unknown column error
    pub fn unknown_column(owner: impl Into<String>, column: impl Into<String>) -> Self {
        Self::UnknownColumn {
            owner: owner.into(),
            column: column.into(),
        }
    }

    /// Check if this is a build-time error
    pub fn is_build(&self) -> bool {
        matches!(self, Self::Build(_))
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
