//! Error types for the PostgreSQL adapter
//!
//! Almost every failure here ends up inside an error-flagged tool response
//! rather than a protocol error; the Display text is what the caller sees.

use thiserror::Error;

/// Errors raised while mapping protocol requests onto database operations
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Required startup credential is missing (fixed-credential mode, fatal)
    #[error("missing required configuration: {0}")]
    Config(String),

    /// Required per-call credential is missing from the tool arguments
    #[error("missing connection credentials: {0}")]
    Credentials(String),

    /// The driver could not establish a connection
    ///
    /// Displays as the bare driver message; executors prepend their own
    /// tool-specific prefix.
    #[error("{0}")]
    Connection(#[source] sqlx::Error),

    /// A resource URI did not match `postgres://<table>/schema`
    #[error("invalid resource URI: {0}")]
    InvalidUri(String),

    /// Tool arguments failed validation
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Driver-reported SQL failure (query, DDL, or DML)
    #[error("{0}")]
    Sql(#[from] sqlx::Error),
}

/// Result alias used throughout the adapter
pub type AdapterResult<T> = Result<T, AdapterError>;
