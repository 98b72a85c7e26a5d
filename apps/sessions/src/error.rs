//! Error handling for the session service

use thiserror::Error;

/// Errors surfaced by document store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Errors from the read paths of the session reconciler.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session store is not configured")]
    StoreUnavailable,

    #[error("Invalid session document {id}: {source}")]
    InvalidDocument {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Result type alias for reconciler read operations
pub type Result<T> = std::result::Result<T, SessionError>;
