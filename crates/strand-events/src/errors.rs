//! Error types for the event log.
//!
//! [`EventLogError`] is returned by every [`EventLog`](crate::EventLog)
//! operation. Session code propagates it unchanged, so the variants describe
//! the log's failure modes rather than any caller's.

use thiserror::Error;

/// Errors that can occur during event log operations.
#[derive(Debug, Error)]
pub enum EventLogError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// Referenced event does not exist in the requested scope.
    #[error("event not found: {0}")]
    EventNotFound(String),

    /// The request was malformed (empty payload, zero page size, bad token).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The log could not be reached or refused the call.
    #[error("event log unavailable: {0}")]
    Unavailable(String),
}

/// Convenience type alias for event log results.
pub type Result<T> = std::result::Result<T, EventLogError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
