//! Error types for the session view.

use strand_events::EventLogError;

/// Errors surfaced by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The event log rejected or failed a call.
    #[error(transparent)]
    Log(#[from] EventLogError),

    /// The blocking task running a log call panicked or was cancelled.
    #[error("event log task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Convenience result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
