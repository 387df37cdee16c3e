//! # strand-events
//!
//! The append-only event log a conversation session is projected from.
//!
//! - **Contract**: [`EventLog`] with `list_events`, `create_event` and
//!   `retrieve_memories`, mirroring what a hosted memory service exposes
//! - **Lineage model**: every event records its parent; a branch is a named
//!   head pointer, and forking re-points a branch at an earlier event (or at
//!   nothing) without touching existing events
//! - **Backends**: [`InMemoryEventLog`] (arena + head index) and
//!   [`SqliteEventLog`] (`rusqlite` + `r2d2`, embedded migrations, triggers
//!   that reject mutation of stored events)

#![deny(unsafe_code)]

pub mod errors;
pub mod log;
pub mod memory;
pub mod sqlite;
pub mod types;

pub use errors::{EventLogError, Result};
pub use log::{DEFAULT_MAX_RESULTS, EventLog};
pub use memory::InMemoryEventLog;
pub use sqlite::connection::{ConnectionConfig, ConnectionPool};
pub use sqlite::store::SqliteEventLog;
pub use types::*;
