//! # strand-session
//!
//! A conversation session presented as an ordered, editable list of items,
//! projected from an append-only event log that cannot delete anything.
//!
//! - [`MemorySession`] keeps a small view state (current branch, pending
//!   fork, cleared flag, visible window) and turns `pop` into a branch fork
//!   and `clear` into a view-local window
//! - [`roles`] normalizes item roles and text at the write boundary
//! - [`context`] renders long-term memories as an extra input item
//!
//! Every log call runs on tokio's blocking pool.

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod items;
pub mod memory_session;
pub mod naming;
pub mod roles;
pub mod session;

pub use errors::{Result, SessionError};
pub use items::{ContentPart, ItemContent, ItemRole, ResponseItem};
pub use memory_session::{MemorySession, SessionConfig};
pub use session::Session;
