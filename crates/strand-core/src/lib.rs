//! # strand-core
//!
//! Foundation types shared by every strand crate:
//!
//! - **Branded IDs**: `EventId`, `MemoryId`, `ActorId`, `SessionId` as newtypes
//!   so a session id can never be passed where an event id is expected
//! - **Logging**: `tracing` subscriber setup and in-memory log capture for tests

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;

pub use ids::{ActorId, EventId, MemoryId, SessionId};
