//! `SQLite` backend for the event log.
//!
//! - [`connection`]: `r2d2` pool with WAL and foreign keys
//! - [`migrations`]: embedded, version-tracked schema
//! - [`repositories`]: stateless query structs over a `&Connection`
//! - [`row_types`]: raw row shapes and their conversion to public types
//! - [`store`]: [`SqliteEventLog`](store::SqliteEventLog), the `EventLog` impl

pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod row_types;
pub mod store;
