//! Pooled `SQLite` connections.
//!
//! Every connection handed out by the pool has WAL journaling, enforced
//! foreign keys and a busy timeout applied when it is first opened.

use std::time::Duration;

use r2d2::{Builder, CustomizeConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::errors::{EventLogError, Result};

/// Pool of `SQLite` connections.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// A connection checked out of a [`ConnectionPool`].
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool sizing and per-connection tuning.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Upper bound on open connections (at least 1). In-memory pools hold one.
    pub pool_size: u32,
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u32,
    /// Page cache per connection, in KiB.
    pub cache_size_kib: i64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            busy_timeout_ms: 30_000,
            cache_size_kib: 8192,
        }
    }
}

/// Pragma batch run once on every new connection.
#[derive(Debug)]
struct Pragmas(String);

impl Pragmas {
    fn for_config(config: &ConnectionConfig) -> Self {
        Self(format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA synchronous = NORMAL;\
             PRAGMA foreign_keys = ON;\
             PRAGMA busy_timeout = {};\
             PRAGMA cache_size = -{};",
            config.busy_timeout_ms, config.cache_size_kib
        ))
    }
}

impl CustomizeConnection<Connection, rusqlite::Error> for Pragmas {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&self.0)
    }
}

/// Pool over a private in-memory database.
///
/// Each in-memory connection is its own database, so the pool keeps exactly
/// one connection open for its whole lifetime.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    let builder = Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None);
    build(builder, SqliteConnectionManager::memory(), config)
}

/// Pool over a database file, created if missing.
pub fn new_file(path: &str, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let builder = Pool::builder().max_size(config.pool_size.max(1));
    build(builder, SqliteConnectionManager::file(path), config)
}

fn build(
    builder: Builder<SqliteConnectionManager>,
    manager: SqliteConnectionManager,
    config: &ConnectionConfig,
) -> Result<ConnectionPool> {
    let pool = builder
        .connection_timeout(ACQUIRE_TIMEOUT)
        .connection_customizer(Box::new(Pragmas::for_config(config)))
        .build(manager)?;
    Ok(pool)
}

/// Journal mode of a connection: `wal` for files, `memory` in memory.
pub fn journal_mode(conn: &Connection) -> Result<String> {
    Ok(conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?)
}

/// Fail unless the connection enforces foreign keys.
///
/// Parent links between events are foreign keys; without enforcement an
/// event could name a parent that was never stored.
pub fn ensure_foreign_keys(conn: &Connection) -> Result<()> {
    let enabled: bool = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    if enabled {
        Ok(())
    } else {
        Err(EventLogError::Unavailable(
            "foreign key enforcement is disabled".into(),
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
