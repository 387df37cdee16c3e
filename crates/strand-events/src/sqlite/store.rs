//! [`SqliteEventLog`]: the durable [`EventLog`] backend.
//!
//! Writes run inside one `IMMEDIATE` transaction, so the sequence number,
//! event row and branch head move together or not at all.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Transaction, TransactionBehavior};
use strand_core::{EventId, MemoryId};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{EventLogError, Result};
use crate::log::{EventLog, paginate, rank_memories, validate_create};
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::branch::BranchRepo;
use crate::sqlite::repositories::event::EventRepo;
use crate::sqlite::repositories::memory_record::MemoryRecordRepo;
use crate::sqlite::row_types::{EventRow, format_timestamp};
use crate::types::{
    BranchDescriptor, BranchInfo, BranchRef, CreateEventRequest, Event, EventPage, EventScope,
    ForkRoot, ListEventsRequest, MemoryRecord, RetrieveMemoriesRequest,
};

/// Event log persisted in a `SQLite` database.
pub struct SqliteEventLog {
    pool: ConnectionPool,
}

impl SqliteEventLog {
    /// Wrap an existing pool. The schema must already be migrated.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Open (or create) a database file and bring its schema up to date.
    pub fn open(path: impl AsRef<Path>, config: &ConnectionConfig) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_str().ok_or_else(|| {
            EventLogError::Unavailable(format!("non UTF-8 database path: {}", path.display()))
        })?;
        let pool = connection::new_file(path_str, config)?;
        {
            let conn = pool.get()?;
            connection::ensure_foreign_keys(&conn)?;
            let applied = run_migrations(&conn)?;
            let journal = connection::journal_mode(&conn)?;
            info!(path = %path.display(), applied, journal = %journal, "event log opened");
        }
        Ok(Self { pool })
    }

    /// A private in-memory database, migrated and ready.
    pub fn in_memory() -> Result<Self> {
        let pool = connection::new_in_memory(&ConnectionConfig::default())?;
        {
            let conn = pool.get()?;
            connection::ensure_foreign_keys(&conn)?;
            let _ = run_migrations(&conn)?;
        }
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Store a long-term memory record.
    pub fn insert_memory_record(
        &self,
        memory_id: &MemoryId,
        namespace: &str,
        text: &str,
    ) -> Result<MemoryRecord> {
        let record = MemoryRecord {
            record_id: format!("mrec_{}", Uuid::now_v7()),
            namespace: namespace.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
            score: 0.0,
        };
        let conn = self.conn()?;
        MemoryRecordRepo::insert(
            &conn,
            &record.record_id,
            memory_id.as_str(),
            namespace,
            text,
            &format_timestamp(&record.created_at),
        )?;
        Ok(record)
    }

    /// Named branches of a scope, ordered by name.
    pub fn list_branches(&self, scope: &EventScope) -> Result<Vec<BranchInfo>> {
        let conn = self.conn()?;
        BranchRepo::list(&conn, scope)?
            .into_iter()
            .map(crate::sqlite::row_types::BranchRow::into_info)
            .collect()
    }

    /// Total number of events stored for a scope across all branches.
    pub fn event_count(&self, scope: &EventScope) -> Result<u64> {
        let conn = self.conn()?;
        let count = EventRepo::count_by_scope(&conn, scope)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn head(
        tx: &rusqlite::Connection,
        scope: &EventScope,
        branch: Option<&str>,
    ) -> Result<Option<String>> {
        match branch {
            None => EventRepo::main_head(tx, scope),
            Some(name) => Ok(BranchRepo::get(tx, scope, name)?.and_then(|b| b.head_event_id)),
        }
    }

    fn resolve_fork_root(tx: &Transaction<'_>, scope: &EventScope, root: &ForkRoot) -> Result<Option<EventId>> {
        let ForkRoot::Event(id) = root else {
            return Ok(None);
        };
        match EventRepo::get_by_id(tx, id.as_str())? {
            Some(row)
                if row.memory_id == scope.memory_id.as_str()
                    && row.actor_id == scope.actor_id.as_str()
                    && row.session_id == scope.session_id.as_str() =>
            {
                Ok(Some(id.clone()))
            }
            _ => Err(EventLogError::EventNotFound(id.to_string())),
        }
    }
}

impl EventLog for SqliteEventLog {
    fn list_events(&self, request: &ListEventsRequest) -> Result<EventPage> {
        let conn = self.conn()?;
        let lineage = match Self::head(&conn, &request.scope, request.branch.as_deref())? {
            Some(head) => EventRepo::get_ancestors(&conn, &head)?
                .into_iter()
                .map(EventRow::into_event)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        paginate(lineage, request)
    }

    fn create_event(&self, request: CreateEventRequest) -> Result<Event> {
        validate_create(&request)?;
        let conn = self.conn()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;
        let scope = request.scope;

        let (parent_id, branch_ref) = match &request.branch {
            None => (EventRepo::main_head(&tx, &scope)?.map(EventId::from), None),
            Some(BranchDescriptor::Continue { name }) => (
                Self::head(&tx, &scope, Some(name))?.map(EventId::from),
                Some(BranchRef {
                    name: name.clone(),
                    root_event_id: None,
                }),
            ),
            Some(BranchDescriptor::Fork { name, root }) => {
                let parent = Self::resolve_fork_root(&tx, &scope, root)?;
                (
                    parent.clone(),
                    Some(BranchRef {
                        name: name.clone(),
                        root_event_id: parent,
                    }),
                )
            }
        };

        let event = Event {
            event_id: EventId::generate(),
            scope,
            branch: branch_ref,
            parent_id,
            timestamp: request.timestamp,
            payload: request.payload,
        };

        let sequence = EventRepo::next_sequence(&tx, &event.scope)?;
        EventRepo::insert(&tx, &event, sequence)?;

        let now = format_timestamp(&Utc::now());
        match &request.branch {
            None => {}
            Some(BranchDescriptor::Continue { name }) => {
                BranchRepo::advance_head(&tx, &event.scope, name, event.event_id.as_str(), &now)?;
            }
            Some(BranchDescriptor::Fork { name, .. }) => {
                BranchRepo::fork(
                    &tx,
                    &event.scope,
                    name,
                    event.parent_id.as_deref(),
                    event.event_id.as_str(),
                    &now,
                )?;
            }
        }
        tx.commit()?;

        debug!(
            event_id = %event.event_id,
            session_id = %event.scope.session_id,
            branch = event.branch_name().unwrap_or("main"),
            sequence,
            "event appended"
        );
        Ok(event)
    }

    fn retrieve_memories(&self, request: &RetrieveMemoriesRequest) -> Result<Vec<MemoryRecord>> {
        let conn = self.conn()?;
        let candidates = MemoryRecordRepo::list_by_namespace(
            &conn,
            request.memory_id.as_str(),
            &request.namespace,
        )?
        .into_iter()
        .map(crate::sqlite::row_types::MemoryRecordRow::into_record)
        .collect::<Result<Vec<_>>>()?;
        Ok(rank_memories(candidates, request))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
