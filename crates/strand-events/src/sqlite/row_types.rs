//! Raw row shapes and their conversion into public types.
//!
//! Row mappers stay inside `rusqlite`'s error type; JSON and timestamp
//! decoding happens afterwards in the `into_*` conversions.

use chrono::{DateTime, SecondsFormat, Utc};
use strand_core::EventId;

use crate::errors::Result;
use crate::types::{BranchInfo, BranchRef, Event, EventScope, MemoryRecord, PayloadEntry};

/// Format a timestamp the way every table stores it.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

/// Raw row from the `events` table.
#[derive(Clone, Debug)]
pub struct EventRow {
    /// Event ID.
    pub id: String,
    /// Memory ID.
    pub memory_id: String,
    /// Actor ID.
    pub actor_id: String,
    /// Session ID.
    pub session_id: String,
    /// Branch name (null on the default lineage).
    pub branch_name: Option<String>,
    /// Fork root recorded on the forking event.
    pub root_event_id: Option<String>,
    /// Parent event ID.
    pub parent_id: Option<String>,
    /// Per-scope insertion sequence.
    pub sequence: i64,
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// JSON-encoded payload entries.
    pub payload: String,
}

impl EventRow {
    /// Decode into an [`Event`].
    pub fn into_event(self) -> Result<Event> {
        let payload: Vec<PayloadEntry> = serde_json::from_str(&self.payload)?;
        let timestamp = parse_timestamp(&self.timestamp)?;
        let branch = self.branch_name.map(|name| BranchRef {
            name,
            root_event_id: self.root_event_id.map(EventId::from),
        });
        Ok(Event {
            event_id: EventId::from(self.id),
            scope: EventScope::new(self.memory_id, self.actor_id, self.session_id),
            branch,
            parent_id: self.parent_id.map(EventId::from),
            timestamp,
            payload,
        })
    }
}

/// Raw row from the `branches` table.
#[derive(Clone, Debug)]
pub struct BranchRow {
    /// Branch name.
    pub name: String,
    /// Fork root event ID.
    pub root_event_id: Option<String>,
    /// Head event ID.
    pub head_event_id: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last head move.
    pub updated_at: String,
}

impl BranchRow {
    /// Decode into a [`BranchInfo`].
    pub fn into_info(self) -> Result<BranchInfo> {
        Ok(BranchInfo {
            name: self.name,
            root_event_id: self.root_event_id.map(EventId::from),
            head_event_id: self.head_event_id.map(EventId::from),
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Raw row from the `memory_records` table.
#[derive(Clone, Debug)]
pub struct MemoryRecordRow {
    /// Record ID.
    pub id: String,
    /// Namespace.
    pub namespace: String,
    /// Body.
    pub text: String,
    /// Creation timestamp.
    pub created_at: String,
}

impl MemoryRecordRow {
    /// Decode into a [`MemoryRecord`] with a zero score.
    pub fn into_record(self) -> Result<MemoryRecord> {
        Ok(MemoryRecord {
            record_id: self.id,
            namespace: self.namespace,
            text: self.text,
            created_at: parse_timestamp(&self.created_at)?,
            score: 0.0,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
