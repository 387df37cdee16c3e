//! The [`EventLog`] contract and lineage helpers shared by the backends.
//!
//! Calls are synchronous and may block on I/O. Async callers are expected to
//! move them onto a blocking pool.

use std::collections::HashSet;

use crate::errors::{EventLogError, Result};
use crate::types::{
    CreateEventRequest, Event, EventPage, EventScope, ListEventsRequest, MemoryRecord,
    RetrieveMemoriesRequest,
};

/// Default page size for [`EventLog::list_events`].
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// An append-only, branch-capable event log.
pub trait EventLog: Send + Sync {
    /// List events of a lineage chronologically (oldest first), one page at
    /// a time.
    fn list_events(&self, request: &ListEventsRequest) -> Result<EventPage>;

    /// Append one event and return it as stored.
    fn create_event(&self, request: CreateEventRequest) -> Result<Event>;

    /// Return up to `top_k` long-term memory records relevant to a query.
    fn retrieve_memories(&self, request: &RetrieveMemoriesRequest) -> Result<Vec<MemoryRecord>>;
}

/// Reject requests no backend can honour.
pub(crate) fn validate_create(request: &CreateEventRequest) -> Result<()> {
    if request.payload.is_empty() {
        return Err(EventLogError::InvalidRequest(
            "event payload must not be empty".into(),
        ));
    }
    if let Some(branch) = &request.branch {
        if branch.name().trim().is_empty() {
            return Err(EventLogError::InvalidRequest(
                "branch name must not be empty".into(),
            ));
        }
    }
    Ok(())
}

/// Apply branch filtering, payload stripping and offset pagination to a full
/// lineage (oldest first).
pub(crate) fn paginate(lineage: Vec<Event>, request: &ListEventsRequest) -> Result<EventPage> {
    if request.max_results == 0 {
        return Err(EventLogError::InvalidRequest(
            "max_results must be at least 1".into(),
        ));
    }
    let offset = match request.next_token.as_deref() {
        None => 0,
        Some(token) => token.parse::<usize>().map_err(|_| {
            EventLogError::InvalidRequest(format!("malformed next_token: {token}"))
        })?,
    };

    let mut events: Vec<Event> = match (&request.branch, request.include_parent_events) {
        (Some(name), false) => lineage
            .into_iter()
            .filter(|e| e.branch_name() == Some(name.as_str()))
            .collect(),
        _ => lineage,
    };

    let total = events.len();
    let end = offset.saturating_add(request.max_results).min(total);
    let mut page: Vec<Event> = if offset >= total {
        Vec::new()
    } else {
        events.drain(offset..end).collect()
    };
    if !request.include_payload {
        for event in &mut page {
            event.payload.clear();
        }
    }

    let next_token = (end < total).then(|| end.to_string());
    Ok(EventPage {
        events: page,
        next_token,
    })
}

/// Rank memory records against a query.
///
/// Score is the fraction of distinct query terms that occur in the record.
/// Records matching no term are dropped; ties go to the most recent record.
pub(crate) fn rank_memories(
    records: Vec<MemoryRecord>,
    request: &RetrieveMemoriesRequest,
) -> Vec<MemoryRecord> {
    let query_terms = terms(&request.query);
    if query_terms.is_empty() || request.top_k == 0 {
        return Vec::new();
    }

    #[allow(clippy::cast_precision_loss)]
    let denominator = query_terms.len() as f64;
    let mut scored: Vec<MemoryRecord> = records
        .into_iter()
        .filter_map(|mut record| {
            let record_terms = terms(&record.text);
            let hits = query_terms.intersection(&record_terms).count();
            if hits == 0 {
                return None;
            }
            #[allow(clippy::cast_precision_loss)]
            let score = hits as f64 / denominator;
            record.score = score;
            Some(record)
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    scored.truncate(request.top_k);
    scored
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// `true` if `scope` owns `event`.
pub(crate) fn in_scope(event: &Event, scope: &EventScope) -> bool {
    &event.scope == scope
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
