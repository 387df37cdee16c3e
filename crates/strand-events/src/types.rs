//! Event log data model.
//!
//! All types use `#[serde(rename_all = "camelCase")]` so stored payloads and
//! CLI output share one JSON shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strand_core::{ActorId, EventId, MemoryId, SessionId};

/// The (memory, actor, session) triple every event is scoped by.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventScope {
    /// Memory resource the events belong to.
    pub memory_id: MemoryId,
    /// End-user the conversation is with.
    pub actor_id: ActorId,
    /// Conversation/thread id.
    pub session_id: SessionId,
}

impl EventScope {
    /// Build a scope from anything convertible into the three ids.
    pub fn new(
        memory_id: impl Into<MemoryId>,
        actor_id: impl Into<ActorId>,
        session_id: impl Into<SessionId>,
    ) -> Self {
        Self {
            memory_id: memory_id.into(),
            actor_id: actor_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// The log's closed role vocabulary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogRole {
    /// Caller-supplied input.
    User,
    /// Model-produced output.
    Assistant,
    /// Tool output.
    Tool,
    /// Anything else.
    Other,
}

impl LogRole {
    /// Wire name of the role.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Assistant => "ASSISTANT",
            Self::Tool => "TOOL",
            Self::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for LogRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conversational payload entry: one role-tagged message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversational {
    /// Who produced the message.
    pub role: LogRole,
    /// Message body.
    pub text: String,
}

impl Conversational {
    /// Build a conversational entry.
    pub fn new(role: LogRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// One entry in an event's payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayloadEntry {
    /// A conversational turn.
    Conversational(Conversational),
    /// Opaque structured data that is not part of the conversation.
    Blob(Value),
}

impl PayloadEntry {
    /// The conversational entry, if this is one.
    pub fn as_conversational(&self) -> Option<&Conversational> {
        match self {
            Self::Conversational(c) => Some(c),
            Self::Blob(_) => None,
        }
    }
}

/// Branch metadata recorded on an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRef {
    /// Branch the event was written on.
    pub name: String,
    /// Fork root, present only on the event that (re-)created the branch
    /// from an existing event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_event_id: Option<EventId>,
}

/// An immutable record in the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Opaque id.
    pub event_id: EventId,
    /// Scope the event belongs to.
    pub scope: EventScope,
    /// Branch the event was written on; `None` for the default lineage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchRef>,
    /// Previous event in this event's lineage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EventId>,
    /// Ordering timestamp supplied by the writer.
    pub timestamp: DateTime<Utc>,
    /// Payload entries (empty when listed without payloads).
    #[serde(default)]
    pub payload: Vec<PayloadEntry>,
}

impl Event {
    /// Conversational entries in payload order.
    pub fn conversational(&self) -> impl DoubleEndedIterator<Item = &Conversational> {
        self.payload.iter().filter_map(PayloadEntry::as_conversational)
    }

    /// Name of the branch the event was written on.
    pub fn branch_name(&self) -> Option<&str> {
        self.branch.as_ref().map(|b| b.name.as_str())
    }
}

/// Where a fork starts from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ForkRoot {
    /// Continue after this event; it becomes the new branch's parent.
    Event(EventId),
    /// Start a lineage with no parent at all.
    Origin,
}

impl ForkRoot {
    /// The root event id, if the fork starts from an event.
    pub fn event_id(&self) -> Option<&EventId> {
        match self {
            Self::Event(id) => Some(id),
            Self::Origin => None,
        }
    }
}

/// How a new event relates to named branches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BranchDescriptor {
    /// Append to the head of a named branch.
    Continue {
        /// Branch name.
        name: String,
    },
    /// Create (or re-point) a named branch at `root`, then append.
    Fork {
        /// Branch name.
        name: String,
        /// Fork point.
        root: ForkRoot,
    },
}

impl BranchDescriptor {
    /// Name of the branch the event lands on.
    pub fn name(&self) -> &str {
        match self {
            Self::Continue { name } | Self::Fork { name, .. } => name,
        }
    }
}

/// Parameters for [`EventLog::list_events`](crate::EventLog::list_events).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListEventsRequest {
    /// Scope to read.
    pub scope: EventScope,
    /// Branch to read; `None` reads the default lineage.
    pub branch: Option<String>,
    /// Include events inherited from the lineage a branch was forked from.
    pub include_parent_events: bool,
    /// Return payload entries inline.
    pub include_payload: bool,
    /// Page size; must be at least 1.
    pub max_results: usize,
    /// Continuation token from a previous page.
    pub next_token: Option<String>,
}

impl ListEventsRequest {
    /// Full-lineage, payload-inclusive request with the default page size.
    pub fn new(scope: EventScope) -> Self {
        Self {
            scope,
            branch: None,
            include_parent_events: true,
            include_payload: true,
            max_results: crate::log::DEFAULT_MAX_RESULTS,
            next_token: None,
        }
    }

    /// Read a specific branch.
    #[must_use]
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    /// Override the page size.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Continue from a previous page.
    #[must_use]
    pub fn with_next_token(mut self, next_token: Option<String>) -> Self {
        self.next_token = next_token;
        self
    }
}

/// One page of a chronological listing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventPage {
    /// Events, oldest first.
    pub events: Vec<Event>,
    /// Token for the next page, `None` on the last page.
    pub next_token: Option<String>,
}

/// Parameters for [`EventLog::create_event`](crate::EventLog::create_event).
#[derive(Clone, Debug, PartialEq)]
pub struct CreateEventRequest {
    /// Scope to append to.
    pub scope: EventScope,
    /// Payload entries; must not be empty.
    pub payload: Vec<PayloadEntry>,
    /// Ordering timestamp.
    pub timestamp: DateTime<Utc>,
    /// Branch placement; `None` appends to the default lineage.
    pub branch: Option<BranchDescriptor>,
}

impl CreateEventRequest {
    /// An event carrying conversational messages only.
    pub fn conversational(
        scope: EventScope,
        messages: impl IntoIterator<Item = Conversational>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            scope,
            payload: messages
                .into_iter()
                .map(PayloadEntry::Conversational)
                .collect(),
            timestamp,
            branch: None,
        }
    }

    /// Place the event on a branch.
    #[must_use]
    pub fn on_branch(mut self, branch: Option<BranchDescriptor>) -> Self {
        self.branch = branch;
        self
    }
}

/// Parameters for [`EventLog::retrieve_memories`](crate::EventLog::retrieve_memories).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetrieveMemoriesRequest {
    /// Memory resource to search.
    pub memory_id: MemoryId,
    /// Fully resolved namespace.
    pub namespace: String,
    /// Free-text query.
    pub query: String,
    /// Maximum number of records to return.
    pub top_k: usize,
}

/// A long-term memory record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// Record id.
    pub record_id: String,
    /// Namespace the record lives in.
    pub namespace: String,
    /// Record body.
    pub text: String,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
    /// Relevance to the query that retrieved it (0.0 when not retrieved).
    #[serde(default)]
    pub score: f64,
}

/// Summary of a named branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchInfo {
    /// Branch name.
    pub name: String,
    /// Event the branch was last forked from (`None` for a parentless fork).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_event_id: Option<EventId>,
    /// Latest event on the branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_event_id: Option<EventId>,
    /// When the branch was first created.
    pub created_at: DateTime<Utc>,
    /// When the branch head last moved.
    pub updated_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_role_wire_names() {
        assert_eq!(serde_json::to_string(&LogRole::User).unwrap(), "\"USER\"");
        assert_eq!(
            serde_json::to_string(&LogRole::Assistant).unwrap(),
            "\"ASSISTANT\""
        );
        assert_eq!(LogRole::Tool.to_string(), "TOOL");
    }

    #[test]
    fn payload_entry_shape() {
        let entry = PayloadEntry::Conversational(Conversational::new(LogRole::User, "hi"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"conversational": {"role": "USER", "text": "hi"}})
        );
        let back: PayloadEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn event_conversational_skips_blobs() {
        let event = Event {
            event_id: EventId::from("evt_1"),
            scope: EventScope::new("mem", "actor", "sess"),
            branch: None,
            parent_id: None,
            timestamp: Utc::now(),
            payload: vec![
                PayloadEntry::Blob(serde_json::json!({"k": 1})),
                PayloadEntry::Conversational(Conversational::new(LogRole::Assistant, "a")),
            ],
        };
        let texts: Vec<&str> = event.conversational().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["a"]);
        assert_eq!(event.branch_name(), None);
    }

    #[test]
    fn branch_descriptor_name() {
        let cont = BranchDescriptor::Continue {
            name: "fix-1".into(),
        };
        let fork = BranchDescriptor::Fork {
            name: "fix-2".into(),
            root: ForkRoot::Origin,
        };
        assert_eq!(cont.name(), "fix-1");
        assert_eq!(fork.name(), "fix-2");
    }

    #[test]
    fn fork_root_event_id() {
        assert_eq!(ForkRoot::Origin.event_id(), None);
        let id = EventId::from("evt_9");
        assert_eq!(ForkRoot::Event(id.clone()).event_id(), Some(&id));
    }

    #[test]
    fn list_request_defaults() {
        let req = ListEventsRequest::new(EventScope::new("m", "a", "s"));
        assert!(req.include_parent_events);
        assert!(req.include_payload);
        assert_eq!(req.max_results, crate::log::DEFAULT_MAX_RESULTS);
        assert!(req.branch.is_none());
        assert!(req.next_token.is_none());
    }
}
