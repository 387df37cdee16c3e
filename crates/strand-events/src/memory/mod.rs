//! In-process [`EventLog`] backed by an arena of immutable events.
//!
//! Events are never removed from the arena. The default lineage's head is
//! the latest event written without a branch; named branches are head
//! pointers that forks re-point. Listing walks parent links back from a head.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use strand_core::{EventId, MemoryId};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{EventLogError, Result};
use crate::log::{EventLog, in_scope, paginate, rank_memories, validate_create};
use crate::types::{
    BranchDescriptor, BranchInfo, BranchRef, CreateEventRequest, Event, EventPage, EventScope,
    ForkRoot, ListEventsRequest, MemoryRecord, RetrieveMemoriesRequest,
};

#[derive(Default)]
struct Inner {
    arena: Vec<Event>,
    index: HashMap<EventId, usize>,
    main_heads: HashMap<EventScope, EventId>,
    branches: HashMap<(EventScope, String), BranchInfo>,
    memories: Vec<(MemoryId, MemoryRecord)>,
}

impl Inner {
    fn head(&self, scope: &EventScope, branch: Option<&str>) -> Option<&EventId> {
        match branch {
            None => self.main_heads.get(scope),
            Some(name) => self
                .branches
                .get(&(scope.clone(), name.to_string()))
                .and_then(|b| b.head_event_id.as_ref()),
        }
    }

    fn get(&self, id: &EventId) -> Option<&Event> {
        self.index.get(id).map(|&i| &self.arena[i])
    }

    /// Ancestor chain ending at `head`, oldest first.
    fn lineage(&self, head: &EventId) -> Vec<Event> {
        let mut chain = Vec::new();
        let mut cursor = self.get(head);
        while let Some(event) = cursor {
            chain.push(event.clone());
            cursor = event.parent_id.as_ref().and_then(|p| self.get(p));
        }
        chain.reverse();
        chain
    }
}

/// Thread-safe in-memory event log.
///
/// Cheap to construct; intended for tests, demos and single-process use.
#[derive(Default)]
pub struct InMemoryEventLog {
    inner: RwLock<Inner>,
}

impl InMemoryEventLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of events stored across all scopes and branches.
    pub fn event_count(&self) -> usize {
        self.inner.read().arena.len()
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
        self.inner
            .write()
            .memories
            .push((memory_id.clone(), record.clone()));
        Ok(record)
    }

    /// Named branches of a scope, ordered by name.
    pub fn list_branches(&self, scope: &EventScope) -> Result<Vec<BranchInfo>> {
        let inner = self.inner.read();
        let mut branches: Vec<BranchInfo> = inner
            .branches
            .iter()
            .filter(|((s, _), _)| s == scope)
            .map(|(_, info)| info.clone())
            .collect();
        branches.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(branches)
    }
}

impl EventLog for InMemoryEventLog {
    fn list_events(&self, request: &ListEventsRequest) -> Result<EventPage> {
        let inner = self.inner.read();
        let lineage = inner
            .head(&request.scope, request.branch.as_deref())
            .map(|head| inner.lineage(head))
            .unwrap_or_default();
        paginate(lineage, request)
    }

    fn create_event(&self, request: CreateEventRequest) -> Result<Event> {
        validate_create(&request)?;
        let mut inner = self.inner.write();
        let scope = request.scope;

        let (parent_id, branch_ref) = match &request.branch {
            None => (inner.main_heads.get(&scope).cloned(), None),
            Some(BranchDescriptor::Continue { name }) => (
                inner.head(&scope, Some(name)).cloned(),
                Some(BranchRef {
                    name: name.clone(),
                    root_event_id: None,
                }),
            ),
            Some(BranchDescriptor::Fork { name, root }) => {
                let parent = match root {
                    ForkRoot::Origin => None,
                    ForkRoot::Event(id) => match inner.get(id) {
                        Some(root_event) if in_scope(root_event, &scope) => Some(id.clone()),
                        _ => return Err(EventLogError::EventNotFound(id.to_string())),
                    },
                };
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
            scope: scope.clone(),
            branch: branch_ref,
            parent_id,
            timestamp: request.timestamp,
            payload: request.payload,
        };

        let now = Utc::now();
        match &request.branch {
            None => {
                let _ = inner
                    .main_heads
                    .insert(scope.clone(), event.event_id.clone());
            }
            Some(descriptor) => {
                let key = (scope.clone(), descriptor.name().to_string());
                let forked_root = match descriptor {
                    BranchDescriptor::Fork { root, .. } => Some(root.event_id().cloned()),
                    BranchDescriptor::Continue { .. } => None,
                };
                let info = inner.branches.entry(key).or_insert_with(|| BranchInfo {
                    name: descriptor.name().to_string(),
                    root_event_id: None,
                    head_event_id: None,
                    created_at: now,
                    updated_at: now,
                });
                if let Some(root) = forked_root {
                    info.root_event_id = root;
                }
                info.head_event_id = Some(event.event_id.clone());
                info.updated_at = now;
            }
        }

        let position = inner.arena.len();
        let _ = inner.index.insert(event.event_id.clone(), position);
        inner.arena.push(event.clone());

        debug!(
            event_id = %event.event_id,
            session_id = %event.scope.session_id,
            branch = event.branch_name().unwrap_or("main"),
            "event appended"
        );
        Ok(event)
    }

    fn retrieve_memories(&self, request: &RetrieveMemoriesRequest) -> Result<Vec<MemoryRecord>> {
        let candidates: Vec<MemoryRecord> = self
            .inner
            .read()
            .memories
            .iter()
            .filter(|(mem, rec)| *mem == request.memory_id && rec.namespace == request.namespace)
            .map(|(_, rec)| rec.clone())
            .collect();
        Ok(rank_memories(candidates, request))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
