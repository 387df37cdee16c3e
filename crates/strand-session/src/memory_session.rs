//! [`MemorySession`]: a session view projected from an [`EventLog`].
//!
//! The log is append-only, so the view carries four pieces of state:
//!
//! - `current_branch`: the named lineage reads and writes target (`None` is
//!   the default lineage)
//! - `fork_root`: set by a pop; reads stop at it and the next write forks
//!   a branch from it
//! - `cleared`: reads return nothing until the next write
//! - `visible_from`: first event of the view's window; the first write after
//!   a clear starts a new window at the event it creates
//!
//! A pending fork and the cleared flag are both resolved by the first
//! successful write of an `add_items` call. Clearing never moves a branch
//! head, so other views of the same lineage keep their history. Events are
//! never removed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use strand_core::{EventId, SessionId};
use strand_events::{
    BranchDescriptor, CreateEventRequest, DEFAULT_MAX_RESULTS, Event, EventLog, EventScope,
    ForkRoot, ListEventsRequest,
};
use tracing::{debug, info, instrument, warn};

use crate::errors::Result;
use crate::items::ResponseItem;
use crate::naming::{DEFAULT_BRANCH_PREFIX, generate_branch_name};
use crate::roles::{to_conversational, to_item};
use crate::session::Session;

/// Construction parameters for a [`MemorySession`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// (memory, actor, session) the view reads and writes.
    pub scope: EventScope,
    /// Page size used when listing events.
    pub page_size: usize,
    /// Prefix for branches created by a pop or clear.
    pub branch_prefix: String,
    /// Branch to start on; `None` starts on the default lineage.
    pub branch_name: Option<String>,
}

impl SessionConfig {
    /// Config with default page size and branch prefix.
    pub fn new(scope: EventScope) -> Self {
        Self {
            scope,
            page_size: DEFAULT_MAX_RESULTS,
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
            branch_name: None,
        }
    }

    /// Override the listing page size (clamped to at least 1).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Override the generated-branch prefix.
    #[must_use]
    pub fn with_branch_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.branch_prefix = prefix.into();
        self
    }

    /// Start on an explicit branch.
    #[must_use]
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch_name = branch;
        self
    }
}

#[derive(Clone, Debug, Default)]
struct ViewState {
    current_branch: Option<String>,
    fork_root: Option<ForkRoot>,
    cleared: bool,
    visible_from: Option<EventId>,
}

/// Session view over an [`EventLog`].
pub struct MemorySession {
    log: Arc<dyn EventLog>,
    config: SessionConfig,
    state: Mutex<ViewState>,
}

impl MemorySession {
    /// Create a view. No log call is made until the first operation.
    pub fn new(log: Arc<dyn EventLog>, config: SessionConfig) -> Self {
        let state = ViewState {
            current_branch: config.branch_name.clone(),
            ..ViewState::default()
        };
        Self {
            log,
            config,
            state: Mutex::new(state),
        }
    }

    /// Scope this view reads and writes.
    pub fn scope(&self) -> &EventScope {
        &self.config.scope
    }

    /// Branch currently read and written; `None` is the default lineage.
    pub fn current_branch(&self) -> Option<String> {
        self.state.lock().current_branch.clone()
    }

    /// Fork point a pop left for the next write.
    pub fn pending_fork(&self) -> Option<ForkRoot> {
        self.state.lock().fork_root.clone()
    }

    /// Whether reads are hidden until the next write.
    pub fn is_cleared(&self) -> bool {
        self.state.lock().cleared
    }

    /// First event of the visible window, once a clear has been followed by
    /// a write.
    pub fn visible_from(&self) -> Option<EventId> {
        self.state.lock().visible_from.clone()
    }

    pub(crate) async fn blocking<T, F>(&self, call: F) -> Result<T>
    where
        F: FnOnce(&dyn EventLog) -> strand_events::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let log = Arc::clone(&self.log);
        let value = tokio::task::spawn_blocking(move || call(log.as_ref())).await??;
        Ok(value)
    }

    /// Every event of a lineage, following continuation tokens to the end.
    async fn read_lineage(&self, branch: Option<String>) -> Result<Vec<Event>> {
        let request = ListEventsRequest::new(self.config.scope.clone())
            .with_branch(branch)
            .with_max_results(self.config.page_size);
        self.blocking(move |log| list_all(log, request)).await
    }
}

fn list_all(log: &dyn EventLog, mut request: ListEventsRequest) -> strand_events::Result<Vec<Event>> {
    let mut events = Vec::new();
    loop {
        let page = log.list_events(&request)?;
        events.extend(page.events);
        match page.next_token {
            Some(token) => request.next_token = Some(token),
            None => return Ok(events),
        }
    }
}

/// Cut a lineage so it ends at the fork root.
///
/// An unknown root drops exactly the last event.
fn truncate_at_fork(mut events: Vec<Event>, root: &ForkRoot) -> Vec<Event> {
    match root {
        ForkRoot::Origin => Vec::new(),
        ForkRoot::Event(id) => {
            if let Some(idx) = events.iter().position(|e| &e.event_id == id) {
                events.truncate(idx + 1);
            } else {
                warn!(
                    fork_root = %id,
                    events = events.len(),
                    "fork root not in lineage, hiding last event"
                );
                let _ = events.pop();
            }
            events
        }
    }
}

/// Offset of the window start within a lineage.
///
/// `None` means the start is no longer part of the lineage, which happens
/// when another view re-pointed the shared branch behind it.
fn window_offset(events: &[Event], start: Option<&EventId>) -> Option<usize> {
    match start {
        None => Some(0),
        Some(start) => events.iter().position(|e| &e.event_id == start),
    }
}

fn flatten(events: &[Event]) -> Vec<ResponseItem> {
    events
        .iter()
        .flat_map(Event::conversational)
        .filter_map(to_item)
        .collect()
}

#[async_trait]
impl Session for MemorySession {
    fn session_id(&self) -> &SessionId {
        &self.config.scope.session_id
    }

    #[instrument(skip(self))]
    async fn get_items(&self, limit: Option<usize>) -> Result<Vec<ResponseItem>> {
        let state = self.state.lock().clone();
        if state.cleared || limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut events = self.read_lineage(state.current_branch.clone()).await?;
        if let Some(root) = &state.fork_root {
            events = truncate_at_fork(events, root);
        }
        match window_offset(&events, state.visible_from.as_ref()) {
            Some(offset) => {
                let _ = events.drain(..offset);
            }
            None => {
                warn!(
                    session_id = %self.config.scope.session_id,
                    visible_from = state.visible_from.as_deref().unwrap_or_default(),
                    "window start not in lineage, showing nothing"
                );
                events.clear();
            }
        }

        let mut items = flatten(&events);
        if let Some(limit) = limit {
            let skip = items.len().saturating_sub(limit);
            let _ = items.drain(..skip);
        }
        debug!(
            session_id = %self.config.scope.session_id,
            branch = state.current_branch.as_deref().unwrap_or("main"),
            events = events.len(),
            items = items.len(),
            "session items read"
        );
        Ok(items)
    }

    #[instrument(skip_all, fields(count = items.len()))]
    async fn add_items(&self, items: Vec<ResponseItem>) -> Result<()> {
        let messages: Vec<_> = items.iter().filter_map(to_conversational).collect();
        if messages.is_empty() {
            return Ok(());
        }

        let state = self.state.lock().clone();
        let fork = state.fork_root.clone();
        let branch = match (&fork, &state.current_branch) {
            (Some(_), None) => Some(generate_branch_name(&self.config.branch_prefix)),
            (_, current) => current.clone(),
        };
        let mut pending = fork
            .zip(branch.clone())
            .map(|(root, name)| BranchDescriptor::Fork { name, root });

        for (index, message) in messages.into_iter().enumerate() {
            let forking = pending.take();
            let is_fork = forking.is_some();
            let descriptor = forking.or_else(|| {
                branch
                    .clone()
                    .map(|name| BranchDescriptor::Continue { name })
            });
            let request = CreateEventRequest::conversational(
                self.config.scope.clone(),
                [message],
                Utc::now(),
            )
            .on_branch(descriptor);

            let event = self.blocking(move |log| log.create_event(request)).await?;

            let restarts_window = index == 0 && state.cleared;
            if !is_fork && !restarts_window {
                debug!(event_id = %event.event_id, "session item appended");
                continue;
            }
            {
                let mut view = self.state.lock();
                if is_fork {
                    view.current_branch.clone_from(&branch);
                    view.fork_root = None;
                }
                if restarts_window {
                    view.visible_from = Some(event.event_id.clone());
                    view.cleared = false;
                }
            }
            if is_fork {
                info!(
                    session_id = %self.config.scope.session_id,
                    branch = branch.as_deref().unwrap_or("main"),
                    root = event.parent_id.as_deref().unwrap_or("origin"),
                    event_id = %event.event_id,
                    "session view forked"
                );
            }
            if restarts_window {
                info!(
                    session_id = %self.config.scope.session_id,
                    visible_from = %event.event_id,
                    "session window restarted"
                );
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn pop_item(&self) -> Result<Option<ResponseItem>> {
        let state = self.state.lock().clone();
        let events = self.read_lineage(state.current_branch.clone()).await?;
        let Some(offset) = window_offset(&events, state.visible_from.as_ref()) else {
            return Ok(None);
        };
        let Some(last) = events[offset..].last() else {
            return Ok(None);
        };

        let popped = last.conversational().rev().find_map(to_item);
        let root = match events.len() {
            1 => ForkRoot::Origin,
            n => ForkRoot::Event(events[n - 2].event_id.clone()),
        };
        // popping the window's first event leaves nothing visible until the
        // next write opens a new window
        let empties_window = state.visible_from.is_some() && offset + 1 == events.len();
        info!(
            session_id = %self.config.scope.session_id,
            popped_event = %last.event_id,
            fork_root = root.event_id().map_or("origin", |id| id.as_str()),
            "pop recorded"
        );
        let mut view = self.state.lock();
        view.fork_root = Some(root);
        if empties_window {
            view.cleared = true;
        }
        Ok(popped)
    }

    async fn clear_session(&self) -> Result<()> {
        self.state.lock().cleared = true;
        info!(session_id = %self.config.scope.session_id, "session view cleared");
        Ok(())
    }
}

impl std::fmt::Debug for MemorySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySession")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::items::{ContentPart, ItemRole};
    use strand_core::EventId;
    use strand_events::{Conversational, InMemoryEventLog, LogRole, PayloadEntry};

    fn scope() -> EventScope {
        EventScope::new("mem-1", "user-1", "thread-1")
    }

    fn session(log: &Arc<InMemoryEventLog>) -> MemorySession {
        MemorySession::new(log.clone(), SessionConfig::new(scope()))
    }

    fn texts(items: &[ResponseItem]) -> Vec<&str> {
        items.iter().filter_map(ResponseItem::text).collect()
    }

    fn event(id: &str) -> Event {
        Event {
            event_id: EventId::from(id),
            scope: scope(),
            branch: None,
            parent_id: None,
            timestamp: Utc::now(),
            payload: vec![PayloadEntry::Conversational(Conversational::new(
                LogRole::User,
                id,
            ))],
        }
    }

    // ── truncate_at_fork ────────────────────────────────────────────

    #[test]
    fn truncate_keeps_root_inclusive() {
        let events = vec![event("e1"), event("e2"), event("e3")];
        let kept = truncate_at_fork(events, &ForkRoot::Event(EventId::from("e2")));
        let ids: Vec<&str> = kept.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, ["e1", "e2"]);
    }

    #[test]
    fn truncate_unknown_root_drops_last_event() {
        let (logs, _guard) = strand_core::logging::capture_logs();
        let events = vec![event("e1"), event("e2"), event("e3")];
        let kept = truncate_at_fork(events, &ForkRoot::Event(EventId::from("gone")));
        assert_eq!(kept.len(), 2);
        assert!(logs.has_event(tracing::Level::WARN, "fork root not in lineage"));

        assert!(truncate_at_fork(Vec::new(), &ForkRoot::Event(EventId::from("gone"))).is_empty());
    }

    #[test]
    fn truncate_origin_hides_everything() {
        assert!(truncate_at_fork(vec![event("e1")], &ForkRoot::Origin).is_empty());
    }

    // ── window_offset ───────────────────────────────────────────────

    #[test]
    fn window_offset_finds_start_or_reports_it_gone() {
        let events = vec![event("e1"), event("e2"), event("e3")];
        assert_eq!(window_offset(&events, None), Some(0));
        assert_eq!(window_offset(&events, Some(&EventId::from("e2"))), Some(1));
        assert_eq!(window_offset(&events, Some(&EventId::from("gone"))), None);
    }

    // ── operations ──────────────────────────────────────────────────

    #[tokio::test]
    async fn add_then_get_returns_items_in_order() {
        let log = Arc::new(InMemoryEventLog::new());
        let s = session(&log);
        s.add_items(vec![ResponseItem::user("hi"), ResponseItem::assistant("hello")])
            .await
            .unwrap();
        let items = s.get_items(None).await.unwrap();
        assert_eq!(items, vec![ResponseItem::user("hi"), ResponseItem::assistant("hello")]);
        // one event per item
        assert_eq!(log.event_count(), 2);
    }

    #[tokio::test]
    async fn limit_zero_and_empty_session() {
        let log = Arc::new(InMemoryEventLog::new());
        let s = session(&log);
        assert!(s.get_items(None).await.unwrap().is_empty());
        s.add_items(vec![ResponseItem::user("a")]).await.unwrap();
        assert!(s.get_items(Some(0)).await.unwrap().is_empty());
        assert_eq!(texts(&s.get_items(Some(5)).await.unwrap()), ["a"]);
    }

    #[tokio::test]
    async fn empty_add_is_a_noop() {
        let log = Arc::new(InMemoryEventLog::new());
        let s = session(&log);
        s.add_items(Vec::new()).await.unwrap();
        s.add_items(vec![ResponseItem::user("")]).await.unwrap();
        assert_eq!(log.event_count(), 0);
    }

    #[tokio::test]
    async fn pop_sets_fork_root_to_previous_event() {
        let log = Arc::new(InMemoryEventLog::new());
        let s = session(&log);
        s.add_items(vec![ResponseItem::user("a"), ResponseItem::user("b")])
            .await
            .unwrap();
        let popped = s.pop_item().await.unwrap().unwrap();
        assert_eq!(popped, ResponseItem::user("b"));
        assert!(matches!(s.pending_fork(), Some(ForkRoot::Event(_))));
        assert_eq!(texts(&s.get_items(None).await.unwrap()), ["a"]);
        assert!(s.current_branch().is_none());
    }

    #[tokio::test]
    async fn write_after_pop_moves_to_generated_branch() {
        let log = Arc::new(InMemoryEventLog::new());
        let s = MemorySession::new(
            log.clone(),
            SessionConfig::new(scope()).with_branch_prefix("undo"),
        );
        s.add_items(vec![ResponseItem::user("a"), ResponseItem::user("b")])
            .await
            .unwrap();
        s.pop_item().await.unwrap();
        s.add_items(vec![ResponseItem::user("c"), ResponseItem::assistant("d")])
            .await
            .unwrap();

        let branch = s.current_branch().unwrap();
        assert!(branch.starts_with("undo-"));
        assert!(s.pending_fork().is_none());
        assert_eq!(texts(&s.get_items(None).await.unwrap()), ["a", "c", "d"]);

        // a second pop re-points the same branch
        s.pop_item().await.unwrap();
        s.add_items(vec![ResponseItem::user("e")]).await.unwrap();
        assert_eq!(s.current_branch().as_deref(), Some(branch.as_str()));
        assert_eq!(texts(&s.get_items(None).await.unwrap()), ["a", "c", "e"]);
        assert_eq!(log.list_branches(&scope()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pop_returns_last_non_empty_entry_of_last_event() {
        let log = Arc::new(InMemoryEventLog::new());
        log.create_event(CreateEventRequest {
            scope: scope(),
            payload: vec![
                PayloadEntry::Conversational(Conversational::new(LogRole::User, "first")),
                PayloadEntry::Conversational(Conversational::new(LogRole::Assistant, "second")),
                PayloadEntry::Conversational(Conversational::new(LogRole::Assistant, "")),
            ],
            timestamp: Utc::now(),
            branch: None,
        })
        .unwrap();
        let s = session(&log);
        let popped = s.pop_item().await.unwrap().unwrap();
        assert_eq!(popped.role, Some(ItemRole::Assistant));
        assert_eq!(popped.text(), Some("second"));
        assert_eq!(s.pending_fork(), Some(ForkRoot::Origin));
    }

    #[tokio::test]
    async fn clear_keeps_branch_and_fork() {
        let log = Arc::new(InMemoryEventLog::new());
        let s = session(&log);
        s.add_items(vec![ResponseItem::user("a"), ResponseItem::user("b")])
            .await
            .unwrap();
        s.pop_item().await.unwrap();
        s.clear_session().await.unwrap();
        assert!(s.is_cleared());
        assert!(s.pending_fork().is_some());
        assert!(s.get_items(None).await.unwrap().is_empty());

        s.add_items(vec![ResponseItem::unattributed(vec![ContentPart::InputText {
            text: "fresh".into(),
        }])])
        .await
        .unwrap();
        assert!(!s.is_cleared());
        assert!(s.pending_fork().is_none());
        assert!(s.visible_from().is_some());
        let items = s.get_items(None).await.unwrap();
        assert_eq!(items, vec![ResponseItem::user("fresh")]);
    }

    #[tokio::test]
    async fn write_after_clear_stays_on_the_lineage() {
        let (logs, _guard) = strand_core::logging::capture_logs();
        let log = Arc::new(InMemoryEventLog::new());
        let s = session(&log);
        s.add_items(vec![ResponseItem::user("a")]).await.unwrap();
        s.clear_session().await.unwrap();
        s.add_items(vec![ResponseItem::user("t"), ResponseItem::user("u")])
            .await
            .unwrap();

        assert!(s.current_branch().is_none());
        assert!(log.list_branches(&scope()).unwrap().is_empty());
        assert_eq!(texts(&s.get_items(None).await.unwrap()), ["t", "u"]);

        let restarted = logs.find("session window restarted");
        assert_eq!(restarted.len(), 1);
        let start = s.visible_from().unwrap();
        assert_eq!(restarted[0].field("visible_from"), Some(start.as_str()));
    }

    #[tokio::test]
    async fn popping_the_window_start_hides_until_next_write() {
        let log = Arc::new(InMemoryEventLog::new());
        let s = session(&log);
        s.add_items(vec![ResponseItem::user("a")]).await.unwrap();
        s.clear_session().await.unwrap();
        s.add_items(vec![ResponseItem::user("t")]).await.unwrap();

        assert_eq!(s.pop_item().await.unwrap(), Some(ResponseItem::user("t")));
        assert!(s.is_cleared());
        assert!(s.get_items(None).await.unwrap().is_empty());
        assert_eq!(s.pop_item().await.unwrap(), Some(ResponseItem::user("t")));

        s.add_items(vec![ResponseItem::user("u")]).await.unwrap();
        assert!(s.current_branch().is_some());
        assert_eq!(texts(&s.get_items(None).await.unwrap()), ["u"]);
    }

    #[tokio::test]
    async fn small_pages_are_followed_to_the_end() {
        let log = Arc::new(InMemoryEventLog::new());
        let s = MemorySession::new(log.clone(), SessionConfig::new(scope()).with_page_size(2));
        let items: Vec<_> = (0..7).map(|i| ResponseItem::user(format!("m{i}"))).collect();
        s.add_items(items).await.unwrap();
        assert_eq!(s.get_items(None).await.unwrap().len(), 7);
        assert_eq!(
            texts(&s.get_items(Some(2)).await.unwrap()),
            ["m5", "m6"]
        );
    }

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(SessionConfig::new(scope()).with_page_size(0).page_size, 1);
    }
}
