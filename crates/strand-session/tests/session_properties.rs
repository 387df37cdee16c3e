//! Behavioural properties of the session view, checked against both event
//! log backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use assert_matches::assert_matches;
use proptest::prelude::*;
use strand_events::{
    CreateEventRequest, Event, EventLog, EventLogError, EventPage, EventScope, ForkRoot,
    InMemoryEventLog, ListEventsRequest, MemoryRecord, RetrieveMemoriesRequest, SqliteEventLog,
};
use strand_session::{
    ContentPart, ItemRole, MemorySession, ResponseItem, Session, SessionConfig, SessionError,
};

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn scope() -> EventScope {
    EventScope::new("mem-1", "user-1", "thread-1")
}

fn backends() -> Vec<(&'static str, Arc<dyn EventLog>)> {
    let memory: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
    let sqlite: Arc<dyn EventLog> = Arc::new(SqliteEventLog::in_memory().unwrap());
    vec![("memory", memory), ("sqlite", sqlite)]
}

fn view(log: &Arc<dyn EventLog>) -> MemorySession {
    MemorySession::new(Arc::clone(log), SessionConfig::new(scope()))
}

fn view_on(log: &Arc<dyn EventLog>, branch: &str) -> MemorySession {
    MemorySession::new(
        Arc::clone(log),
        SessionConfig::new(scope()).with_branch(Some(branch.to_string())),
    )
}

fn users(texts: &[&str]) -> Vec<ResponseItem> {
    texts.iter().map(|t| ResponseItem::user(*t)).collect()
}

async fn texts(session: &MemorySession, limit: Option<usize>) -> Vec<String> {
    session
        .get_items(limit)
        .await
        .unwrap()
        .iter()
        .filter_map(ResponseItem::text)
        .map(String::from)
        .collect()
}

/// Wraps a log and fails every write once its write budget is spent.
struct FlakyLog {
    inner: Arc<dyn EventLog>,
    writes_left: AtomicUsize,
}

impl FlakyLog {
    fn new(inner: Arc<dyn EventLog>) -> Self {
        Self {
            inner,
            writes_left: AtomicUsize::new(usize::MAX),
        }
    }

    fn allow_writes(&self, n: usize) {
        self.writes_left.store(n, Ordering::SeqCst);
    }
}

impl EventLog for FlakyLog {
    fn list_events(&self, request: &ListEventsRequest) -> strand_events::Result<EventPage> {
        self.inner.list_events(request)
    }

    fn create_event(&self, request: CreateEventRequest) -> strand_events::Result<Event> {
        let allowed = self
            .writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(EventLogError::Unavailable("injected write failure".into()));
        }
        self.inner.create_event(request)
    }

    fn retrieve_memories(
        &self,
        request: &RetrieveMemoriesRequest,
    ) -> strand_events::Result<Vec<MemoryRecord>> {
        self.inner.retrieve_memories(request)
    }
}

// ─── Ordering ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn append_order_survives_batching() {
    for (name, log) in backends() {
        let s = view(&log);
        s.add_items(users(&["a", "b"])).await.unwrap();
        s.add_items(users(&["c"])).await.unwrap();
        s.add_items(users(&["d", "e"])).await.unwrap();
        assert_eq!(texts(&s, None).await, ["a", "b", "c", "d", "e"], "{name}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn any_batching_reads_back_in_order(batches in prop::collection::vec(1usize..4, 1..6)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let read = runtime.block_on(async {
            let log: Arc<dyn EventLog> = Arc::new(InMemoryEventLog::new());
            let s = MemorySession::new(log, SessionConfig::new(scope()).with_page_size(3));
            let mut next = 0usize;
            for size in &batches {
                let batch: Vec<ResponseItem> = (next..next + size)
                    .map(|i| ResponseItem::user(format!("t{i}")))
                    .collect();
                next += size;
                s.add_items(batch).await.unwrap();
            }
            texts(&s, None).await
        });
        let total: usize = batches.iter().sum();
        let expected: Vec<String> = (0..total).map(|i| format!("t{i}")).collect();
        prop_assert_eq!(read, expected);
    }
}

// ─── Clear ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn clear_hides_without_deleting() {
    for (name, log) in backends() {
        let s = view(&log);
        s.add_items(users(&["a", "b"])).await.unwrap();
        s.clear_session().await.unwrap();
        assert!(texts(&s, None).await.is_empty(), "{name}");

        s.add_items(users(&["t"])).await.unwrap();
        assert_eq!(texts(&s, None).await, ["t"], "{name}");

        // the write went to the same lineage; only this view's window moved
        let fresh = view(&log);
        assert_eq!(texts(&fresh, None).await, ["a", "b", "t"], "{name}");
    }
}

#[tokio::test]
async fn clear_on_a_named_branch_is_view_local() {
    for (name, log) in backends() {
        let s = view_on(&log, "side");
        s.add_items(users(&["a", "b"])).await.unwrap();
        s.clear_session().await.unwrap();
        s.add_items(users(&["t"])).await.unwrap();

        assert_eq!(texts(&s, None).await, ["t"], "{name}");
        assert_eq!(s.current_branch().as_deref(), Some("side"), "{name}");
        assert_eq!(
            texts(&view_on(&log, "side"), None).await,
            ["a", "b", "t"],
            "{name}"
        );
    }
}

#[tokio::test]
async fn clear_after_a_pop_created_branch_is_view_local() {
    for (name, log) in backends() {
        let s = view(&log);
        s.add_items(users(&["a", "b", "c"])).await.unwrap();
        s.pop_item().await.unwrap();
        s.add_items(users(&["d"])).await.unwrap();
        let branch = s.current_branch().unwrap();

        s.clear_session().await.unwrap();
        s.add_items(users(&["t"])).await.unwrap();

        assert_eq!(texts(&s, None).await, ["t"], "{name}");
        assert_eq!(s.current_branch().as_deref(), Some(branch.as_str()), "{name}");
        assert_eq!(
            texts(&view_on(&log, &branch), None).await,
            ["a", "b", "d", "t"],
            "{name}"
        );
        assert_eq!(texts(&view(&log), None).await, ["a", "b", "c"], "{name}");
    }
}

#[tokio::test]
async fn pop_then_clear_then_write_forks_once() {
    for (name, log) in backends() {
        let s = view(&log);
        s.add_items(users(&["a", "b"])).await.unwrap();
        s.pop_item().await.unwrap();
        s.clear_session().await.unwrap();
        s.add_items(users(&["t"])).await.unwrap();

        assert!(!s.is_cleared(), "{name}");
        assert!(s.pending_fork().is_none(), "{name}");
        assert_eq!(texts(&s, None).await, ["t"], "{name}");
        let branch = s.current_branch().unwrap();
        assert_eq!(texts(&view_on(&log, &branch), None).await, ["a", "t"], "{name}");
        assert_eq!(texts(&view(&log), None).await, ["a", "b"], "{name}");
    }
}

// ─── Branches ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn explicit_branch_is_isolated_from_the_default_lineage() {
    for (name, log) in backends() {
        let main = view(&log);
        main.add_items(users(&["main"])).await.unwrap();

        let side = view_on(&log, "side");
        assert!(texts(&side, None).await.is_empty(), "{name}");
        side.add_items(users(&["s1", "s2"])).await.unwrap();

        assert_eq!(texts(&side, None).await, ["s1", "s2"], "{name}");
        assert_eq!(texts(&view_on(&log, "side"), Some(1)).await, ["s2"], "{name}");
        assert_eq!(texts(&main, None).await, ["main"], "{name}");
    }
}

// ─── Pop ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_pop_without_writes_is_idempotent() {
    for (name, log) in backends() {
        let s = view(&log);
        s.add_items(users(&["a", "b", "c"])).await.unwrap();
        let first = s.pop_item().await.unwrap();
        let fork = s.pending_fork();
        let second = s.pop_item().await.unwrap();
        assert_eq!(first, second, "{name}");
        assert_eq!(first, Some(ResponseItem::user("c")), "{name}");
        assert_eq!(s.pending_fork(), fork, "{name}");
        assert_eq!(texts(&s, None).await, ["a", "b"], "{name}");
    }
}

#[tokio::test]
async fn pop_then_add_forks_the_lineage() {
    for (name, log) in backends() {
        let s = view(&log);
        s.add_items(users(&["a", "b", "c"])).await.unwrap();
        s.pop_item().await.unwrap();
        s.add_items(users(&["d"])).await.unwrap();
        assert_eq!(texts(&s, None).await, ["a", "b", "d"], "{name}");
        assert!(s.current_branch().is_some(), "{name}");

        // the default lineage still holds the popped item
        assert_eq!(texts(&view(&log), None).await, ["a", "b", "c"], "{name}");
    }
}

#[tokio::test]
async fn pop_to_empty_then_add_starts_over() {
    for (name, log) in backends() {
        let s = view(&log);
        s.add_items(users(&["a"])).await.unwrap();
        assert_eq!(s.pop_item().await.unwrap(), Some(ResponseItem::user("a")), "{name}");
        assert_eq!(s.pending_fork(), Some(ForkRoot::Origin), "{name}");
        assert!(texts(&s, None).await.is_empty(), "{name}");

        s.add_items(users(&["b"])).await.unwrap();
        assert_eq!(texts(&s, None).await, ["b"], "{name}");
    }
}

#[tokio::test]
async fn pop_on_empty_session_changes_nothing() {
    for (name, log) in backends() {
        let s = view(&log);
        assert!(s.pop_item().await.unwrap().is_none(), "{name}");
        assert!(s.pending_fork().is_none(), "{name}");
    }
}

// ─── Normalization ───────────────────────────────────────────────────────────

#[tokio::test]
async fn items_without_text_are_dropped() {
    for (name, log) in backends() {
        let s = view(&log);
        s.add_items(vec![
            ResponseItem::user(""),
            ResponseItem::user("x"),
            ResponseItem::unattributed(vec![ContentPart::InputImage { image_url: None }]),
        ])
        .await
        .unwrap();
        assert_eq!(texts(&s, None).await, ["x"], "{name}");
    }
}

#[tokio::test]
async fn limit_keeps_the_most_recent_items() {
    for (name, log) in backends() {
        let s = view(&log);
        s.add_items(users(&["a", "b", "c", "d"])).await.unwrap();
        assert_eq!(texts(&s, Some(2)).await, ["c", "d"], "{name}");
    }
}

#[tokio::test]
async fn unattributed_output_reads_back_as_assistant() {
    for (name, log) in backends() {
        let s = view(&log);
        s.add_items(vec![ResponseItem::unattributed(vec![ContentPart::OutputText {
            text: "answer".into(),
        }])])
        .await
        .unwrap();
        let items = s.get_items(None).await.unwrap();
        assert_eq!(items.len(), 1, "{name}");
        assert_eq!(items[0].role, Some(ItemRole::Assistant), "{name}");
    }
}

// ─── Failures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_fork_write_keeps_the_fork_pending() {
    for (name, inner) in backends() {
        let flaky = Arc::new(FlakyLog::new(inner));
        let log: Arc<dyn EventLog> = flaky.clone();
        let s = view(&log);
        s.add_items(users(&["a", "b"])).await.unwrap();
        s.pop_item().await.unwrap();

        flaky.allow_writes(0);
        let err = s.add_items(users(&["c"])).await.unwrap_err();
        assert_matches!(err, SessionError::Log(EventLogError::Unavailable(_)));
        assert!(s.pending_fork().is_some(), "{name}");
        assert!(s.current_branch().is_none(), "{name}");

        flaky.allow_writes(usize::MAX);
        s.add_items(users(&["c"])).await.unwrap();
        assert_eq!(texts(&s, None).await, ["a", "c"], "{name}");
    }
}

#[tokio::test]
async fn partial_failure_keeps_earlier_writes() {
    for (name, inner) in backends() {
        let flaky = Arc::new(FlakyLog::new(inner));
        let log: Arc<dyn EventLog> = flaky.clone();
        let s = view(&log);
        s.add_items(users(&["a"])).await.unwrap();

        flaky.allow_writes(1);
        assert!(s.add_items(users(&["b", "c", "d"])).await.is_err(), "{name}");
        assert_eq!(texts(&s, None).await, ["a", "b"], "{name}");
    }
}

#[tokio::test]
async fn file_backed_history_is_shared_between_views() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strand.db");
    {
        let log: Arc<dyn EventLog> =
            Arc::new(SqliteEventLog::open(&path, &strand_events::ConnectionConfig::default()).unwrap());
        view(&log).add_items(users(&["kept"])).await.unwrap();
    }
    let log: Arc<dyn EventLog> =
        Arc::new(SqliteEventLog::open(&path, &strand_events::ConnectionConfig::default()).unwrap());
    assert_eq!(texts(&view(&log), None).await, ["kept"]);
}
