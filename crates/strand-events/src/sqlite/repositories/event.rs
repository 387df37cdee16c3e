//! Event repository: insertion, lookup, ancestor walks, default-lineage head.

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::errors::Result;
use crate::sqlite::row_types::{EventRow, format_timestamp};
use crate::types::{Event, EventScope};

const COLUMNS: &str = "id, memory_id, actor_id, session_id, branch_name, root_event_id, \
                       parent_id, sequence, timestamp, payload";

/// Event repository (stateless).
pub struct EventRepo;

impl EventRepo {
    fn map_row(row: &Row<'_>) -> rusqlite::Result<EventRow> {
        Ok(EventRow {
            id: row.get(0)?,
            memory_id: row.get(1)?,
            actor_id: row.get(2)?,
            session_id: row.get(3)?,
            branch_name: row.get(4)?,
            root_event_id: row.get(5)?,
            parent_id: row.get(6)?,
            sequence: row.get(7)?,
            timestamp: row.get(8)?,
            payload: row.get(9)?,
        })
    }

    /// Insert an event at the given sequence.
    pub fn insert(conn: &Connection, event: &Event, sequence: i64) -> Result<()> {
        let payload = serde_json::to_string(&event.payload)?;
        let (branch_name, root_event_id) = match &event.branch {
            Some(b) => (Some(b.name.as_str()), b.root_event_id.as_deref()),
            None => (None, None),
        };
        let _ = conn.execute(
            "INSERT INTO events (id, memory_id, actor_id, session_id, branch_name, root_event_id,
                                 parent_id, sequence, timestamp, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                event.event_id.as_str(),
                event.scope.memory_id.as_str(),
                event.scope.actor_id.as_str(),
                event.scope.session_id.as_str(),
                branch_name,
                root_event_id,
                event.parent_id.as_deref(),
                sequence,
                format_timestamp(&event.timestamp),
                payload,
            ],
        )?;
        Ok(())
    }

    /// Get an event by ID.
    pub fn get_by_id(conn: &Connection, event_id: &str) -> Result<Option<EventRow>> {
        let sql = format!("SELECT {COLUMNS} FROM events WHERE id = ?1");
        let row = conn
            .query_row(&sql, params![event_id], Self::map_row)
            .optional()?;
        Ok(row)
    }

    /// Next insertion sequence within a scope.
    pub fn next_sequence(conn: &Connection, scope: &EventScope) -> Result<i64> {
        let next: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence), -1) + 1 FROM events
             WHERE memory_id = ?1 AND actor_id = ?2 AND session_id = ?3",
            params![
                scope.memory_id.as_str(),
                scope.actor_id.as_str(),
                scope.session_id.as_str()
            ],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    /// Latest event on the default lineage of a scope.
    pub fn main_head(conn: &Connection, scope: &EventScope) -> Result<Option<String>> {
        let head = conn
            .query_row(
                "SELECT id FROM events
                 WHERE memory_id = ?1 AND actor_id = ?2 AND session_id = ?3
                   AND branch_name IS NULL
                 ORDER BY sequence DESC LIMIT 1",
                params![
                    scope.memory_id.as_str(),
                    scope.actor_id.as_str(),
                    scope.session_id.as_str()
                ],
                |row| row.get(0),
            )
            .optional()?;
        Ok(head)
    }

    /// Ancestor chain from the root to the given event (inclusive).
    pub fn get_ancestors(conn: &Connection, event_id: &str) -> Result<Vec<EventRow>> {
        let sql = format!(
            "WITH RECURSIVE ancestors(id, lvl) AS (
               SELECT id, 0 FROM events WHERE id = ?1
               UNION ALL
               SELECT e.parent_id, a.lvl + 1
               FROM events e JOIN ancestors a ON e.id = a.id
               WHERE e.parent_id IS NOT NULL AND a.lvl < 100000
             )
             SELECT {} FROM ancestors a JOIN events ev ON ev.id = a.id
             ORDER BY a.lvl DESC",
            COLUMNS
                .split(", ")
                .map(|c| format!("ev.{}", c.trim()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![event_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Count all events of a scope, across branches.
    pub fn count_by_scope(conn: &Connection, scope: &EventScope) -> Result<i64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM events WHERE memory_id = ?1 AND actor_id = ?2 AND session_id = ?3",
            params![
                scope.memory_id.as_str(),
                scope.actor_id.as_str(),
                scope.session_id.as_str()
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;
    use crate::types::{BranchRef, Conversational, LogRole, PayloadEntry};
    use chrono::Utc;
    use strand_core::EventId;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn scope() -> EventScope {
        EventScope::new("m", "a", "s")
    }

    fn make_event(id: &str, parent: Option<&str>, branch: Option<&str>) -> Event {
        Event {
            event_id: EventId::from(id),
            scope: scope(),
            branch: branch.map(|name| BranchRef {
                name: name.to_string(),
                root_event_id: None,
            }),
            parent_id: parent.map(EventId::from),
            timestamp: Utc::now(),
            payload: vec![PayloadEntry::Conversational(Conversational::new(
                LogRole::User,
                id,
            ))],
        }
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = setup();
        let event = make_event("evt_1", None, None);
        EventRepo::insert(&conn, &event, 0).unwrap();
        let row = EventRepo::get_by_id(&conn, "evt_1").unwrap().unwrap();
        assert_eq!(row.sequence, 0);
        let back = row.into_event().unwrap();
        assert_eq!(back.payload, event.payload);
        assert!(EventRepo::get_by_id(&conn, "evt_x").unwrap().is_none());
    }

    #[test]
    fn parent_must_exist() {
        let conn = setup();
        let orphan = make_event("evt_2", Some("evt_missing"), None);
        assert!(EventRepo::insert(&conn, &orphan, 0).is_err());
    }

    #[test]
    fn sequence_and_main_head_track_default_lineage() {
        let conn = setup();
        assert_eq!(EventRepo::next_sequence(&conn, &scope()).unwrap(), 0);
        assert!(EventRepo::main_head(&conn, &scope()).unwrap().is_none());

        EventRepo::insert(&conn, &make_event("evt_1", None, None), 0).unwrap();
        EventRepo::insert(&conn, &make_event("evt_2", Some("evt_1"), None), 1).unwrap();
        EventRepo::insert(&conn, &make_event("evt_3", Some("evt_1"), Some("fix")), 2).unwrap();

        assert_eq!(EventRepo::next_sequence(&conn, &scope()).unwrap(), 3);
        assert_eq!(
            EventRepo::main_head(&conn, &scope()).unwrap().as_deref(),
            Some("evt_2")
        );
        assert_eq!(EventRepo::count_by_scope(&conn, &scope()).unwrap(), 3);
    }

    #[test]
    fn get_ancestors_chain() {
        let conn = setup();
        EventRepo::insert(&conn, &make_event("evt_1", None, None), 0).unwrap();
        EventRepo::insert(&conn, &make_event("evt_2", Some("evt_1"), None), 1).unwrap();
        EventRepo::insert(&conn, &make_event("evt_3", Some("evt_2"), None), 2).unwrap();
        EventRepo::insert(&conn, &make_event("evt_4", Some("evt_2"), Some("fix")), 3).unwrap();

        let main: Vec<String> = EventRepo::get_ancestors(&conn, "evt_3")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(main, ["evt_1", "evt_2", "evt_3"]);

        let fix: Vec<String> = EventRepo::get_ancestors(&conn, "evt_4")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(fix, ["evt_1", "evt_2", "evt_4"]);
    }

    #[test]
    fn ancestors_of_unknown_event_is_empty() {
        let conn = setup();
        assert!(EventRepo::get_ancestors(&conn, "evt_x").unwrap().is_empty());
    }
}
