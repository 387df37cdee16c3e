//! Branch repository: named head pointers per scope.

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::errors::Result;
use crate::sqlite::row_types::BranchRow;
use crate::types::EventScope;

/// Branch repository (stateless).
pub struct BranchRepo;

impl BranchRepo {
    fn map_row(row: &Row<'_>) -> rusqlite::Result<BranchRow> {
        Ok(BranchRow {
            name: row.get(0)?,
            root_event_id: row.get(1)?,
            head_event_id: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    /// Get a branch by name.
    pub fn get(conn: &Connection, scope: &EventScope, name: &str) -> Result<Option<BranchRow>> {
        let row = conn
            .query_row(
                "SELECT name, root_event_id, head_event_id, created_at, updated_at
                 FROM branches
                 WHERE memory_id = ?1 AND actor_id = ?2 AND session_id = ?3 AND name = ?4",
                params![
                    scope.memory_id.as_str(),
                    scope.actor_id.as_str(),
                    scope.session_id.as_str(),
                    name
                ],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Point a branch at a new fork: sets root and head, keeps `created_at`.
    pub fn fork(
        conn: &Connection,
        scope: &EventScope,
        name: &str,
        root_event_id: Option<&str>,
        head_event_id: &str,
        now: &str,
    ) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO branches (memory_id, actor_id, session_id, name, root_event_id,
                                   head_event_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
             ON CONFLICT (memory_id, actor_id, session_id, name) DO UPDATE SET
               root_event_id = excluded.root_event_id,
               head_event_id = excluded.head_event_id,
               updated_at    = excluded.updated_at",
            params![
                scope.memory_id.as_str(),
                scope.actor_id.as_str(),
                scope.session_id.as_str(),
                name,
                root_event_id,
                head_event_id,
                now
            ],
        )?;
        Ok(())
    }

    /// Move a branch head, creating the branch without a root if needed.
    pub fn advance_head(
        conn: &Connection,
        scope: &EventScope,
        name: &str,
        head_event_id: &str,
        now: &str,
    ) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO branches (memory_id, actor_id, session_id, name, root_event_id,
                                   head_event_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?6)
             ON CONFLICT (memory_id, actor_id, session_id, name) DO UPDATE SET
               head_event_id = excluded.head_event_id,
               updated_at    = excluded.updated_at",
            params![
                scope.memory_id.as_str(),
                scope.actor_id.as_str(),
                scope.session_id.as_str(),
                name,
                head_event_id,
                now
            ],
        )?;
        Ok(())
    }

    /// All branches of a scope, ordered by name.
    pub fn list(conn: &Connection, scope: &EventScope) -> Result<Vec<BranchRow>> {
        let mut stmt = conn.prepare(
            "SELECT name, root_event_id, head_event_id, created_at, updated_at
             FROM branches
             WHERE memory_id = ?1 AND actor_id = ?2 AND session_id = ?3
             ORDER BY name",
        )?;
        let rows = stmt
            .query_map(
                params![
                    scope.memory_id.as_str(),
                    scope.actor_id.as_str(),
                    scope.session_id.as_str()
                ],
                Self::map_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
