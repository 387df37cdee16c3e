//! Long-term memory record repository.

use rusqlite::{Connection, params};

use crate::errors::Result;
use crate::sqlite::row_types::MemoryRecordRow;

/// Memory record repository (stateless).
pub struct MemoryRecordRepo;

impl MemoryRecordRepo {
    /// Insert a record.
    pub fn insert(
        conn: &Connection,
        id: &str,
        memory_id: &str,
        namespace: &str,
        text: &str,
        created_at: &str,
    ) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO memory_records (id, memory_id, namespace, text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, memory_id, namespace, text, created_at],
        )?;
        Ok(())
    }

    /// Records of one namespace, newest first.
    pub fn list_by_namespace(
        conn: &Connection,
        memory_id: &str,
        namespace: &str,
    ) -> Result<Vec<MemoryRecordRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, namespace, text, created_at FROM memory_records
             WHERE memory_id = ?1 AND namespace = ?2
             ORDER BY created_at DESC",
        )?;
        let rows = stmt
            .query_map(params![memory_id, namespace], |row| {
                Ok(MemoryRecordRow {
                    id: row.get(0)?,
                    namespace: row.get(1)?,
                    text: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
