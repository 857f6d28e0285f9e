//! Note queries.

use super::*;
use rusqlite::{params, OptionalExtension, Row};

fn map_note_row(row: &Row) -> rusqlite::Result<DbNote> {
    Ok(DbNote {
        id: row.get("id")?,
        lead_id: row.get("lead_id")?,
        author_id: row.get("author_id")?,
        author_name: row.get("author_name")?,
        body: row.get("body")?,
        created_at: row.get("created_at")?,
    })
}

impl CrmDb {
    pub fn insert_note(&self, note: &DbNote) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO lead_notes (id, lead_id, author_id, author_name, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                note.id,
                note.lead_id,
                note.author_id,
                note.author_name,
                note.body,
                note.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_note(&self, id: &str) -> Result<Option<DbNote>, DbError> {
        let note = self
            .conn
            .query_row(
                "SELECT * FROM lead_notes WHERE id = ?1",
                params![id],
                map_note_row,
            )
            .optional()?;
        Ok(note)
    }

    /// A lead's notes, newest first.
    pub fn get_notes_for_lead(&self, lead_id: &str) -> Result<Vec<DbNote>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM lead_notes WHERE lead_id = ?1 ORDER BY created_at DESC",
        )?;
        let notes = stmt
            .query_map(params![lead_id], map_note_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    pub fn delete_note_row(&self, note_id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM lead_notes WHERE id = ?1", params![note_id])?;
        Ok(())
    }

    pub fn delete_notes_for_lead(&self, lead_id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM lead_notes WHERE lead_id = ?1", params![lead_id])?;
        Ok(())
    }
}
