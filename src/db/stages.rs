//! Stage queries.

use super::*;
use rusqlite::{params, OptionalExtension, Row};

fn map_stage_row(row: &Row) -> rusqlite::Result<DbStage> {
    Ok(DbStage {
        id: row.get("id")?,
        pipeline_id: row.get("pipeline_id")?,
        name: row.get("name")?,
        position: row.get("position")?,
        color: row.get("color")?,
        is_won: row.get::<_, i64>("is_won")? != 0,
        is_lost: row.get::<_, i64>("is_lost")? != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl CrmDb {
    pub fn insert_stage(&self, stage: &DbStage) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO stages (id, pipeline_id, name, position, color, is_won, is_lost,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                stage.id,
                stage.pipeline_id,
                stage.name,
                stage.position,
                stage.color,
                stage.is_won as i64,
                stage.is_lost as i64,
                stage.created_at,
                stage.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_stage(&self, id: &str) -> Result<Option<DbStage>, DbError> {
        let stage = self
            .conn
            .query_row("SELECT * FROM stages WHERE id = ?1", params![id], map_stage_row)
            .optional()?;
        Ok(stage)
    }

    /// A pipeline's stages ordered by position.
    pub fn get_stages_for_pipeline(&self, pipeline_id: &str) -> Result<Vec<DbStage>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM stages WHERE pipeline_id = ?1 ORDER BY position ASC",
        )?;
        let stages = stmt
            .query_map(params![pipeline_id], map_stage_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stages)
    }

    pub fn count_stages(&self, pipeline_id: &str) -> Result<i64, DbError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM stages WHERE pipeline_id = ?1",
            params![pipeline_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn max_stage_position(&self, pipeline_id: &str) -> Result<i64, DbError> {
        let max = self.conn.query_row(
            "SELECT COALESCE(MAX(position), -1) FROM stages WHERE pipeline_id = ?1",
            params![pipeline_id],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    pub fn update_stage(&self, stage: &DbStage) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE stages SET
                name = ?2, color = ?3, is_won = ?4, is_lost = ?5, updated_at = ?6
             WHERE id = ?1",
            params![
                stage.id,
                stage.name,
                stage.color,
                stage.is_won as i64,
                stage.is_lost as i64,
                stage.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn set_stage_position(&self, stage_id: &str, position: i64, now: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE stages SET position = ?2, updated_at = ?3 WHERE id = ?1",
            params![stage_id, position, now],
        )?;
        Ok(())
    }

    pub fn delete_stage_row(&self, stage_id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM stages WHERE id = ?1", params![stage_id])?;
        Ok(())
    }

    /// Move every lead in `from_stage` to `to_stage` in one statement.
    /// Both timestamps are stamped; no activity rows are written.
    pub fn reassign_leads_in_stage(
        &self,
        from_stage: &str,
        to_stage: &str,
        now: &str,
    ) -> Result<usize, DbError> {
        let moved = self.conn.execute(
            "UPDATE leads SET stage_id = ?2, stage_changed_at = ?3, updated_at = ?3
             WHERE stage_id = ?1",
            params![from_stage, to_stage, now],
        )?;
        Ok(moved)
    }
}
