//! Workspace, pipeline, and usage-counter queries.

use super::*;
use rusqlite::{params, OptionalExtension, Row};

fn map_workspace_row(row: &Row) -> rusqlite::Result<DbWorkspace> {
    Ok(DbWorkspace {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        name: row.get("name")?,
        currency: row.get("currency")?,
        timezone: row.get("timezone")?,
        created_at: row.get("created_at")?,
    })
}

fn map_pipeline_row(row: &Row) -> rusqlite::Result<DbPipeline> {
    Ok(DbPipeline {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        name: row.get("name")?,
        is_default: row.get::<_, i64>("is_default")? != 0,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn map_usage_row(row: &Row) -> rusqlite::Result<DbUsage> {
    Ok(DbUsage {
        workspace_id: row.get("workspace_id")?,
        lead_count: row.get("lead_count")?,
        imports_today: row.get("imports_today")?,
        last_import_date: row.get("last_import_date")?,
        last_updated_at: row.get("last_updated_at")?,
    })
}

impl CrmDb {
    pub fn insert_workspace(&self, ws: &DbWorkspace) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO workspaces (id, owner_id, name, currency, timezone, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![ws.id, ws.owner_id, ws.name, ws.currency, ws.timezone, ws.created_at],
        )?;
        Ok(())
    }

    pub fn get_workspace(&self, id: &str) -> Result<Option<DbWorkspace>, DbError> {
        let ws = self
            .conn
            .query_row(
                "SELECT * FROM workspaces WHERE id = ?1",
                params![id],
                map_workspace_row,
            )
            .optional()?;
        Ok(ws)
    }

    /// First workspace owned by `owner_id`, oldest wins.
    pub fn get_workspace_by_owner(&self, owner_id: &str) -> Result<Option<DbWorkspace>, DbError> {
        let ws = self
            .conn
            .query_row(
                "SELECT * FROM workspaces WHERE owner_id = ?1 ORDER BY created_at ASC LIMIT 1",
                params![owner_id],
                map_workspace_row,
            )
            .optional()?;
        Ok(ws)
    }

    pub fn update_workspace_settings(
        &self,
        id: &str,
        name: Option<&str>,
        currency: Option<&str>,
        timezone: Option<&str>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE workspaces SET
                name = COALESCE(?2, name),
                currency = COALESCE(?3, currency),
                timezone = COALESCE(?4, timezone)
             WHERE id = ?1",
            params![id, name, currency, timezone],
        )?;
        Ok(())
    }

    pub fn insert_pipeline(&self, pipeline: &DbPipeline) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO pipelines (id, workspace_id, name, is_default, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                pipeline.id,
                pipeline.workspace_id,
                pipeline.name,
                pipeline.is_default as i64,
                pipeline.created_at,
                pipeline.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_pipeline(&self, id: &str) -> Result<Option<DbPipeline>, DbError> {
        let pipeline = self
            .conn
            .query_row(
                "SELECT * FROM pipelines WHERE id = ?1",
                params![id],
                map_pipeline_row,
            )
            .optional()?;
        Ok(pipeline)
    }

    /// The workspace's default pipeline, falling back to the oldest
    /// pipeline when none is flagged.
    pub fn get_default_pipeline(&self, workspace_id: &str) -> Result<Option<DbPipeline>, DbError> {
        let pipeline = self
            .conn
            .query_row(
                "SELECT * FROM pipelines WHERE workspace_id = ?1
                 ORDER BY is_default DESC, created_at ASC LIMIT 1",
                params![workspace_id],
                map_pipeline_row,
            )
            .optional()?;
        Ok(pipeline)
    }

    pub fn count_pipelines(&self, workspace_id: &str) -> Result<i64, DbError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM pipelines WHERE workspace_id = ?1",
            params![workspace_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn insert_usage(&self, usage: &DbUsage) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO usage (workspace_id, lead_count, imports_today, last_import_date, last_updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                usage.workspace_id,
                usage.lead_count,
                usage.imports_today,
                usage.last_import_date,
                usage.last_updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_usage(&self, workspace_id: &str) -> Result<Option<DbUsage>, DbError> {
        let usage = self
            .conn
            .query_row(
                "SELECT * FROM usage WHERE workspace_id = ?1",
                params![workspace_id],
                map_usage_row,
            )
            .optional()?;
        Ok(usage)
    }

    /// Adjust the cached lead counter by `delta`, clamping at zero.
    pub fn adjust_lead_count(
        &self,
        workspace_id: &str,
        delta: i64,
        now: &str,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE usage SET
                lead_count = MAX(0, lead_count + ?2),
                last_updated_at = ?3
             WHERE workspace_id = ?1",
            params![workspace_id, delta, now],
        )?;
        Ok(())
    }

    /// Record one import: bumps today's counter and stamps the date.
    pub fn record_import(
        &self,
        workspace_id: &str,
        imports_today: i64,
        date: &str,
        now: &str,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE usage SET
                imports_today = ?2,
                last_import_date = ?3,
                last_updated_at = ?4
             WHERE workspace_id = ?1",
            params![workspace_id, imports_today, date, now],
        )?;
        Ok(())
    }
}
