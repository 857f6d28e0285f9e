//! Task queries.

use super::*;
use rusqlite::{params, OptionalExtension, Row};

fn map_task_row(row: &Row) -> rusqlite::Result<DbTask> {
    let priority: String = row.get("priority")?;
    let status: String = row.get("status")?;
    Ok(DbTask {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        lead_id: row.get("lead_id")?,
        list_id: row.get("list_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: TaskPriority::parse(&priority),
        status: TaskStatus::parse(&status),
        due_date: row.get("due_date")?,
        completed_at: row.get("completed_at")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl CrmDb {
    pub fn insert_task(&self, task: &DbTask) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO tasks (id, workspace_id, lead_id, list_id, title, description,
                priority, status, due_date, completed_at, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                task.id,
                task.workspace_id,
                task.lead_id,
                task.list_id,
                task.title,
                task.description,
                task.priority.as_str(),
                task.status.as_str(),
                task.due_date,
                task.completed_at,
                task.created_by,
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> Result<Option<DbTask>, DbError> {
        let task = self
            .conn
            .query_row("SELECT * FROM tasks WHERE id = ?1", params![id], map_task_row)
            .optional()?;
        Ok(task)
    }

    pub fn update_task(&self, task: &DbTask) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE tasks SET
                lead_id = ?2, list_id = ?3, title = ?4, description = ?5, priority = ?6,
                status = ?7, due_date = ?8, completed_at = ?9, updated_at = ?10
             WHERE id = ?1",
            params![
                task.id,
                task.lead_id,
                task.list_id,
                task.title,
                task.description,
                task.priority.as_str(),
                task.status.as_str(),
                task.due_date,
                task.completed_at,
                task.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn delete_task_row(&self, task_id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
        Ok(())
    }

    pub fn delete_tasks_for_lead(&self, lead_id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM tasks WHERE lead_id = ?1", params![lead_id])?;
        Ok(())
    }

    pub fn get_tasks_for_workspace(&self, workspace_id: &str) -> Result<Vec<DbTask>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM tasks WHERE workspace_id = ?1")?;
        let tasks = stmt
            .query_map(params![workspace_id], map_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn get_tasks_for_lead(&self, lead_id: &str) -> Result<Vec<DbTask>, DbError> {
        let mut stmt = self.conn.prepare("SELECT * FROM tasks WHERE lead_id = ?1")?;
        let tasks = stmt
            .query_map(params![lead_id], map_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn get_tasks_for_list(&self, list_id: &str) -> Result<Vec<DbTask>, DbError> {
        let mut stmt = self.conn.prepare("SELECT * FROM tasks WHERE list_id = ?1")?;
        let tasks = stmt
            .query_map(params![list_id], map_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn count_open_tasks_in_list(&self, list_id: &str) -> Result<i64, DbError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE list_id = ?1 AND status != 'done'",
            params![list_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn get_open_tasks(&self, workspace_id: &str) -> Result<Vec<DbTask>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM tasks WHERE workspace_id = ?1 AND status != 'done'",
        )?;
        let tasks = stmt
            .query_map(params![workspace_id], map_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }
}
