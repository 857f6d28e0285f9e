//! List queries.

use super::*;
use rusqlite::{params, OptionalExtension, Row};

fn map_list_row(row: &Row) -> rusqlite::Result<DbList> {
    Ok(DbList {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        color: row.get("color")?,
        created_by: row.get("created_by")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl CrmDb {
    pub fn insert_list(&self, list: &DbList) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO lists (id, workspace_id, name, description, color, created_by,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                list.id,
                list.workspace_id,
                list.name,
                list.description,
                list.color,
                list.created_by,
                list.created_at,
                list.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_list(&self, id: &str) -> Result<Option<DbList>, DbError> {
        let list = self
            .conn
            .query_row("SELECT * FROM lists WHERE id = ?1", params![id], map_list_row)
            .optional()?;
        Ok(list)
    }

    /// Workspace lists, newest first.
    pub fn get_lists_for_workspace(&self, workspace_id: &str) -> Result<Vec<DbList>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM lists WHERE workspace_id = ?1 ORDER BY created_at DESC",
        )?;
        let lists = stmt
            .query_map(params![workspace_id], map_list_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lists)
    }

    pub fn update_list(&self, list: &DbList) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE lists SET name = ?2, description = ?3, color = ?4, updated_at = ?5
             WHERE id = ?1",
            params![list.id, list.name, list.description, list.color, list.updated_at],
        )?;
        Ok(())
    }

    pub fn delete_list_row(&self, list_id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM lists WHERE id = ?1", params![list_id])?;
        Ok(())
    }

    /// Null out list membership on every lead pointing at `list_id`.
    pub fn clear_list_references(&self, list_id: &str, now: &str) -> Result<usize, DbError> {
        let cleared = self.conn.execute(
            "UPDATE leads SET list_id = NULL, updated_at = ?2 WHERE list_id = ?1",
            params![list_id, now],
        )?;
        Ok(cleared)
    }

    /// Null out list membership on every task pointing at `list_id`.
    pub fn clear_task_list_references(&self, list_id: &str, now: &str) -> Result<usize, DbError> {
        let cleared = self.conn.execute(
            "UPDATE tasks SET list_id = NULL, updated_at = ?2 WHERE list_id = ?1",
            params![list_id, now],
        )?;
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::now_rfc3339;

    fn list(id: &str, workspace_id: &str, created_at: &str) -> DbList {
        DbList {
            id: id.to_string(),
            workspace_id: workspace_id.to_string(),
            name: "Hot leads".to_string(),
            description: None,
            color: None,
            created_by: "u1".to_string(),
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_lists_newest_first() {
        let db = CrmDb::open_in_memory().unwrap();
        db.insert_list(&list("li1", "w1", "2026-01-01T00:00:00+00:00"))
            .unwrap();
        db.insert_list(&list("li2", "w1", "2026-02-01T00:00:00+00:00"))
            .unwrap();

        let lists = db.get_lists_for_workspace("w1").unwrap();
        assert_eq!(lists[0].id, "li2");
    }

    #[test]
    fn test_clear_list_references() {
        let db = CrmDb::open_in_memory().unwrap();
        db.insert_list(&list("li1", "w1", &now_rfc3339())).unwrap();
        let mut l = crate::testutil::bare_lead("l1", "w1");
        l.list_id = Some("li1".to_string());
        db.insert_lead(&l).unwrap();

        let cleared = db.clear_list_references("li1", &now_rfc3339()).unwrap();
        assert_eq!(cleared, 1);
        assert!(db.get_lead("l1").unwrap().unwrap().list_id.is_none());
    }
}
