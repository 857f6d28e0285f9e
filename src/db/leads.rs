//! Lead and activity queries.

use super::*;
use rusqlite::{params, OptionalExtension, Row};

fn map_lead_row(row: &Row) -> rusqlite::Result<DbLead> {
    let tags_raw: String = row.get("tags")?;
    Ok(DbLead {
        id: row.get("id")?,
        workspace_id: row.get("workspace_id")?,
        pipeline_id: row.get("pipeline_id")?,
        stage_id: row.get("stage_id")?,
        list_id: row.get("list_id")?,
        name: row.get("name")?,
        company: row.get("company")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        website: row.get("website")?,
        value: row.get("value")?,
        owner_id: row.get("owner_id")?,
        tags: parse_tags(&tags_raw),
        source: row.get("source")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        stage_changed_at: row.get("stage_changed_at")?,
    })
}

fn map_activity_row(row: &Row) -> rusqlite::Result<DbActivity> {
    Ok(DbActivity {
        id: row.get("id")?,
        lead_id: row.get("lead_id")?,
        activity_type: row.get("type")?,
        data: row.get("data")?,
        actor_id: row.get("actor_id")?,
        actor_name: row.get("actor_name")?,
        created_at: row.get("created_at")?,
    })
}

impl CrmDb {
    pub fn insert_lead(&self, lead: &DbLead) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO leads (id, workspace_id, pipeline_id, stage_id, list_id, name,
                company, email, phone, website, value, owner_id, tags, source,
                created_at, updated_at, stage_changed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                lead.id,
                lead.workspace_id,
                lead.pipeline_id,
                lead.stage_id,
                lead.list_id,
                lead.name,
                lead.company,
                lead.email,
                lead.phone,
                lead.website,
                lead.value,
                lead.owner_id,
                tags_to_json(&lead.tags),
                lead.source,
                lead.created_at,
                lead.updated_at,
                lead.stage_changed_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_lead(&self, id: &str) -> Result<Option<DbLead>, DbError> {
        let lead = self
            .conn
            .query_row("SELECT * FROM leads WHERE id = ?1", params![id], map_lead_row)
            .optional()?;
        Ok(lead)
    }

    /// Full-row rewrite of the mutable fields. The caller is expected to
    /// have loaded the row, applied its patch, and bumped `updated_at`.
    pub fn update_lead(&self, lead: &DbLead) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE leads SET
                stage_id = ?2, list_id = ?3, name = ?4, company = ?5, email = ?6,
                phone = ?7, website = ?8, value = ?9, owner_id = ?10, tags = ?11,
                updated_at = ?12, stage_changed_at = ?13
             WHERE id = ?1",
            params![
                lead.id,
                lead.stage_id,
                lead.list_id,
                lead.name,
                lead.company,
                lead.email,
                lead.phone,
                lead.website,
                lead.value,
                lead.owner_id,
                tags_to_json(&lead.tags),
                lead.updated_at,
                lead.stage_changed_at,
            ],
        )?;
        Ok(())
    }

    /// Stage move only: stamps both `stage_changed_at` and `updated_at`.
    pub fn set_lead_stage(&self, lead_id: &str, stage_id: &str, now: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE leads SET stage_id = ?2, stage_changed_at = ?3, updated_at = ?3
             WHERE id = ?1",
            params![lead_id, stage_id, now],
        )?;
        Ok(())
    }

    pub fn set_lead_list(
        &self,
        lead_id: &str,
        list_id: Option<&str>,
        now: &str,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE leads SET list_id = ?2, updated_at = ?3 WHERE id = ?1",
            params![lead_id, list_id, now],
        )?;
        Ok(())
    }

    pub fn touch_lead(&self, lead_id: &str, now: &str) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE leads SET updated_at = ?2 WHERE id = ?1",
            params![lead_id, now],
        )?;
        Ok(())
    }

    pub fn delete_lead_row(&self, lead_id: &str) -> Result<(), DbError> {
        self.conn
            .execute("DELETE FROM leads WHERE id = ?1", params![lead_id])?;
        Ok(())
    }

    pub fn get_leads_by_pipeline(&self, pipeline_id: &str) -> Result<Vec<DbLead>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM leads WHERE pipeline_id = ?1")?;
        let leads = stmt
            .query_map(params![pipeline_id], map_lead_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(leads)
    }

    pub fn get_leads_by_workspace(&self, workspace_id: &str) -> Result<Vec<DbLead>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM leads WHERE workspace_id = ?1")?;
        let leads = stmt
            .query_map(params![workspace_id], map_lead_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(leads)
    }

    pub fn get_leads_by_list(&self, list_id: &str) -> Result<Vec<DbLead>, DbError> {
        let mut stmt = self.conn.prepare("SELECT * FROM leads WHERE list_id = ?1")?;
        let leads = stmt
            .query_map(params![list_id], map_lead_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(leads)
    }

    pub fn count_leads_in_list(&self, list_id: &str) -> Result<i64, DbError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM leads WHERE list_id = ?1",
            params![list_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Newest leads in a workspace by `created_at` descending.
    pub fn get_recent_leads(&self, workspace_id: &str, limit: i64) -> Result<Vec<DbLead>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM leads WHERE workspace_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let leads = stmt
            .query_map(params![workspace_id, limit], map_lead_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(leads)
    }

    pub fn insert_activity(&self, activity: &DbActivity) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO lead_activities (id, lead_id, type, data, actor_id, actor_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                activity.id,
                activity.lead_id,
                activity.activity_type,
                activity.data,
                activity.actor_id,
                activity.actor_name,
                activity.created_at,
            ],
        )?;
        Ok(())
    }

    /// A lead's activity trail, newest first.
    pub fn get_activities_for_lead(&self, lead_id: &str) -> Result<Vec<DbActivity>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM lead_activities WHERE lead_id = ?1 ORDER BY created_at DESC",
        )?;
        let activities = stmt
            .query_map(params![lead_id], map_activity_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(activities)
    }

    /// Newest activities across a whole workspace, joined through leads.
    pub fn get_recent_activities(
        &self,
        workspace_id: &str,
        limit: i64,
    ) -> Result<Vec<DbActivity>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.* FROM lead_activities a
             JOIN leads l ON l.id = a.lead_id
             WHERE l.workspace_id = ?1
             ORDER BY a.created_at DESC LIMIT ?2",
        )?;
        let activities = stmt
            .query_map(params![workspace_id, limit], map_activity_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(activities)
    }

    /// Every activity in a workspace, for the dashboard aggregation scan.
    pub fn get_all_activities(&self, workspace_id: &str) -> Result<Vec<DbActivity>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.* FROM lead_activities a
             JOIN leads l ON l.id = a.lead_id
             WHERE l.workspace_id = ?1",
        )?;
        let activities = stmt
            .query_map(params![workspace_id], map_activity_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(activities)
    }

    pub fn delete_activities_for_lead(&self, lead_id: &str) -> Result<(), DbError> {
        self.conn.execute(
            "DELETE FROM lead_activities WHERE lead_id = ?1",
            params![lead_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::now_rfc3339;
    use crate::testutil::bare_lead as lead;

    #[test]
    fn test_lead_round_trip_preserves_tags() {
        let db = CrmDb::open_in_memory().unwrap();
        let mut l = lead("l1", "w1");
        l.tags = vec!["vip".to_string(), "q3".to_string()];
        db.insert_lead(&l).unwrap();

        let found = db.get_lead("l1").unwrap().expect("lead");
        assert_eq!(found.tags, vec!["vip", "q3"]);
        assert_eq!(found.source, "manual");
    }

    #[test]
    fn test_set_lead_stage_stamps_both_timestamps() {
        let db = CrmDb::open_in_memory().unwrap();
        db.insert_lead(&lead("l1", "w1")).unwrap();

        let later = "2099-01-01T00:00:00+00:00";
        db.set_lead_stage("l1", "s2", later).unwrap();

        let found = db.get_lead("l1").unwrap().expect("lead");
        assert_eq!(found.stage_id, "s2");
        assert_eq!(found.stage_changed_at, later);
        assert_eq!(found.updated_at, later);
    }

    #[test]
    fn test_activity_trail_newest_first() {
        let db = CrmDb::open_in_memory().unwrap();
        db.insert_lead(&lead("l1", "w1")).unwrap();

        for (id, at) in [("a1", "2026-01-01T00:00:00+00:00"), ("a2", "2026-02-01T00:00:00+00:00")] {
            db.insert_activity(&DbActivity {
                id: id.to_string(),
                lead_id: "l1".to_string(),
                activity_type: "created".to_string(),
                data: None,
                actor_id: None,
                actor_name: None,
                created_at: at.to_string(),
            })
            .unwrap();
        }

        let trail = db.get_activities_for_lead("l1").unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].id, "a2");
    }

    #[test]
    fn test_recent_activities_scoped_to_workspace() {
        let db = CrmDb::open_in_memory().unwrap();
        db.insert_lead(&lead("l1", "w1")).unwrap();
        db.insert_lead(&lead("l2", "w2")).unwrap();

        for (id, lead_id) in [("a1", "l1"), ("a2", "l2")] {
            db.insert_activity(&DbActivity {
                id: id.to_string(),
                lead_id: lead_id.to_string(),
                activity_type: "created".to_string(),
                data: None,
                actor_id: None,
                actor_name: None,
                created_at: now_rfc3339(),
            })
            .unwrap();
        }

        let recent = db.get_recent_activities("w1", 10).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].lead_id, "l1");
    }
}
