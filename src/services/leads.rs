//! Lead lifecycle: create, update, move, delete, bulk operations, import.
//!
//! Every mutation here is the only writer of its activity rows: the log is
//! append-only and only the lead-delete cascade ever removes from it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{
    ActivityData, CreatedData, CrmDb, DbActivity, DbLead, StageChangedData, ValueChangedData,
};
use crate::error::CrmError;
use crate::helpers::{now_rfc3339, parse_ts, today_iso_date};
use crate::identity::{require_identity, Identity};
use crate::limits::{MAX_IMPORTS_PER_DAY, MAX_LEADS, MAX_ROWS_PER_IMPORT};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLead {
    pub workspace_id: String,
    pub pipeline_id: String,
    pub stage_id: String,
    pub list_id: Option<String>,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub value: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub source: Option<String>,
}

/// Partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPatch {
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub value: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub owner_id: Option<String>,
}

/// One structured row of a bulk import. CSV parsing is the caller's job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRow {
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub value: Option<f64>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct BulkMoveResult {
    pub moved: usize,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResult {
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct ImportResult {
    pub imported: usize,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineLeadFilter {
    pub stage_id: Option<String>,
    pub owner_id: Option<String>,
    pub tags: Option<Vec<String>>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeadSortKey {
    Name,
    Company,
    Email,
    Value,
    CreatedAt,
    UpdatedAt,
    StageChangedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct WorkspaceLeadQuery {
    pub stage_id: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<LeadSortKey>,
    pub sort_order: Option<SortOrder>,
}

fn push_activity(
    db: &CrmDb,
    lead_id: &str,
    data: ActivityData,
    identity: &Identity,
    now: &str,
) -> Result<(), CrmError> {
    db.insert_activity(&DbActivity {
        id: Uuid::new_v4().to_string(),
        lead_id: lead_id.to_string(),
        activity_type: data.kind().to_string(),
        data: data.to_json(),
        actor_id: Some(identity.subject.clone()),
        actor_name: identity.name.clone(),
        created_at: now.to_string(),
    })?;
    Ok(())
}

/// Create a lead, its `created` activity, and bump the usage counter.
/// Fails when the workspace is at the lead cap.
pub fn create_lead(
    db: &CrmDb,
    identity: Option<&Identity>,
    new: &NewLead,
) -> Result<String, CrmError> {
    let identity = require_identity(identity)?;

    db.with_transaction(|db| {
        let usage = db
            .get_usage(&new.workspace_id)?
            .ok_or(CrmError::NotFound("Usage record"))?;
        if usage.lead_count >= MAX_LEADS as i64 {
            return Err(CrmError::LeadLimitReached { limit: MAX_LEADS });
        }

        let now = now_rfc3339();
        let lead = DbLead {
            id: Uuid::new_v4().to_string(),
            workspace_id: new.workspace_id.clone(),
            pipeline_id: new.pipeline_id.clone(),
            stage_id: new.stage_id.clone(),
            list_id: new.list_id.clone(),
            name: new.name.clone(),
            company: new.company.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            website: new.website.clone(),
            value: new.value,
            owner_id: Some(identity.subject.clone()),
            tags: new.tags.clone().unwrap_or_default(),
            source: new.source.clone().unwrap_or_else(|| "manual".to_string()),
            created_at: now.clone(),
            updated_at: now.clone(),
            stage_changed_at: now.clone(),
        };
        db.insert_lead(&lead)?;

        push_activity(
            db,
            &lead.id,
            ActivityData::Created(CreatedData { source: None }),
            identity,
            &now,
        )?;
        db.adjust_lead_count(&new.workspace_id, 1, &now)?;

        log::debug!("Created lead {} in workspace {}", lead.id, new.workspace_id);
        Ok(lead.id)
    })
}

/// Apply a patch. A differing supplied value also appends a
/// `value_changed` activity with the old and new amounts.
pub fn update_lead(
    db: &CrmDb,
    identity: Option<&Identity>,
    lead_id: &str,
    patch: &LeadPatch,
) -> Result<(), CrmError> {
    let identity = require_identity(identity)?;

    db.with_transaction(|db| {
        let mut lead = db.get_lead(lead_id)?.ok_or(CrmError::NotFound("Lead"))?;
        let now = now_rfc3339();

        if let Some(value) = patch.value {
            if Some(value) != lead.value {
                push_activity(
                    db,
                    lead_id,
                    ActivityData::ValueChanged(ValueChangedData {
                        from_value: lead.value,
                        to_value: value,
                    }),
                    identity,
                    &now,
                )?;
            }
        }

        if let Some(name) = &patch.name {
            lead.name = name.clone();
        }
        if let Some(company) = &patch.company {
            lead.company = Some(company.clone());
        }
        if let Some(email) = &patch.email {
            lead.email = Some(email.clone());
        }
        if let Some(phone) = &patch.phone {
            lead.phone = Some(phone.clone());
        }
        if let Some(website) = &patch.website {
            lead.website = Some(website.clone());
        }
        if let Some(value) = patch.value {
            lead.value = Some(value);
        }
        if let Some(tags) = &patch.tags {
            lead.tags = tags.clone();
        }
        if let Some(owner_id) = &patch.owner_id {
            lead.owner_id = Some(owner_id.clone());
        }
        lead.updated_at = now;

        db.update_lead(&lead)?;
        Ok(())
    })
}

/// Move a lead to another stage. Same-stage moves are silent no-ops;
/// real moves snapshot both stage names into the activity payload as they
/// read at call time.
pub fn move_lead(
    db: &CrmDb,
    identity: Option<&Identity>,
    lead_id: &str,
    to_stage_id: &str,
) -> Result<(), CrmError> {
    let identity = require_identity(identity)?;

    db.with_transaction(|db| {
        let lead = db.get_lead(lead_id)?.ok_or(CrmError::NotFound("Lead"))?;
        if lead.stage_id == to_stage_id {
            return Ok(());
        }

        let from_stage = db.get_stage(&lead.stage_id)?;
        let to_stage = db.get_stage(to_stage_id)?;
        let now = now_rfc3339();

        db.set_lead_stage(lead_id, to_stage_id, &now)?;
        push_activity(
            db,
            lead_id,
            ActivityData::StageChanged(StageChangedData {
                from_stage_id: lead.stage_id.clone(),
                from_stage_name: from_stage.map(|s| s.name),
                to_stage_id: to_stage_id.to_string(),
                to_stage_name: to_stage.map(|s| s.name),
            }),
            identity,
            &now,
        )?;
        Ok(())
    })
}

/// Delete a lead and everything hanging off it (notes, activities, tasks),
/// decrementing the usage counter with a floor of zero.
pub fn delete_lead(
    db: &CrmDb,
    identity: Option<&Identity>,
    lead_id: &str,
) -> Result<(), CrmError> {
    require_identity(identity)?;

    db.with_transaction(|db| {
        let lead = db.get_lead(lead_id)?.ok_or(CrmError::NotFound("Lead"))?;
        let now = now_rfc3339();

        db.delete_notes_for_lead(lead_id)?;
        db.delete_activities_for_lead(lead_id)?;
        db.delete_tasks_for_lead(lead_id)?;
        db.delete_lead_row(lead_id)?;
        db.adjust_lead_count(&lead.workspace_id, -1, &now)?;

        log::debug!("Deleted lead {} from workspace {}", lead_id, lead.workspace_id);
        Ok(())
    })
}

/// Move a batch of leads to one stage. Missing leads and leads already in
/// the target stage are skipped silently; the returned count is the number
/// of ids requested, not the number actually moved.
pub fn bulk_move_leads(
    db: &CrmDb,
    identity: Option<&Identity>,
    lead_ids: &[String],
    to_stage_id: &str,
) -> Result<BulkMoveResult, CrmError> {
    let identity = require_identity(identity)?;

    db.with_transaction(|db| {
        let to_stage = db.get_stage(to_stage_id)?;
        let to_stage_name = to_stage.map(|s| s.name);
        let now = now_rfc3339();

        for lead_id in lead_ids {
            let Some(lead) = db.get_lead(lead_id)? else {
                continue;
            };
            if lead.stage_id == to_stage_id {
                continue;
            }

            let from_stage = db.get_stage(&lead.stage_id)?;
            db.set_lead_stage(lead_id, to_stage_id, &now)?;
            push_activity(
                db,
                lead_id,
                ActivityData::StageChanged(StageChangedData {
                    from_stage_id: lead.stage_id.clone(),
                    from_stage_name: from_stage.map(|s| s.name),
                    to_stage_id: to_stage_id.to_string(),
                    to_stage_name: to_stage_name.clone(),
                }),
                identity,
                &now,
            )?;
        }

        Ok(BulkMoveResult {
            moved: lead_ids.len(),
        })
    })
}

/// Delete a batch of leads with full cascades. Missing ids are skipped;
/// the returned count is the number actually deleted.
pub fn bulk_delete_leads(
    db: &CrmDb,
    identity: Option<&Identity>,
    lead_ids: &[String],
) -> Result<BulkDeleteResult, CrmError> {
    require_identity(identity)?;

    db.with_transaction(|db| {
        let now = now_rfc3339();
        let mut workspace_id: Option<String> = None;
        let mut deleted = 0usize;

        for lead_id in lead_ids {
            let Some(lead) = db.get_lead(lead_id)? else {
                continue;
            };
            workspace_id = Some(lead.workspace_id.clone());

            db.delete_notes_for_lead(lead_id)?;
            db.delete_activities_for_lead(lead_id)?;
            db.delete_tasks_for_lead(lead_id)?;
            db.delete_lead_row(lead_id)?;
            deleted += 1;
        }

        if let Some(workspace_id) = workspace_id {
            db.adjust_lead_count(&workspace_id, -(deleted as i64), &now)?;
        }

        Ok(BulkDeleteResult { deleted })
    })
}

/// Bulk import into one stage. All limit checks run up front, in order:
/// daily-counter rollover, daily import cap, total-capacity check, row cap.
/// Any failure leaves the workspace untouched; success counts as exactly
/// one import against the daily cap.
pub fn import_leads(
    db: &CrmDb,
    identity: Option<&Identity>,
    workspace_id: &str,
    pipeline_id: &str,
    stage_id: &str,
    rows: &[ImportRow],
) -> Result<ImportResult, CrmError> {
    let identity = require_identity(identity)?;

    db.with_transaction(|db| {
        let usage = db
            .get_usage(workspace_id)?
            .ok_or(CrmError::NotFound("Usage record"))?;

        let today = today_iso_date();
        let imports_today = if usage.last_import_date.as_deref() != Some(&today) {
            0
        } else {
            if usage.imports_today >= MAX_IMPORTS_PER_DAY as i64 {
                return Err(CrmError::ImportLimitReached {
                    limit: MAX_IMPORTS_PER_DAY,
                });
            }
            usage.imports_today
        };

        if usage.lead_count + rows.len() as i64 > MAX_LEADS as i64 {
            return Err(CrmError::ImportWouldExceedLeadLimit {
                limit: MAX_LEADS,
                remaining: MAX_LEADS as i64 - usage.lead_count,
            });
        }

        if rows.len() > MAX_ROWS_PER_IMPORT as usize {
            return Err(CrmError::RowLimitExceeded {
                limit: MAX_ROWS_PER_IMPORT,
            });
        }

        let now = now_rfc3339();
        let mut imported = 0usize;

        for row in rows {
            let lead = DbLead {
                id: Uuid::new_v4().to_string(),
                workspace_id: workspace_id.to_string(),
                pipeline_id: pipeline_id.to_string(),
                stage_id: stage_id.to_string(),
                list_id: None,
                name: row.name.clone(),
                company: row.company.clone(),
                email: row.email.clone(),
                phone: row.phone.clone(),
                website: None,
                value: row.value,
                owner_id: Some(identity.subject.clone()),
                tags: row.tags.clone().unwrap_or_default(),
                source: "import".to_string(),
                created_at: now.clone(),
                updated_at: now.clone(),
                stage_changed_at: now.clone(),
            };
            db.insert_lead(&lead)?;
            push_activity(
                db,
                &lead.id,
                ActivityData::Created(CreatedData {
                    source: Some("import".to_string()),
                }),
                identity,
                &now,
            )?;
            imported += 1;
        }

        db.adjust_lead_count(workspace_id, imported as i64, &now)?;
        db.record_import(workspace_id, imports_today + 1, &today, &now)?;

        log::info!("Imported {} leads into workspace {}", imported, workspace_id);
        Ok(ImportResult { imported })
    })
}

pub fn get_lead_by_id(db: &CrmDb, lead_id: &str) -> Result<Option<DbLead>, CrmError> {
    Ok(db.get_lead(lead_id)?)
}

fn matches_search(lead: &DbLead, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    lead.name.to_lowercase().contains(&needle)
        || lead
            .company
            .as_deref()
            .is_some_and(|c| c.to_lowercase().contains(&needle))
        || lead
            .email
            .as_deref()
            .is_some_and(|e| e.to_lowercase().contains(&needle))
}

/// Board query: a pipeline's leads with optional stage/owner/tag/search
/// filters. Tag filter matches any overlap.
pub fn get_leads_by_pipeline(
    db: &CrmDb,
    pipeline_id: &str,
    filter: &PipelineLeadFilter,
) -> Result<Vec<DbLead>, CrmError> {
    let mut leads = db.get_leads_by_pipeline(pipeline_id)?;

    if let Some(stage_id) = &filter.stage_id {
        leads.retain(|l| &l.stage_id == stage_id);
    }
    if let Some(owner_id) = &filter.owner_id {
        leads.retain(|l| l.owner_id.as_ref() == Some(owner_id));
    }
    if let Some(tags) = &filter.tags {
        if !tags.is_empty() {
            leads.retain(|l| tags.iter().any(|t| l.tags.contains(t)));
        }
    }
    if let Some(search) = &filter.search {
        leads.retain(|l| matches_search(l, search));
    }

    Ok(leads)
}

enum SortVal<'a> {
    Str(&'a str),
    Num(f64),
}

fn sort_val<'a>(lead: &'a DbLead, key: LeadSortKey) -> Option<SortVal<'a>> {
    let ts = |s: &str| parse_ts(s).map(|dt| SortVal::Num(dt.timestamp_millis() as f64));
    match key {
        LeadSortKey::Name => Some(SortVal::Str(&lead.name)),
        LeadSortKey::Company => lead.company.as_deref().map(SortVal::Str),
        LeadSortKey::Email => lead.email.as_deref().map(SortVal::Str),
        LeadSortKey::Value => lead.value.map(SortVal::Num),
        LeadSortKey::CreatedAt => ts(&lead.created_at),
        LeadSortKey::UpdatedAt => ts(&lead.updated_at),
        LeadSortKey::StageChangedAt => ts(&lead.stage_changed_at),
    }
}

/// List-view query: workspace leads with stage/search filters and a chosen
/// sort. Defaults to newest-created first. Rows missing the sort key go
/// last regardless of direction.
pub fn get_leads_by_workspace(
    db: &CrmDb,
    workspace_id: &str,
    query: &WorkspaceLeadQuery,
) -> Result<Vec<DbLead>, CrmError> {
    let mut leads = db.get_leads_by_workspace(workspace_id)?;

    if let Some(stage_id) = &query.stage_id {
        leads.retain(|l| &l.stage_id == stage_id);
    }
    if let Some(search) = &query.search {
        leads.retain(|l| matches_search(l, search));
    }

    let key = query.sort_by.unwrap_or(LeadSortKey::CreatedAt);
    let order = query.sort_order.unwrap_or(SortOrder::Desc);

    leads.sort_by(|a, b| {
        use std::cmp::Ordering;
        match (sort_val(a, key), sort_val(b, key)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(av), Some(bv)) => {
                let cmp = match (av, bv) {
                    (SortVal::Str(a), SortVal::Str(b)) => a.cmp(b),
                    (SortVal::Num(a), SortVal::Num(b)) => {
                        a.partial_cmp(&b).unwrap_or(Ordering::Equal)
                    }
                    _ => Ordering::Equal,
                };
                match order {
                    SortOrder::Asc => cmp,
                    SortOrder::Desc => cmp.reverse(),
                }
            }
        }
    });

    Ok(leads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::pipelines;
    use crate::testutil::{ident, setup_workspace, test_db, Fixture};

    fn new_lead(fx: &Fixture, name: &str) -> NewLead {
        NewLead {
            workspace_id: fx.workspace_id.clone(),
            pipeline_id: fx.pipeline_id.clone(),
            stage_id: fx.stage_ids[0].clone(),
            list_id: None,
            name: name.to_string(),
            company: None,
            email: None,
            phone: None,
            website: None,
            value: None,
            tags: None,
            source: None,
        }
    }

    fn import_rows(n: usize) -> Vec<ImportRow> {
        (0..n)
            .map(|i| ImportRow {
                name: format!("Lead {}", i),
                company: None,
                email: None,
                phone: None,
                value: None,
                tags: None,
            })
            .collect()
    }

    #[test]
    fn test_create_increments_usage_and_logs_created() {
        let db = test_db();
        let fx = setup_workspace(&db);

        let id = create_lead(&db, Some(&ident()), &new_lead(&fx, "Acme")).unwrap();

        let usage = db.get_usage(&fx.workspace_id).unwrap().unwrap();
        assert_eq!(usage.lead_count, 1);

        let trail = db.get_activities_for_lead(&id).unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].activity_type, "created");
        assert!(trail[0].data.is_none());
        assert_eq!(trail[0].actor_id.as_deref(), Some("user-1"));
        assert_eq!(trail[0].actor_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_create_rejected_at_lead_cap() {
        let db = test_db();
        let fx = setup_workspace(&db);

        // Push the counter to the cap directly.
        db.adjust_lead_count(&fx.workspace_id, MAX_LEADS as i64, &now_rfc3339())
            .unwrap();

        let err = create_lead(&db, Some(&ident()), &new_lead(&fx, "One too many")).unwrap_err();
        assert!(matches!(err, CrmError::LeadLimitReached { limit: 1000 }));
        assert!(db.get_leads_by_workspace(&fx.workspace_id).unwrap().is_empty());
    }

    #[test]
    fn test_update_value_change_logs_from_and_to() {
        let db = test_db();
        let fx = setup_workspace(&db);
        let id = create_lead(&db, Some(&ident()), &new_lead(&fx, "Acme")).unwrap();

        let patch = LeadPatch {
            value: Some(500.0),
            ..Default::default()
        };
        update_lead(&db, Some(&ident()), &id, &patch).unwrap();

        let trail = db.get_activities_for_lead(&id).unwrap();
        let value_changes: Vec<_> = trail
            .iter()
            .filter(|a| a.activity_type == "value_changed")
            .collect();
        assert_eq!(value_changes.len(), 1);
        let payload = value_changes[0].payload().unwrap();
        assert_eq!(
            payload,
            ActivityData::ValueChanged(ValueChangedData {
                from_value: None,
                to_value: 500.0,
            })
        );

        // Same value again: no new activity.
        update_lead(&db, Some(&ident()), &id, &patch).unwrap();
        let trail = db.get_activities_for_lead(&id).unwrap();
        assert_eq!(
            trail.iter().filter(|a| a.activity_type == "value_changed").count(),
            1
        );
    }

    #[test]
    fn test_move_same_stage_is_a_silent_noop() {
        let db = test_db();
        let fx = setup_workspace(&db);
        let id = create_lead(&db, Some(&ident()), &new_lead(&fx, "Acme")).unwrap();
        let before = db.get_lead(&id).unwrap().unwrap();

        move_lead(&db, Some(&ident()), &id, &fx.stage_ids[0]).unwrap();

        let after = db.get_lead(&id).unwrap().unwrap();
        assert_eq!(after.updated_at, before.updated_at);
        assert_eq!(after.stage_changed_at, before.stage_changed_at);
        assert_eq!(db.get_activities_for_lead(&id).unwrap().len(), 1);
    }

    #[test]
    fn test_move_snapshots_stage_names_at_call_time() {
        let db = test_db();
        let fx = setup_workspace(&db);
        let id = create_lead(&db, Some(&ident()), &new_lead(&fx, "Acme")).unwrap();

        move_lead(&db, Some(&ident()), &id, &fx.stage_ids[1]).unwrap();

        // Rename the target stage after the move.
        pipelines::update_stage(
            &db,
            Some(&ident()),
            &fx.stage_ids[1],
            &pipelines::StagePatch {
                name: Some("Vetted".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        let trail = db.get_activities_for_lead(&id).unwrap();
        let change = trail
            .iter()
            .find(|a| a.activity_type == "stage_changed")
            .unwrap();
        match change.payload().unwrap() {
            ActivityData::StageChanged(data) => {
                assert_eq!(data.from_stage_name.as_deref(), Some("New"));
                assert_eq!(data.to_stage_name.as_deref(), Some("Qualified"));
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_move_lead_accepts_stage_from_another_pipeline() {
        let db = test_db();
        let fx = setup_workspace(&db);
        let id = create_lead(&db, Some(&ident()), &new_lead(&fx, "Acme")).unwrap();

        // A stage belonging to no pipeline in this workspace.
        let now = now_rfc3339();
        db.insert_stage(&crate::db::DbStage {
            id: "foreign-stage".to_string(),
            pipeline_id: "other-pipeline".to_string(),
            name: "Elsewhere".to_string(),
            position: 0,
            color: None,
            is_won: false,
            is_lost: false,
            created_at: now.clone(),
            updated_at: now,
        })
        .unwrap();

        move_lead(&db, Some(&ident()), &id, "foreign-stage").unwrap();
        assert_eq!(db.get_lead(&id).unwrap().unwrap().stage_id, "foreign-stage");
    }

    #[test]
    fn test_delete_cascades_and_floors_usage() {
        let db = test_db();
        let fx = setup_workspace(&db);
        let id = create_lead(&db, Some(&ident()), &new_lead(&fx, "Acme")).unwrap();

        crate::services::notes::add_note(&db, Some(&ident()), &id, "call notes").unwrap();
        crate::services::tasks::create_task(
            &db,
            Some(&ident()),
            &crate::services::tasks::NewTask {
                workspace_id: fx.workspace_id.clone(),
                lead_id: Some(id.clone()),
                list_id: None,
                title: "Follow up".to_string(),
                description: None,
                priority: crate::db::TaskPriority::Medium,
                due_date: None,
            },
        )
        .unwrap();

        delete_lead(&db, Some(&ident()), &id).unwrap();

        assert!(db.get_lead(&id).unwrap().is_none());
        assert!(db.get_notes_for_lead(&id).unwrap().is_empty());
        assert!(db.get_activities_for_lead(&id).unwrap().is_empty());
        assert!(db.get_tasks_for_lead(&id).unwrap().is_empty());
        assert_eq!(db.get_usage(&fx.workspace_id).unwrap().unwrap().lead_count, 0);

        // Deleting with a desynced counter still floors at zero.
        let id2 = create_lead(&db, Some(&ident()), &new_lead(&fx, "Next")).unwrap();
        db.adjust_lead_count(&fx.workspace_id, -1, &now_rfc3339())
            .unwrap();
        delete_lead(&db, Some(&ident()), &id2).unwrap();
        assert_eq!(db.get_usage(&fx.workspace_id).unwrap().unwrap().lead_count, 0);
    }

    #[test]
    fn test_bulk_move_counts_requested_ids_not_moved_ones() {
        let db = test_db();
        let fx = setup_workspace(&db);
        let a = create_lead(&db, Some(&ident()), &new_lead(&fx, "A")).unwrap();
        let b = create_lead(&db, Some(&ident()), &new_lead(&fx, "B")).unwrap();
        move_lead(&db, Some(&ident()), &b, &fx.stage_ids[1]).unwrap();

        // b is already in the target stage and "ghost" does not exist, so
        // only a actually moves, but the result reports all three.
        let ids = vec![a.clone(), b.clone(), "ghost".to_string()];
        let result = bulk_move_leads(&db, Some(&ident()), &ids, &fx.stage_ids[1]).unwrap();
        assert_eq!(result.moved, 3);

        assert_eq!(db.get_lead(&a).unwrap().unwrap().stage_id, fx.stage_ids[1]);
        // b got no duplicate activity.
        let b_changes = db
            .get_activities_for_lead(&b)
            .unwrap()
            .iter()
            .filter(|x| x.activity_type == "stage_changed")
            .count();
        assert_eq!(b_changes, 1);
    }

    #[test]
    fn test_bulk_delete_reports_actual_count() {
        let db = test_db();
        let fx = setup_workspace(&db);
        let a = create_lead(&db, Some(&ident()), &new_lead(&fx, "A")).unwrap();
        let b = create_lead(&db, Some(&ident()), &new_lead(&fx, "B")).unwrap();

        let ids = vec![a, b, "ghost".to_string()];
        let result = bulk_delete_leads(&db, Some(&ident()), &ids).unwrap();
        assert_eq!(result.deleted, 2);
        assert_eq!(db.get_usage(&fx.workspace_id).unwrap().unwrap().lead_count, 0);
    }

    #[test]
    fn test_import_row_cap_leaves_nothing_behind() {
        let db = test_db();
        let fx = setup_workspace(&db);

        let err = import_leads(
            &db,
            Some(&ident()),
            &fx.workspace_id,
            &fx.pipeline_id,
            &fx.stage_ids[0],
            &import_rows(501),
        )
        .unwrap_err();
        assert!(matches!(err, CrmError::RowLimitExceeded { limit: 500 }));

        assert!(db.get_leads_by_workspace(&fx.workspace_id).unwrap().is_empty());
        let usage = db.get_usage(&fx.workspace_id).unwrap().unwrap();
        assert_eq!(usage.lead_count, 0);
        assert_eq!(usage.imports_today, 0);
    }

    #[test]
    fn test_import_daily_cap_and_rollover() {
        let db = test_db();
        let fx = setup_workspace(&db);

        for _ in 0..3 {
            import_leads(
                &db,
                Some(&ident()),
                &fx.workspace_id,
                &fx.pipeline_id,
                &fx.stage_ids[0],
                &import_rows(1),
            )
            .unwrap();
        }

        let err = import_leads(
            &db,
            Some(&ident()),
            &fx.workspace_id,
            &fx.pipeline_id,
            &fx.stage_ids[0],
            &import_rows(1),
        )
        .unwrap_err();
        assert!(matches!(err, CrmError::ImportLimitReached { limit: 3 }));

        // Pretend the last import happened yesterday.
        db.record_import(&fx.workspace_id, 3, "2000-01-01", &now_rfc3339())
            .unwrap();

        let result = import_leads(
            &db,
            Some(&ident()),
            &fx.workspace_id,
            &fx.pipeline_id,
            &fx.stage_ids[0],
            &import_rows(1),
        )
        .unwrap();
        assert_eq!(result.imported, 1);
        assert_eq!(db.get_usage(&fx.workspace_id).unwrap().unwrap().imports_today, 1);
    }

    #[test]
    fn test_import_capacity_check_reports_remaining() {
        let db = test_db();
        let fx = setup_workspace(&db);
        db.adjust_lead_count(&fx.workspace_id, 998, &now_rfc3339())
            .unwrap();

        let err = import_leads(
            &db,
            Some(&ident()),
            &fx.workspace_id,
            &fx.pipeline_id,
            &fx.stage_ids[0],
            &import_rows(5),
        )
        .unwrap_err();
        match err {
            CrmError::ImportWouldExceedLeadLimit { limit, remaining } => {
                assert_eq!(limit, 1000);
                assert_eq!(remaining, 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_imported_leads_carry_import_source() {
        let db = test_db();
        let fx = setup_workspace(&db);
        import_leads(
            &db,
            Some(&ident()),
            &fx.workspace_id,
            &fx.pipeline_id,
            &fx.stage_ids[0],
            &import_rows(2),
        )
        .unwrap();

        let leads = db.get_leads_by_workspace(&fx.workspace_id).unwrap();
        assert_eq!(leads.len(), 2);
        for lead in &leads {
            assert_eq!(lead.source, "import");
            let trail = db.get_activities_for_lead(&lead.id).unwrap();
            assert_eq!(trail.len(), 1);
            assert_eq!(
                trail[0].payload(),
                Some(ActivityData::Created(CreatedData {
                    source: Some("import".to_string())
                }))
            );
        }
    }

    #[test]
    fn test_workspace_query_filters_and_sorts() {
        let db = test_db();
        let fx = setup_workspace(&db);

        for (name, value) in [("Zeta", Some(10.0)), ("Alpha", None), ("Mid", Some(5.0))] {
            let mut l = new_lead(&fx, name);
            l.value = value;
            create_lead(&db, Some(&ident()), &l).unwrap();
        }

        let query = WorkspaceLeadQuery {
            sort_by: Some(LeadSortKey::Value),
            sort_order: Some(SortOrder::Desc),
            ..Default::default()
        };
        let leads = get_leads_by_workspace(&db, &fx.workspace_id, &query).unwrap();
        let names: Vec<&str> = leads.iter().map(|l| l.name.as_str()).collect();
        // Missing value sorts last even in descending order.
        assert_eq!(names, vec!["Zeta", "Mid", "Alpha"]);

        let query = WorkspaceLeadQuery {
            search: Some("alp".to_string()),
            ..Default::default()
        };
        let found = get_leads_by_workspace(&db, &fx.workspace_id, &query).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Alpha");
    }

    #[test]
    fn test_pipeline_query_tag_filter_matches_any() {
        let db = test_db();
        let fx = setup_workspace(&db);

        let mut a = new_lead(&fx, "Tagged");
        a.tags = Some(vec!["vip".to_string()]);
        create_lead(&db, Some(&ident()), &a).unwrap();
        create_lead(&db, Some(&ident()), &new_lead(&fx, "Plain")).unwrap();

        let filter = PipelineLeadFilter {
            tags: Some(vec!["vip".to_string(), "other".to_string()]),
            ..Default::default()
        };
        let leads = get_leads_by_pipeline(&db, &fx.pipeline_id, &filter).unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].name, "Tagged");
    }
}
