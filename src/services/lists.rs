//! Named lead lists: lightweight, cross-cutting groupings.
//!
//! A lead belongs to at most one list. Deleting a list detaches its
//! members; it never deletes them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{CrmDb, DbLead, DbList, DbStage, DbTask, TaskStatus};
use crate::error::CrmError;
use crate::helpers::{now_rfc3339, parse_ts};
use crate::identity::{require_identity, Identity};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListWithCounts {
    #[serde(flatten)]
    pub list: DbList,
    pub lead_count: i64,
    /// Open (non-done) tasks only.
    pub task_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLead {
    #[serde(flatten)]
    pub lead: DbLead,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<DbStage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDetail {
    #[serde(flatten)]
    pub list: DbList,
    pub leads: Vec<ListLead>,
    pub tasks: Vec<DbTask>,
}

/// Workspace lists with member counts, sorted by name.
pub fn get_lists_for_workspace(
    db: &CrmDb,
    workspace_id: &str,
) -> Result<Vec<ListWithCounts>, CrmError> {
    let lists = db.get_lists_for_workspace(workspace_id)?;
    let mut out = Vec::with_capacity(lists.len());
    for list in lists {
        let lead_count = db.count_leads_in_list(&list.id)?;
        let task_count = db.count_open_tasks_in_list(&list.id)?;
        out.push(ListWithCounts {
            list,
            lead_count,
            task_count,
        });
    }
    out.sort_by(|a, b| a.list.name.cmp(&b.list.name));
    Ok(out)
}

/// One list with its member leads (stage attached) and tasks (open first,
/// then newest).
pub fn get_list_by_id(db: &CrmDb, list_id: &str) -> Result<Option<ListDetail>, CrmError> {
    let Some(list) = db.get_list(list_id)? else {
        return Ok(None);
    };

    let leads = db.get_leads_by_list(list_id)?;
    let mut stages: HashMap<String, DbStage> = HashMap::new();
    for lead in &leads {
        if !stages.contains_key(&lead.stage_id) {
            if let Some(stage) = db.get_stage(&lead.stage_id)? {
                stages.insert(lead.stage_id.clone(), stage);
            }
        }
    }
    let leads = leads
        .into_iter()
        .map(|lead| {
            let stage = stages.get(&lead.stage_id).cloned();
            ListLead { lead, stage }
        })
        .collect();

    let mut tasks = db.get_tasks_for_list(list_id)?;
    let status_rank = |s: TaskStatus| match s {
        TaskStatus::Todo => 0,
        TaskStatus::InProgress => 1,
        TaskStatus::Done => 2,
    };
    tasks.sort_by(|a, b| {
        status_rank(a.status)
            .cmp(&status_rank(b.status))
            .then_with(|| {
                let at = parse_ts(&a.created_at);
                let bt = parse_ts(&b.created_at);
                bt.cmp(&at)
            })
    });

    Ok(Some(ListDetail { list, leads, tasks }))
}

pub fn create_list(
    db: &CrmDb,
    identity: Option<&Identity>,
    workspace_id: &str,
    name: &str,
    description: Option<&str>,
    color: Option<&str>,
) -> Result<String, CrmError> {
    let identity = require_identity(identity)?;

    let now = now_rfc3339();
    let list = DbList {
        id: Uuid::new_v4().to_string(),
        workspace_id: workspace_id.to_string(),
        name: name.to_string(),
        description: description.map(str::to_string),
        color: color.map(str::to_string),
        created_by: identity.subject.clone(),
        created_at: now.clone(),
        updated_at: now,
    };
    db.insert_list(&list)?;
    Ok(list.id)
}

pub fn update_list(
    db: &CrmDb,
    identity: Option<&Identity>,
    list_id: &str,
    patch: &ListPatch,
) -> Result<(), CrmError> {
    require_identity(identity)?;

    let mut list = db.get_list(list_id)?.ok_or(CrmError::NotFound("List"))?;
    if let Some(name) = &patch.name {
        list.name = name.clone();
    }
    if let Some(description) = &patch.description {
        list.description = Some(description.clone());
    }
    if let Some(color) = &patch.color {
        list.color = Some(color.clone());
    }
    list.updated_at = now_rfc3339();
    db.update_list(&list)?;
    Ok(())
}

/// Delete a list, detaching member leads and tasks.
pub fn delete_list(
    db: &CrmDb,
    identity: Option<&Identity>,
    list_id: &str,
) -> Result<(), CrmError> {
    require_identity(identity)?;

    db.with_transaction(|db| {
        let now = now_rfc3339();
        db.clear_list_references(list_id, &now)?;
        db.clear_task_list_references(list_id, &now)?;
        db.delete_list_row(list_id)?;
        Ok(())
    })
}

/// Assign a lead to a list, replacing any previous membership.
pub fn add_lead_to_list(
    db: &CrmDb,
    identity: Option<&Identity>,
    lead_id: &str,
    list_id: &str,
) -> Result<(), CrmError> {
    require_identity(identity)?;
    db.get_lead(lead_id)?.ok_or(CrmError::NotFound("Lead"))?;
    db.set_lead_list(lead_id, Some(list_id), &now_rfc3339())?;
    Ok(())
}

pub fn remove_lead_from_list(
    db: &CrmDb,
    identity: Option<&Identity>,
    lead_id: &str,
) -> Result<(), CrmError> {
    require_identity(identity)?;
    db.get_lead(lead_id)?.ok_or(CrmError::NotFound("Lead"))?;
    db.set_lead_list(lead_id, None, &now_rfc3339())?;
    Ok(())
}

/// Case-insensitive name substring match, first five hits in collection
/// (newest-first) order.
pub fn search_lists(
    db: &CrmDb,
    workspace_id: &str,
    query: &str,
) -> Result<Vec<DbList>, CrmError> {
    let needle = query.to_lowercase();
    let lists = db
        .get_lists_for_workspace(workspace_id)?
        .into_iter()
        .filter(|l| l.name.to_lowercase().contains(&needle))
        .take(5)
        .collect();
    Ok(lists)
}
