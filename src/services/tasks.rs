//! Task engine: standalone or lead-linked follow-ups.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{CrmDb, DbTask, TaskPriority, TaskStatus};
use crate::error::CrmError;
use crate::helpers::{now_rfc3339, parse_ts};
use crate::identity::{require_identity, Identity};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub workspace_id: String,
    pub lead_id: Option<String>,
    pub list_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<String>,
    pub lead_id: Option<String>,
}

/// Lead context stitched onto a task row for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLeadRef {
    pub name: String,
    pub company: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskWithLead {
    #[serde(flatten)]
    pub task: DbTask,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead: Option<TaskLeadRef>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

/// Id/name/company tuples for the assignment dropdown, name-sorted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignableLead {
    pub id: String,
    pub name: String,
    pub company: Option<String>,
}

fn status_rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::Todo => 0,
        TaskStatus::InProgress => 1,
        TaskStatus::Done => 2,
    }
}

/// Due dates ascending, undated after dated, then newest-created first.
fn cmp_due_then_created(a: &DbTask, b: &DbTask) -> Ordering {
    match (parse_due(a), parse_due(b)) {
        (Some(ad), Some(bd)) => ad.cmp(&bd),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => {
            let at = parse_ts(&a.created_at);
            let bt = parse_ts(&b.created_at);
            bt.cmp(&at)
        }
    }
}

fn parse_due(task: &DbTask) -> Option<chrono::DateTime<chrono::Utc>> {
    task.due_date.as_deref().and_then(parse_ts)
}

pub fn create_task(
    db: &CrmDb,
    identity: Option<&Identity>,
    new: &NewTask,
) -> Result<String, CrmError> {
    let identity = require_identity(identity)?;

    let now = now_rfc3339();
    let task = DbTask {
        id: Uuid::new_v4().to_string(),
        workspace_id: new.workspace_id.clone(),
        lead_id: new.lead_id.clone(),
        list_id: new.list_id.clone(),
        title: new.title.clone(),
        description: new.description.clone(),
        priority: new.priority,
        status: TaskStatus::Todo,
        due_date: new.due_date.clone(),
        completed_at: None,
        created_by: identity.subject.clone(),
        created_at: now.clone(),
        updated_at: now,
    };
    db.insert_task(&task)?;
    Ok(task.id)
}

/// Patch a task. Entering `done` stamps completed_at; any non-done status
/// in the patch clears it.
pub fn update_task(
    db: &CrmDb,
    identity: Option<&Identity>,
    task_id: &str,
    patch: &TaskPatch,
) -> Result<(), CrmError> {
    require_identity(identity)?;

    let mut task = db.get_task(task_id)?.ok_or(CrmError::NotFound("Task"))?;
    let now = now_rfc3339();

    if let Some(title) = &patch.title {
        task.title = title.clone();
    }
    if let Some(description) = &patch.description {
        task.description = Some(description.clone());
    }
    if let Some(priority) = patch.priority {
        task.priority = priority;
    }
    if let Some(due_date) = &patch.due_date {
        task.due_date = Some(due_date.clone());
    }
    if let Some(lead_id) = &patch.lead_id {
        task.lead_id = Some(lead_id.clone());
    }
    if let Some(status) = patch.status {
        if status == TaskStatus::Done && task.status != TaskStatus::Done {
            task.completed_at = Some(now.clone());
        } else if status != TaskStatus::Done {
            task.completed_at = None;
        }
        task.status = status;
    }
    task.updated_at = now;

    db.update_task(&task)?;
    Ok(())
}

/// Advance todo -> in_progress -> done -> todo. completed_at is set only
/// while the task sits in done.
pub fn cycle_task_status(
    db: &CrmDb,
    identity: Option<&Identity>,
    task_id: &str,
) -> Result<TaskStatus, CrmError> {
    require_identity(identity)?;

    let mut task = db.get_task(task_id)?.ok_or(CrmError::NotFound("Task"))?;
    let now = now_rfc3339();
    let next = task.status.next();

    task.completed_at = (next == TaskStatus::Done).then(|| now.clone());
    task.status = next;
    task.updated_at = now;
    db.update_task(&task)?;
    Ok(next)
}

/// Delete a task. Deleting an already-gone task is not an error.
pub fn delete_task(
    db: &CrmDb,
    identity: Option<&Identity>,
    task_id: &str,
) -> Result<(), CrmError> {
    require_identity(identity)?;
    db.delete_task_row(task_id)?;
    Ok(())
}

fn lead_refs(db: &CrmDb, tasks: &[DbTask]) -> Result<HashMap<String, TaskLeadRef>, CrmError> {
    let mut map = HashMap::new();
    for task in tasks {
        if let Some(lead_id) = &task.lead_id {
            if !map.contains_key(lead_id) {
                if let Some(lead) = db.get_lead(lead_id)? {
                    map.insert(
                        lead_id.clone(),
                        TaskLeadRef {
                            name: lead.name,
                            company: lead.company,
                        },
                    );
                }
            }
        }
    }
    Ok(map)
}

/// Workspace tasks with optional status/priority filters, sorted
/// status -> priority -> due date, lead context attached.
pub fn get_tasks_for_workspace(
    db: &CrmDb,
    workspace_id: &str,
    filter: &TaskFilter,
) -> Result<Vec<TaskWithLead>, CrmError> {
    let mut tasks = db.get_tasks_for_workspace(workspace_id)?;

    if let Some(status) = filter.status {
        tasks.retain(|t| t.status == status);
    }
    if let Some(priority) = filter.priority {
        tasks.retain(|t| t.priority == priority);
    }

    tasks.sort_by(|a, b| {
        status_rank(a.status)
            .cmp(&status_rank(b.status))
            .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
            .then_with(|| cmp_due_then_created(a, b))
    });

    let leads = lead_refs(db, &tasks)?;
    Ok(tasks
        .into_iter()
        .map(|task| {
            let lead = task.lead_id.as_ref().and_then(|id| leads.get(id)).cloned();
            TaskWithLead { task, lead }
        })
        .collect())
}

/// A lead's tasks, sorted status -> due date.
pub fn get_tasks_for_lead(db: &CrmDb, lead_id: &str) -> Result<Vec<DbTask>, CrmError> {
    let mut tasks = db.get_tasks_for_lead(lead_id)?;
    tasks.sort_by(|a, b| {
        status_rank(a.status)
            .cmp(&status_rank(b.status))
            .then_with(|| cmp_due_then_created(a, b))
    });
    Ok(tasks)
}

/// All workspace leads as assignment candidates, sorted by name.
pub fn get_leads_for_task_assignment(
    db: &CrmDb,
    workspace_id: &str,
) -> Result<Vec<AssignableLead>, CrmError> {
    let mut leads: Vec<AssignableLead> = db
        .get_leads_by_workspace(workspace_id)?
        .into_iter()
        .map(|l| AssignableLead {
            id: l.id,
            name: l.name,
            company: l.company,
        })
        .collect();
    leads.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(leads)
}
