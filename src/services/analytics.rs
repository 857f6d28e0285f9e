//! Dashboard analytics, derived on demand from current rows plus the
//! activity log. Nothing here writes.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{Duration, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{ActivityData, CrmDb, DbActivity, DbTask, TaskPriority, TaskStatus};
use crate::error::CrmError;
use crate::helpers::{local_date, parse_ts, today_bounds_utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MetricsRange {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl MetricsRange {
    fn days(&self) -> i64 {
        match self {
            MetricsRange::Week => 7,
            MetricsRange::Month => 30,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageCount {
    pub stage_id: String,
    pub stage_name: String,
    pub stage_color: Option<String>,
    pub count: usize,
    pub is_won: bool,
    pub is_lost: bool,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCount {
    pub date: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_leads: usize,
    pub new_leads_in_range: usize,
    pub open_count: usize,
    pub won_count: usize,
    pub lost_count: usize,
    pub total_value: f64,
    pub open_value: f64,
    pub won_value: f64,
    pub lost_value: f64,
    pub won_in_range: usize,
    pub leads_by_stage: Vec<StageCount>,
    pub leads_per_day: Vec<DayCount>,
    pub pipeline: PipelineRef,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFeedItem {
    #[serde(flatten)]
    pub activity: DbActivity,
    pub lead_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_company: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryTask {
    #[serde(flatten)]
    pub task: DbTask,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksSummary {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub done: usize,
    pub overdue: usize,
    pub due_today: usize,
    pub high_priority: usize,
    pub recent_tasks: Vec<SummaryTask>,
}

/// One dashboard payload for the workspace, or None when it has no
/// default pipeline yet.
///
/// Won/lost aggregates cover every stage carrying the corresponding flag,
/// not just the first. `wonInRange` is counted from `stage_changed`
/// activity payloads, so it survives later moves out of a won stage.
pub fn get_dashboard_metrics(
    db: &CrmDb,
    workspace_id: &str,
    range: Option<MetricsRange>,
) -> Result<Option<DashboardMetrics>, CrmError> {
    let range = range.unwrap_or(MetricsRange::Week);

    let Some(pipeline) = db.get_default_pipeline(workspace_id)? else {
        return Ok(None);
    };
    let stages = db.get_stages_for_pipeline(&pipeline.id)?;
    let leads = db.get_leads_by_workspace(workspace_id)?;

    let now = Utc::now();
    let start = now - Duration::days(range.days());

    let total_leads = leads.len();
    let new_leads_in_range = leads
        .iter()
        .filter(|l| parse_ts(&l.created_at).is_some_and(|t| t >= start))
        .count();

    let leads_by_stage: Vec<StageCount> = stages
        .iter()
        .map(|stage| StageCount {
            stage_id: stage.id.clone(),
            stage_name: stage.name.clone(),
            stage_color: stage.color.clone(),
            count: leads.iter().filter(|l| l.stage_id == stage.id).count(),
            is_won: stage.is_won,
            is_lost: stage.is_lost,
        })
        .collect();

    let won_ids: HashSet<&str> = stages
        .iter()
        .filter(|s| s.is_won)
        .map(|s| s.id.as_str())
        .collect();
    let lost_ids: HashSet<&str> = stages
        .iter()
        .filter(|s| s.is_lost)
        .map(|s| s.id.as_str())
        .collect();

    let mut won_count = 0;
    let mut lost_count = 0;
    let mut total_value = 0.0;
    let mut won_value = 0.0;
    let mut lost_value = 0.0;
    let mut open_value = 0.0;
    for lead in &leads {
        let value = lead.value.unwrap_or(0.0);
        total_value += value;
        if won_ids.contains(lead.stage_id.as_str()) {
            won_count += 1;
            won_value += value;
        } else if lost_ids.contains(lead.stage_id.as_str()) {
            lost_count += 1;
            lost_value += value;
        } else {
            open_value += value;
        }
    }
    let open_count = total_leads - won_count - lost_count;

    // Histogram over local calendar days, oldest day first, today last.
    let today = Local::now().date_naive();
    let leads_per_day: Vec<DayCount> = (0..range.days())
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let count = leads
                .iter()
                .filter(|l| local_date(&l.created_at) == Some(date))
                .count();
            DayCount {
                date: date.format("%Y-%m-%d").to_string(),
                count,
            }
        })
        .collect();

    let won_in_range = if won_ids.is_empty() {
        0
    } else {
        db.get_all_activities(workspace_id)?
            .iter()
            .filter(|a| {
                a.activity_type == "stage_changed"
                    && parse_ts(&a.created_at).is_some_and(|t| t >= start)
                    && matches!(
                        a.payload(),
                        Some(ActivityData::StageChanged(data))
                            if won_ids.contains(data.to_stage_id.as_str())
                    )
            })
            .count()
    };

    Ok(Some(DashboardMetrics {
        total_leads,
        new_leads_in_range,
        open_count,
        won_count,
        lost_count,
        total_value,
        open_value,
        won_value,
        lost_value,
        won_in_range,
        leads_by_stage,
        leads_per_day,
        pipeline: PipelineRef {
            id: pipeline.id,
            name: pipeline.name,
        },
    }))
}

/// The workspace activity feed, newest first, stamped with each lead's
/// CURRENT name and company. A lead row that vanished mid-read shows as
/// "Unknown".
pub fn get_recent_activity(
    db: &CrmDb,
    workspace_id: &str,
    limit: Option<i64>,
) -> Result<Vec<ActivityFeedItem>, CrmError> {
    let limit = limit.unwrap_or(10);
    let activities = db.get_recent_activities(workspace_id, limit)?;

    let mut leads: HashMap<String, (String, Option<String>)> = HashMap::new();
    for activity in &activities {
        if !leads.contains_key(&activity.lead_id) {
            if let Some(lead) = db.get_lead(&activity.lead_id)? {
                leads.insert(activity.lead_id.clone(), (lead.name, lead.company));
            }
        }
    }

    Ok(activities
        .into_iter()
        .map(|activity| {
            let (lead_name, lead_company) = leads
                .get(&activity.lead_id)
                .cloned()
                .unwrap_or_else(|| ("Unknown".to_string(), None));
            ActivityFeedItem {
                activity,
                lead_name,
                lead_company,
            }
        })
        .collect())
}

fn is_overdue_at(task: &DbTask, instant: chrono::DateTime<Utc>) -> bool {
    task.due_date
        .as_deref()
        .and_then(parse_ts)
        .is_some_and(|due| due < instant)
}

/// Status partition, due-window counters, and the five most pressing
/// incomplete tasks.
///
/// Overdue counting uses the start of today; the recent-task ordering
/// treats anything due before the current instant as overdue. Ties keep
/// collection order.
pub fn get_tasks_summary(db: &CrmDb, workspace_id: &str) -> Result<TasksSummary, CrmError> {
    let tasks = db.get_tasks_for_workspace(workspace_id)?;

    let now = Utc::now();
    let (today_start, today_end) = today_bounds_utc();

    let total = tasks.len();
    let todo = tasks.iter().filter(|t| t.status == TaskStatus::Todo).count();
    let in_progress = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::InProgress)
        .count();
    let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();

    let incomplete: Vec<&DbTask> = tasks.iter().filter(|t| t.status != TaskStatus::Done).collect();

    let overdue = incomplete
        .iter()
        .filter(|t| is_overdue_at(t, today_start))
        .count();
    let due_today = incomplete
        .iter()
        .filter(|t| {
            t.due_date
                .as_deref()
                .and_then(parse_ts)
                .is_some_and(|due| due >= today_start && due < today_end)
        })
        .count();
    let high_priority = incomplete
        .iter()
        .filter(|t| t.priority == TaskPriority::High)
        .count();

    let mut pressing: Vec<&DbTask> = incomplete.clone();
    pressing.sort_by(|a, b| {
        let a_high = a.priority == TaskPriority::High;
        let b_high = b.priority == TaskPriority::High;
        if a_high != b_high {
            return if a_high { Ordering::Less } else { Ordering::Greater };
        }
        let a_over = is_overdue_at(a, now);
        let b_over = is_overdue_at(b, now);
        if a_over != b_over {
            return if a_over { Ordering::Less } else { Ordering::Greater };
        }
        match (
            a.due_date.as_deref().and_then(parse_ts),
            b.due_date.as_deref().and_then(parse_ts),
        ) {
            (Some(ad), Some(bd)) => ad.cmp(&bd),
            _ => Ordering::Equal,
        }
    });

    let mut lead_names: HashMap<String, String> = HashMap::new();
    for task in pressing.iter().take(5) {
        if let Some(lead_id) = &task.lead_id {
            if !lead_names.contains_key(lead_id) {
                if let Some(lead) = db.get_lead(lead_id)? {
                    lead_names.insert(lead_id.clone(), lead.name);
                }
            }
        }
    }

    let recent_tasks = pressing
        .into_iter()
        .take(5)
        .map(|task| SummaryTask {
            task: task.clone(),
            lead_name: task
                .lead_id
                .as_ref()
                .and_then(|id| lead_names.get(id))
                .cloned(),
        })
        .collect();

    Ok(TasksSummary {
        total,
        todo,
        in_progress,
        done,
        overdue,
        due_today,
        high_priority,
        recent_tasks,
    })
}
