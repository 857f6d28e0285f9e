//! Row structs and shared db-layer types.
//!
//! Booleans are stored as INTEGER 0/1, tags as a JSON array in a TEXT
//! column. All structs serialize camelCase for frontend consumption.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Migration failed: {0}")]
    Migration(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbWorkspace {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub currency: Option<String>,
    pub timezone: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbPipeline {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub is_default: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbStage {
    pub id: String,
    pub pipeline_id: String,
    pub name: String,
    pub position: i64,
    pub color: Option<String>,
    pub is_won: bool,
    pub is_lost: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbList {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbLead {
    pub id: String,
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
    pub owner_id: Option<String>,
    pub tags: Vec<String>,
    pub source: String,
    pub created_at: String,
    pub updated_at: String,
    pub stage_changed_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbNote {
    pub id: String,
    pub lead_id: String,
    pub author_id: String,
    pub author_name: Option<String>,
    pub body: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbActivity {
    pub id: String,
    pub lead_id: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub data: Option<String>,
    pub actor_id: Option<String>,
    pub actor_name: Option<String>,
    pub created_at: String,
}

impl DbActivity {
    /// Decode the typed payload, if the row carries one and it parses.
    pub fn payload(&self) -> Option<ActivityData> {
        ActivityData::parse(&self.activity_type, self.data.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbUsage {
    pub workspace_id: String,
    pub lead_count: i64,
    pub imports_today: i64,
    pub last_import_date: Option<String>,
    pub last_updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbTask {
    pub id: String,
    pub workspace_id: String,
    pub lead_id: Option<String>,
    pub list_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<String>,
    pub completed_at: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "in_progress" => TaskStatus::InProgress,
            "done" => TaskStatus::Done,
            _ => TaskStatus::Todo,
        }
    }

    /// Next status in the todo -> in_progress -> done -> todo cycle.
    pub fn next(&self) -> Self {
        match self {
            TaskStatus::Todo => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Todo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "high" => TaskPriority::High,
            "low" => TaskPriority::Low,
            _ => TaskPriority::Medium,
        }
    }

    /// Sort rank, high first.
    pub fn rank(&self) -> u8 {
        match self {
            TaskPriority::High => 0,
            TaskPriority::Medium => 1,
            TaskPriority::Low => 2,
        }
    }
}

/// Typed activity payloads, one variant per activity type.
///
/// The `created` variant serializes to NULL when the source is absent;
/// every other variant always carries a JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityData {
    Created(CreatedData),
    StageChanged(StageChangedData),
    ValueChanged(ValueChangedData),
    NoteAdded(NoteAddedData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreatedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageChangedData {
    pub from_stage_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_stage_name: Option<String>,
    pub to_stage_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_stage_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChangedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_value: Option<f64>,
    pub to_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteAddedData {
    pub note_id: String,
}

impl ActivityData {
    /// The `type` column value for this payload.
    pub fn kind(&self) -> &'static str {
        match self {
            ActivityData::Created(_) => "created",
            ActivityData::StageChanged(_) => "stage_changed",
            ActivityData::ValueChanged(_) => "value_changed",
            ActivityData::NoteAdded(_) => "note_added",
        }
    }

    /// The `data` column value. `created` with no source stores NULL.
    pub fn to_json(&self) -> Option<String> {
        match self {
            ActivityData::Created(d) => {
                d.source.as_ref()?;
                serde_json::to_string(d).ok()
            }
            ActivityData::StageChanged(d) => serde_json::to_string(d).ok(),
            ActivityData::ValueChanged(d) => serde_json::to_string(d).ok(),
            ActivityData::NoteAdded(d) => serde_json::to_string(d).ok(),
        }
    }

    /// Decode a stored (type, data) pair. Unknown types and malformed
    /// payloads return None rather than failing the read.
    pub fn parse(kind: &str, data: Option<&str>) -> Option<Self> {
        match kind {
            "created" => {
                let inner = match data {
                    Some(raw) => serde_json::from_str(raw).ok()?,
                    None => CreatedData::default(),
                };
                Some(ActivityData::Created(inner))
            }
            "stage_changed" => {
                serde_json::from_str(data?).ok().map(ActivityData::StageChanged)
            }
            "value_changed" => {
                serde_json::from_str(data?).ok().map(ActivityData::ValueChanged)
            }
            "note_added" => serde_json::from_str(data?).ok().map(ActivityData::NoteAdded),
            _ => None,
        }
    }
}

/// Decode a tags column. Malformed JSON reads as an empty list.
pub(crate) fn parse_tags(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Encode tags for storage.
pub(crate) fn tags_to_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}
