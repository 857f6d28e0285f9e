//! Shared test fixtures.

use crate::db::{CrmDb, DbLead};
use crate::helpers::now_rfc3339;
use crate::identity::Identity;

pub(crate) fn test_db() -> CrmDb {
    CrmDb::open_in_memory().expect("in-memory db")
}

pub(crate) fn ident() -> Identity {
    Identity::new("user-1", Some("Ada"))
}

/// A minimal bare lead row, unconnected to any real pipeline.
pub(crate) fn bare_lead(id: &str, workspace_id: &str) -> DbLead {
    let now = now_rfc3339();
    DbLead {
        id: id.to_string(),
        workspace_id: workspace_id.to_string(),
        pipeline_id: "p1".to_string(),
        stage_id: "s1".to_string(),
        list_id: None,
        name: "Acme Corp".to_string(),
        company: None,
        email: None,
        phone: None,
        website: None,
        value: None,
        owner_id: None,
        tags: vec![],
        source: "manual".to_string(),
        created_at: now.clone(),
        updated_at: now.clone(),
        stage_changed_at: now,
    }
}

/// Ids of the scaffolding created by `setup_workspace`.
pub(crate) struct Fixture {
    pub workspace_id: String,
    pub pipeline_id: String,
    pub stage_ids: Vec<String>,
}

/// Bootstrap a workspace with its default pipeline and stages for the
/// identity returned by [`ident`].
pub(crate) fn setup_workspace(db: &CrmDb) -> Fixture {
    let identity = ident();
    let ws = crate::services::workspaces::get_or_create_workspace(db, Some(&identity))
        .expect("workspace bootstrap");
    let pipeline = db
        .get_default_pipeline(&ws.id)
        .expect("pipeline query")
        .expect("default pipeline");
    let stages = db
        .get_stages_for_pipeline(&pipeline.id)
        .expect("stages query");
    Fixture {
        workspace_id: ws.id,
        pipeline_id: pipeline.id,
        stage_ids: stages.into_iter().map(|s| s.id).collect(),
    }
}
