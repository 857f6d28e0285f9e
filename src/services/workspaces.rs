//! Workspace bootstrap, settings, and usage reporting.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{CrmDb, DbPipeline, DbStage, DbUsage, DbWorkspace};
use crate::error::CrmError;
use crate::helpers::now_rfc3339;
use crate::identity::{require_identity, Identity};
use crate::limits::Limits;

/// Seed stages for a freshly created pipeline, in board order.
const DEFAULT_STAGES: &[(&str, &str, bool, bool)] = &[
    ("New", "stone", false, false),
    ("Qualified", "blue", false, false),
    ("Proposal", "amber", false, false),
    ("Negotiation", "purple", false, false),
    ("Won", "emerald", true, false),
    ("Lost", "red", false, true),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspacePatch {
    pub name: Option<String>,
    pub currency: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub usage: DbUsage,
    pub limits: Limits,
}

/// Fetch the caller's workspace, creating it on first touch.
///
/// First touch seeds, in one transaction: the workspace, its default
/// "Sales Pipeline" with the six standard stages, and a zeroed usage row.
/// Idempotent per owner.
pub fn get_or_create_workspace(
    db: &CrmDb,
    identity: Option<&Identity>,
) -> Result<DbWorkspace, CrmError> {
    let identity = require_identity(identity)?;

    if let Some(existing) = db.get_workspace_by_owner(&identity.subject)? {
        return Ok(existing);
    }

    let workspace_name = match &identity.name {
        Some(name) => format!("{}'s Workspace", name),
        None => "My Workspace".to_string(),
    };

    db.with_transaction(|db| {
        // Another caller may have raced us before BEGIN IMMEDIATE.
        if let Some(existing) = db.get_workspace_by_owner(&identity.subject)? {
            return Ok(existing);
        }

        let now = now_rfc3339();
        let workspace = DbWorkspace {
            id: Uuid::new_v4().to_string(),
            owner_id: identity.subject.clone(),
            name: workspace_name,
            currency: None,
            timezone: None,
            created_at: now.clone(),
        };
        db.insert_workspace(&workspace)?;

        let pipeline = DbPipeline {
            id: Uuid::new_v4().to_string(),
            workspace_id: workspace.id.clone(),
            name: "Sales Pipeline".to_string(),
            is_default: true,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        db.insert_pipeline(&pipeline)?;

        for (position, (name, color, is_won, is_lost)) in DEFAULT_STAGES.iter().enumerate() {
            db.insert_stage(&DbStage {
                id: Uuid::new_v4().to_string(),
                pipeline_id: pipeline.id.clone(),
                name: name.to_string(),
                position: position as i64,
                color: Some(color.to_string()),
                is_won: *is_won,
                is_lost: *is_lost,
                created_at: now.clone(),
                updated_at: now.clone(),
            })?;
        }

        db.insert_usage(&DbUsage {
            workspace_id: workspace.id.clone(),
            lead_count: 0,
            imports_today: 0,
            last_import_date: None,
            last_updated_at: now,
        })?;

        log::info!("Created workspace {} for {}", workspace.id, identity.subject);
        Ok(workspace)
    })
}

/// The caller's workspace, if one exists. No identity means no workspace,
/// not an error.
pub fn get_current_workspace(
    db: &CrmDb,
    identity: Option<&Identity>,
) -> Result<Option<DbWorkspace>, CrmError> {
    let Some(identity) = identity else {
        return Ok(None);
    };
    Ok(db.get_workspace_by_owner(&identity.subject)?)
}

/// Update name/currency/timezone. Owner-gated: a non-owner gets the same
/// NotFound as a missing workspace.
pub fn update_workspace_settings(
    db: &CrmDb,
    identity: Option<&Identity>,
    workspace_id: &str,
    patch: &WorkspacePatch,
) -> Result<(), CrmError> {
    let identity = require_identity(identity)?;

    let workspace = db
        .get_workspace(workspace_id)?
        .filter(|ws| ws.owner_id == identity.subject)
        .ok_or(CrmError::NotFound("Workspace"))?;

    db.update_workspace_settings(
        &workspace.id,
        patch.name.as_deref(),
        patch.currency.as_deref(),
        patch.timezone.as_deref(),
    )?;
    Ok(())
}

/// Current usage counters plus the static limits, for meter display.
pub fn get_usage(db: &CrmDb, workspace_id: &str) -> Result<UsageReport, CrmError> {
    let usage = db
        .get_usage(workspace_id)?
        .ok_or(CrmError::NotFound("Usage record"))?;
    Ok(UsageReport {
        usage,
        limits: Limits::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ident, test_db};

    #[test]
    fn test_bootstrap_creates_pipeline_stages_and_usage() {
        let db = test_db();
        let ws = get_or_create_workspace(&db, Some(&ident())).unwrap();
        assert_eq!(ws.name, "Ada's Workspace");

        let pipeline = db.get_default_pipeline(&ws.id).unwrap().expect("pipeline");
        assert_eq!(pipeline.name, "Sales Pipeline");
        assert!(pipeline.is_default);

        let stages = db.get_stages_for_pipeline(&pipeline.id).unwrap();
        let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["New", "Qualified", "Proposal", "Negotiation", "Won", "Lost"]
        );
        assert!(stages[4].is_won);
        assert!(stages[5].is_lost);
        assert_eq!(stages[0].color.as_deref(), Some("stone"));

        let usage = db.get_usage(&ws.id).unwrap().expect("usage");
        assert_eq!(usage.lead_count, 0);
        assert_eq!(usage.imports_today, 0);
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let db = test_db();
        let first = get_or_create_workspace(&db, Some(&ident())).unwrap();
        let second = get_or_create_workspace(&db, Some(&ident())).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(db.count_pipelines(&first.id).unwrap(), 1);
    }

    #[test]
    fn test_bootstrap_requires_identity() {
        let db = test_db();
        let err = get_or_create_workspace(&db, None).unwrap_err();
        assert!(matches!(err, CrmError::Unauthenticated));
    }

    #[test]
    fn test_anonymous_name_fallback() {
        let db = test_db();
        let anon = Identity::new("user-2", None);
        let ws = get_or_create_workspace(&db, Some(&anon)).unwrap();
        assert_eq!(ws.name, "My Workspace");
    }

    #[test]
    fn test_current_workspace_none_for_anonymous() {
        let db = test_db();
        assert!(get_current_workspace(&db, None).unwrap().is_none());
    }

    #[test]
    fn test_settings_update_owner_gated() {
        let db = test_db();
        let ws = get_or_create_workspace(&db, Some(&ident())).unwrap();

        let stranger = Identity::new("user-9", Some("Eve"));
        let patch = WorkspacePatch {
            name: Some("Stolen".to_string()),
            ..Default::default()
        };
        let err = update_workspace_settings(&db, Some(&stranger), &ws.id, &patch).unwrap_err();
        assert!(matches!(err, CrmError::NotFound("Workspace")));

        update_workspace_settings(&db, Some(&ident()), &ws.id, &patch).unwrap();
        let updated = db.get_workspace(&ws.id).unwrap().unwrap();
        assert_eq!(updated.name, "Stolen");
    }

    #[test]
    fn test_get_usage_missing_row() {
        let db = test_db();
        let err = get_usage(&db, "nope").unwrap_err();
        assert!(matches!(err, CrmError::NotFound("Usage record")));
    }
}
