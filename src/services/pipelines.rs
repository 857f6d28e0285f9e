//! Pipeline and stage registry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{CrmDb, DbPipeline, DbStage};
use crate::error::CrmError;
use crate::helpers::now_rfc3339;
use crate::identity::{require_identity, Identity};
use crate::limits::MAX_STAGES;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineWithStages {
    #[serde(flatten)]
    pub pipeline: DbPipeline,
    pub stages: Vec<DbStage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub is_won: Option<bool>,
    pub is_lost: Option<bool>,
}

/// The workspace's default pipeline with its stages in board order, or
/// None for an unbootstrapped workspace.
pub fn get_pipeline_with_stages(
    db: &CrmDb,
    workspace_id: &str,
) -> Result<Option<PipelineWithStages>, CrmError> {
    let Some(pipeline) = db.get_default_pipeline(workspace_id)? else {
        return Ok(None);
    };
    let stages = db.get_stages_for_pipeline(&pipeline.id)?;
    Ok(Some(PipelineWithStages { pipeline, stages }))
}

pub fn get_stages(db: &CrmDb, pipeline_id: &str) -> Result<Vec<DbStage>, CrmError> {
    Ok(db.get_stages_for_pipeline(pipeline_id)?)
}

/// Append a stage at the end of the board. Caps at the stage limit.
pub fn create_stage(
    db: &CrmDb,
    identity: Option<&Identity>,
    pipeline_id: &str,
    name: &str,
    color: Option<&str>,
) -> Result<String, CrmError> {
    require_identity(identity)?;

    db.with_transaction(|db| {
        if db.count_stages(pipeline_id)? >= MAX_STAGES as i64 {
            return Err(CrmError::StageLimitReached { limit: MAX_STAGES });
        }

        let position = db.max_stage_position(pipeline_id)? + 1;
        let now = now_rfc3339();
        let stage = DbStage {
            id: Uuid::new_v4().to_string(),
            pipeline_id: pipeline_id.to_string(),
            name: name.to_string(),
            position,
            color: Some(color.unwrap_or("stone").to_string()),
            is_won: false,
            is_lost: false,
            created_at: now.clone(),
            updated_at: now,
        };
        db.insert_stage(&stage)?;
        Ok(stage.id)
    })
}

/// Patch name/color/flags. Never touches leads.
pub fn update_stage(
    db: &CrmDb,
    identity: Option<&Identity>,
    stage_id: &str,
    patch: &StagePatch,
) -> Result<(), CrmError> {
    require_identity(identity)?;

    let mut stage = db.get_stage(stage_id)?.ok_or(CrmError::NotFound("Stage"))?;
    if let Some(name) = &patch.name {
        stage.name = name.clone();
    }
    if let Some(color) = &patch.color {
        stage.color = Some(color.clone());
    }
    if let Some(is_won) = patch.is_won {
        stage.is_won = is_won;
    }
    if let Some(is_lost) = patch.is_lost {
        stage.is_lost = is_lost;
    }
    stage.updated_at = now_rfc3339();
    db.update_stage(&stage)?;
    Ok(())
}

/// Delete a stage, bulk-reassigning its leads to `reassign_to`. The
/// reassignment stamps lead timestamps but writes no stage_changed
/// activities.
pub fn delete_stage(
    db: &CrmDb,
    identity: Option<&Identity>,
    stage_id: &str,
    reassign_to: &str,
) -> Result<(), CrmError> {
    require_identity(identity)?;

    db.with_transaction(|db| {
        db.get_stage(stage_id)?.ok_or(CrmError::NotFound("Stage"))?;

        let now = now_rfc3339();
        let moved = db.reassign_leads_in_stage(stage_id, reassign_to, &now)?;
        db.delete_stage_row(stage_id)?;

        log::debug!("Deleted stage {}, reassigned {} leads", stage_id, moved);
        Ok(())
    })
}

/// Rewrite stage positions to match `ordered_ids` and bump the pipeline's
/// updated_at.
pub fn reorder_stages(
    db: &CrmDb,
    identity: Option<&Identity>,
    pipeline_id: &str,
    ordered_ids: &[String],
) -> Result<(), CrmError> {
    require_identity(identity)?;

    db.with_transaction(|db| {
        let now = now_rfc3339();
        for (position, stage_id) in ordered_ids.iter().enumerate() {
            db.set_stage_position(stage_id, position as i64, &now)?;
        }
        db.conn_ref().execute(
            "UPDATE pipelines SET updated_at = ?2 WHERE id = ?1",
            rusqlite::params![pipeline_id, now],
        )?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::leads::{create_lead, NewLead};
    use crate::testutil::{ident, setup_workspace, test_db};

    #[test]
    fn test_create_stage_appends_at_end() {
        let db = test_db();
        let fx = setup_workspace(&db);

        let id = create_stage(&db, Some(&ident()), &fx.pipeline_id, "Paused", None).unwrap();
        let stages = db.get_stages_for_pipeline(&fx.pipeline_id).unwrap();
        let last = stages.last().unwrap();
        assert_eq!(last.id, id);
        assert_eq!(last.position, 6);
        assert_eq!(last.color.as_deref(), Some("stone"));
        assert!(!last.is_won && !last.is_lost);
    }

    #[test]
    fn test_stage_cap_enforced() {
        let db = test_db();
        let fx = setup_workspace(&db);

        // Six defaults exist; four more reach the cap of ten.
        for i in 0..4 {
            create_stage(&db, Some(&ident()), &fx.pipeline_id, &format!("Extra {}", i), None)
                .unwrap();
        }
        let err =
            create_stage(&db, Some(&ident()), &fx.pipeline_id, "Eleventh", None).unwrap_err();
        assert!(matches!(err, CrmError::StageLimitReached { limit: 10 }));
    }

    #[test]
    fn test_delete_stage_reassigns_without_activity() {
        let db = test_db();
        let fx = setup_workspace(&db);
        let lead_id = create_lead(
            &db,
            Some(&ident()),
            &NewLead {
                workspace_id: fx.workspace_id.clone(),
                pipeline_id: fx.pipeline_id.clone(),
                stage_id: fx.stage_ids[0].clone(),
                list_id: None,
                name: "Acme".to_string(),
                company: None,
                email: None,
                phone: None,
                website: None,
                value: None,
                tags: None,
                source: None,
            },
        )
        .unwrap();
        let before = db.get_lead(&lead_id).unwrap().unwrap();

        delete_stage(&db, Some(&ident()), &fx.stage_ids[0], &fx.stage_ids[1]).unwrap();

        let lead = db.get_lead(&lead_id).unwrap().unwrap();
        assert_eq!(lead.stage_id, fx.stage_ids[1]);
        assert!(lead.stage_changed_at >= before.stage_changed_at);
        assert!(db.get_stage(&fx.stage_ids[0]).unwrap().is_none());

        // No stage_changed entry despite the move.
        let trail = db.get_activities_for_lead(&lead_id).unwrap();
        assert!(trail.iter().all(|a| a.activity_type != "stage_changed"));
    }

    #[test]
    fn test_delete_missing_stage() {
        let db = test_db();
        let fx = setup_workspace(&db);
        let err = delete_stage(&db, Some(&ident()), "ghost", &fx.stage_ids[0]).unwrap_err();
        assert!(matches!(err, CrmError::NotFound("Stage")));
    }

    #[test]
    fn test_reorder_stages() {
        let db = test_db();
        let fx = setup_workspace(&db);

        let mut reversed = fx.stage_ids.clone();
        reversed.reverse();
        reorder_stages(&db, Some(&ident()), &fx.pipeline_id, &reversed).unwrap();

        let stages = db.get_stages_for_pipeline(&fx.pipeline_id).unwrap();
        let ids: Vec<&str> = stages.iter().map(|s| s.id.as_str()).collect();
        let expected: Vec<&str> = reversed.iter().map(String::as_str).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_pipeline_with_stages_none_when_unbootstrapped() {
        let db = test_db();
        assert!(get_pipeline_with_stages(&db, "nowhere").unwrap().is_none());
    }
}
