//! Notes and the per-lead activity trail.

use uuid::Uuid;

use crate::db::{ActivityData, CrmDb, DbActivity, DbNote, NoteAddedData};
use crate::error::CrmError;
use crate::helpers::now_rfc3339;
use crate::identity::{require_identity, Identity};

pub fn get_notes_for_lead(db: &CrmDb, lead_id: &str) -> Result<Vec<DbNote>, CrmError> {
    Ok(db.get_notes_for_lead(lead_id)?)
}

pub fn get_activities_for_lead(db: &CrmDb, lead_id: &str) -> Result<Vec<DbActivity>, CrmError> {
    Ok(db.get_activities_for_lead(lead_id)?)
}

/// Attach a note to a lead. Writes the note, its `note_added` activity,
/// and the lead's updated_at bump in one transaction.
pub fn add_note(
    db: &CrmDb,
    identity: Option<&Identity>,
    lead_id: &str,
    body: &str,
) -> Result<String, CrmError> {
    let identity = require_identity(identity)?;

    db.with_transaction(|db| {
        db.get_lead(lead_id)?.ok_or(CrmError::NotFound("Lead"))?;

        let now = now_rfc3339();
        let note = DbNote {
            id: Uuid::new_v4().to_string(),
            lead_id: lead_id.to_string(),
            author_id: identity.subject.clone(),
            author_name: identity.name.clone(),
            body: body.to_string(),
            created_at: now.clone(),
        };
        db.insert_note(&note)?;

        let data = ActivityData::NoteAdded(NoteAddedData {
            note_id: note.id.clone(),
        });
        db.insert_activity(&DbActivity {
            id: Uuid::new_v4().to_string(),
            lead_id: lead_id.to_string(),
            activity_type: data.kind().to_string(),
            data: data.to_json(),
            actor_id: Some(identity.subject.clone()),
            actor_name: identity.name.clone(),
            created_at: now.clone(),
        })?;

        db.touch_lead(lead_id, &now)?;
        Ok(note.id)
    })
}

/// Delete a note. Only its author may; anyone else gets Forbidden. The
/// `note_added` activity stays in the log.
pub fn delete_note(
    db: &CrmDb,
    identity: Option<&Identity>,
    note_id: &str,
) -> Result<(), CrmError> {
    let identity = require_identity(identity)?;

    let note = db.get_note(note_id)?.ok_or(CrmError::NotFound("Note"))?;
    if note.author_id != identity.subject {
        return Err(CrmError::Forbidden);
    }
    db.delete_note_row(note_id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::leads::{create_lead, NewLead};
    use crate::testutil::{ident, setup_workspace, test_db, Fixture};

    fn seed_lead(db: &CrmDb, fx: &Fixture) -> String {
        create_lead(
            db,
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
        .unwrap()
    }

    #[test]
    fn test_add_note_writes_note_activity_and_touch() {
        let db = test_db();
        let fx = setup_workspace(&db);
        let lead_id = seed_lead(&db, &fx);
        let before = db.get_lead(&lead_id).unwrap().unwrap();

        let note_id = add_note(&db, Some(&ident()), &lead_id, "spoke on the phone").unwrap();

        let notes = db.get_notes_for_lead(&lead_id).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].author_name.as_deref(), Some("Ada"));

        let trail = db.get_activities_for_lead(&lead_id).unwrap();
        let note_added = trail
            .iter()
            .find(|a| a.activity_type == "note_added")
            .expect("note_added activity");
        assert_eq!(
            note_added.payload(),
            Some(ActivityData::NoteAdded(NoteAddedData { note_id }))
        );

        let after = db.get_lead(&lead_id).unwrap().unwrap();
        assert!(after.updated_at >= before.updated_at);
    }

    #[test]
    fn test_add_note_missing_lead() {
        let db = test_db();
        setup_workspace(&db);
        let err = add_note(&db, Some(&ident()), "ghost", "hi").unwrap_err();
        assert!(matches!(err, CrmError::NotFound("Lead")));
    }

    #[test]
    fn test_delete_note_author_gated() {
        let db = test_db();
        let fx = setup_workspace(&db);
        let lead_id = seed_lead(&db, &fx);
        let note_id = add_note(&db, Some(&ident()), &lead_id, "mine").unwrap();

        let stranger = Identity::new("user-9", Some("Eve"));
        let err = delete_note(&db, Some(&stranger), &note_id).unwrap_err();
        assert!(matches!(err, CrmError::Forbidden));

        delete_note(&db, Some(&ident()), &note_id).unwrap();
        assert!(db.get_note(&note_id).unwrap().is_none());

        // The trail keeps the note_added record.
        let trail = db.get_activities_for_lead(&lead_id).unwrap();
        assert!(trail.iter().any(|a| a.activity_type == "note_added"));
    }
}
