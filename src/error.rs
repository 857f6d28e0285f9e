//! Operation-level error taxonomy.
//!
//! Every error is terminal for the call: the surrounding transaction rolls
//! back and the message is surfaced to the caller verbatim. Limit errors
//! embed the current/remaining counts so the UI can present them directly.

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("You can only delete your own notes")]
    Forbidden,

    #[error("Lead limit reached ({limit}/{limit}). Delete leads or upgrade.")]
    LeadLimitReached { limit: u32 },

    #[error("This import would exceed your lead limit ({limit}). You can import {remaining} more leads.")]
    ImportWouldExceedLeadLimit { limit: u32, remaining: i64 },

    #[error("Daily import limit reached ({limit}/day). Try again tomorrow.")]
    ImportLimitReached { limit: u32 },

    #[error("Maximum {limit} leads per import allowed.")]
    RowLimitExceeded { limit: u32 },

    #[error("Maximum of {limit} stages allowed")]
    StageLimitReached { limit: u32 },

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for CrmError {
    fn from(err: rusqlite::Error) -> Self {
        CrmError::Db(DbError::Sqlite(err))
    }
}

impl CrmError {
    /// True for the limit-enforcement variants (lead cap, import cap,
    /// row cap, stage cap).
    pub fn is_limit_error(&self) -> bool {
        matches!(
            self,
            CrmError::LeadLimitReached { .. }
                | CrmError::ImportWouldExceedLeadLimit { .. }
                | CrmError::ImportLimitReached { .. }
                | CrmError::RowLimitExceeded { .. }
                | CrmError::StageLimitReached { .. }
        )
    }
}
