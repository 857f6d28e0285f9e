//! Caller identity, resolved by the host application's auth layer.

use serde::{Deserialize, Serialize};

use crate::error::CrmError;

/// The authenticated caller of a mutation.
///
/// `subject` is the identity provider's stable user id; `name` is the
/// display name, used for actor attribution on activity records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub subject: String,
    pub name: Option<String>,
}

impl Identity {
    pub fn new(subject: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            subject: subject.into(),
            name: name.map(str::to_string),
        }
    }
}

/// Every mutation calls this first: no identity, no writes.
pub fn require_identity(identity: Option<&Identity>) -> Result<&Identity, CrmError> {
    identity.ok_or(CrmError::Unauthenticated)
}
