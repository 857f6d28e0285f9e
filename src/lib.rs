//! Pipedeck — the core engine of a small Kanban-pipeline CRM.
//!
//! Leads move through the ordered stages of a workspace's pipeline; every
//! state-changing operation appends to an immutable per-lead activity log,
//! and the dashboard (metrics, activity feed, task summary) is derived from
//! current rows plus that log. SQLite is the working store; each logical
//! mutation (lead insert + activity append + usage counter adjustment, etc.)
//! runs inside a single transaction.
//!
//! Callers thread an explicit [`Identity`] into every mutation — there is no
//! ambient session. Queries are identity-free.

pub mod db;
pub mod error;
pub mod helpers;
pub mod identity;
pub mod limits;
pub mod migrations;
pub mod queries;
pub mod services;

#[cfg(test)]
pub(crate) mod testutil;

pub use db::CrmDb;
pub use error::CrmError;
pub use identity::Identity;
pub use limits::Limits;
