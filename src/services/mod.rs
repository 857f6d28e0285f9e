//! Service layer: the operations the host application calls.
//!
//! Mutations take an explicit `Option<&Identity>` and run inside a single
//! transaction. Queries take the ids they need and never require identity.

pub mod analytics;
pub mod leads;
pub mod lists;
pub mod notes;
pub mod pipelines;
pub mod tasks;
pub mod workspaces;
