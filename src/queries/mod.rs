//! Read-only lookups for the command palette.

pub mod search;
