//! Product limits. Exposed for display; enforced only inside mutations.

use serde::Serialize;

pub const MAX_LEADS: u32 = 1000;
pub const MAX_PIPELINES: u32 = 1;
pub const MAX_STAGES: u32 = 10;
pub const MAX_IMPORTS_PER_DAY: u32 = 3;
pub const MAX_ROWS_PER_IMPORT: u32 = 500;

/// Snapshot of the limits, returned alongside usage so the UI can render
/// "N of M" meters without hardcoding the caps.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    pub max_leads: u32,
    pub max_pipelines: u32,
    pub max_stages: u32,
    pub max_imports_per_day: u32,
    pub max_rows_per_import: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_leads: MAX_LEADS,
            max_pipelines: MAX_PIPELINES,
            max_stages: MAX_STAGES,
            max_imports_per_day: MAX_IMPORTS_PER_DAY,
            max_rows_per_import: MAX_ROWS_PER_IMPORT,
        }
    }
}
