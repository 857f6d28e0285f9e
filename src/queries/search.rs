//! Cross-workspace lead search with tiered relevance scoring.

use crate::db::{CrmDb, DbLead};
use crate::error::CrmError;

const DEFAULT_SEARCH_LIMIT: usize = 10;
const DEFAULT_RECENT_LIMIT: i64 = 5;

/// Score one lead against a lowercased query.
///
/// Each field contributes its highest matching tier: name scores
/// 100/50/25 for exact/prefix/substring, company 80/40/20, email 15 for
/// any substring hit. Field scores are summed.
fn score(lead: &DbLead, needle: &str) -> u32 {
    let mut total = 0;

    let name = lead.name.to_lowercase();
    if name == needle {
        total += 100;
    } else if name.starts_with(needle) {
        total += 50;
    } else if name.contains(needle) {
        total += 25;
    }

    if let Some(company) = &lead.company {
        let company = company.to_lowercase();
        if company == needle {
            total += 80;
        } else if company.starts_with(needle) {
            total += 40;
        } else if company.contains(needle) {
            total += 20;
        }
    }

    if let Some(email) = &lead.email {
        if email.to_lowercase().contains(needle) {
            total += 15;
        }
    }

    total
}

/// Top-scoring leads for `query`, zero scores excluded. Equal scores keep
/// their collection order.
pub fn search_leads(
    db: &CrmDb,
    workspace_id: &str,
    query: &str,
    limit: Option<usize>,
) -> Result<Vec<DbLead>, CrmError> {
    let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let needle = query.to_lowercase();

    let mut scored: Vec<(u32, DbLead)> = db
        .get_leads_by_workspace(workspace_id)?
        .into_iter()
        .filter_map(|lead| {
            let s = score(&lead, &needle);
            (s > 0).then_some((s, lead))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(scored.into_iter().take(limit).map(|(_, l)| l).collect())
}

/// Newest-created leads, for the command palette's empty-query state.
pub fn get_recent_leads(
    db: &CrmDb,
    workspace_id: &str,
    limit: Option<i64>,
) -> Result<Vec<DbLead>, CrmError> {
    Ok(db.get_recent_leads(workspace_id, limit.unwrap_or(DEFAULT_RECENT_LIMIT))?)
}
