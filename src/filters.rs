//! Derived list filtering and sorting.
//!
//! Each view is a pure function from (full record list, criteria) to the
//! displayed subset, recomputed synchronously on every change. Predicates
//! are AND-conjoined equality/substring/threshold checks; filters preserve
//! the original relative order, and sorts are stable.

use crate::store::{Account, CompanyEvent, Prospect, Tier};

// ============================================================================
// Qualified accounts
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub min_fit_score: Option<u8>,
    pub tier: Option<Tier>,
    pub industry: Option<String>,
    /// Case-insensitive substring over name and domain.
    pub search: Option<String>,
}

pub fn filter_accounts<'a>(accounts: &'a [Account], filter: &AccountFilter) -> Vec<&'a Account> {
    accounts
        .iter()
        .filter(|account| {
            if let Some(min) = filter.min_fit_score {
                if account.fit_score < min {
                    return false;
                }
            }
            if let Some(tier) = filter.tier {
                if account.tier != Some(tier) {
                    return false;
                }
            }
            if let Some(industry) = &filter.industry {
                if account.industry.as_deref() != Some(industry.as_str()) {
                    return false;
                }
            }
            if let Some(needle) = &filter.search {
                if !contains_ci(&account.name, needle) && !contains_ci(&account.domain, needle) {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Fit score descending, name as tiebreaker.
pub fn sort_accounts_by_fit(accounts: &mut [Account]) {
    accounts.sort_by(|a, b| {
        b.fit_score
            .cmp(&a.fit_score)
            .then_with(|| a.name.cmp(&b.name))
    });
}

// ============================================================================
// Decision makers
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ProspectFilter {
    pub department: Option<String>,
    pub seniority: Option<String>,
    /// Case-insensitive substring over name and title.
    pub search: Option<String>,
}

pub fn filter_prospects<'a>(
    prospects: &'a [Prospect],
    filter: &ProspectFilter,
) -> Vec<&'a Prospect> {
    prospects
        .iter()
        .filter(|prospect| {
            if let Some(department) = &filter.department {
                if prospect.department.as_deref() != Some(department.as_str()) {
                    return false;
                }
            }
            if let Some(seniority) = &filter.seniority {
                if prospect.seniority.as_deref() != Some(seniority.as_str()) {
                    return false;
                }
            }
            if let Some(needle) = &filter.search {
                let name = prospect.full_name();
                let title = prospect.title.as_deref().unwrap_or("");
                if !contains_ci(&name, needle) && !contains_ci(title, needle) {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Role priority for decision-maker ordering: the closer to the buying
/// decision, the earlier in the list. Unknown seniorities sort last.
fn role_priority(seniority: Option<&str>) -> u8 {
    match seniority.map(|s| s.to_ascii_lowercase()).as_deref() {
        Some("c-level") | Some("founder") => 0,
        Some("vp") => 1,
        Some("director") => 2,
        Some("manager") => 3,
        Some("ic") => 4,
        _ => 5,
    }
}

pub fn sort_prospects_by_role(prospects: &mut [Prospect]) {
    prospects.sort_by(|a, b| {
        role_priority(a.seniority.as_deref())
            .cmp(&role_priority(b.seniority.as_deref()))
            .then_with(|| a.last_name.cmp(&b.last_name))
    });
}

/// Most recent contact first; never-contacted prospects go last.
pub fn sort_prospects_by_last_contact(prospects: &mut [Prospect]) {
    prospects.sort_by(|a, b| match (&b.last_contact_at, &a.last_contact_at) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

// ============================================================================
// Company events
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub event_name: Option<String>,
    /// Case-insensitive substring over company name and description.
    pub search: Option<String>,
}

pub fn filter_events<'a>(events: &'a [CompanyEvent], filter: &EventFilter) -> Vec<&'a CompanyEvent> {
    events
        .iter()
        .filter(|event| {
            if let Some(name) = &filter.event_name {
                if &event.event_name != name {
                    return false;
                }
            }
            if let Some(needle) = &filter.search {
                let description = event.description.as_deref().unwrap_or("");
                if !contains_ci(&event.company_name, needle) && !contains_ci(description, needle) {
                    return false;
                }
            }
            true
        })
        .collect()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
