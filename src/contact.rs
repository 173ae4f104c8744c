//! Contact records and name resolution.

use serde::Serialize;
use tracing::debug;

use crate::fuzzy::{self, MatchResult};

/// Opaque per-service identity joining messages to a contact.
pub type HandleId = i64;

/// A person from the address book, with every messaging identity they own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub id: i64,
    /// Raw phone number or email address.
    pub identifier: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub handle_ids: Vec<HandleId>,
}

impl Contact {
    /// Human-readable name: "first last", then first, then the identifier.
    pub fn display_name(&self) -> String {
        match (non_blank(&self.first_name), non_blank(&self.last_name)) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.to_string(),
            _ => non_blank(&self.identifier)
                .map(str::to_string)
                .unwrap_or_else(|| "Unknown".to_string()),
        }
    }

    /// Lower-cased strings a user might refer to this contact by.
    ///
    /// First name, last name, "first last" when both exist, and the raw
    /// identifier. Blank fields contribute nothing.
    pub fn searchable_names(&self) -> Vec<String> {
        let first = non_blank(&self.first_name);
        let last = non_blank(&self.last_name);

        let mut names = Vec::with_capacity(4);
        if let Some(first) = first {
            names.push(first.to_lowercase());
        }
        if let Some(last) = last {
            names.push(last.to_lowercase());
        }
        if let (Some(first), Some(last)) = (first, last) {
            names.push(format!("{first} {last}").to_lowercase());
        }
        if let Some(id) = non_blank(&self.identifier) {
            names.push(id.to_lowercase());
        }
        names
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Resolve a name fragment to the contact it most likely refers to.
///
/// An exact (case-insensitive) name hit wins outright with score 100 and
/// skips fuzzy scoring. Otherwise every contact's names are pooled and the
/// single best fuzzy score is accepted only when strictly above `cutoff`.
pub fn resolve_contact(
    fragment: &str,
    contacts: &[Contact],
    cutoff: f64,
) -> Option<MatchResult<Contact>> {
    let query = fragment.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    let mut pool: Vec<String> = Vec::new();
    let mut owners: Vec<usize> = Vec::new();
    for (idx, contact) in contacts.iter().enumerate() {
        for name in contact.searchable_names() {
            if name == query {
                debug!(contact = contact.id, name = %name, "exact contact match");
                return Some(MatchResult {
                    entity: contact.clone(),
                    score: 100.0,
                    query,
                });
            }
            pool.push(name);
            owners.push(idx);
        }
    }

    let best = fuzzy::best_match(&query, &pool)?;
    let contact = &contacts[owners[best.index]];
    if best.score > cutoff {
        debug!(
            contact = contact.id,
            name = %pool[best.index],
            score = best.score,
            "fuzzy contact match"
        );
        Some(MatchResult {
            entity: contact.clone(),
            score: best.score,
            query,
        })
    } else {
        debug!(
            near_miss = %pool[best.index],
            score = best.score,
            cutoff,
            "no contact above cutoff"
        );
        None
    }
}

#[cfg(test)]
pub(crate) fn contact(id: i64, first: &str, last: &str, handles: &[HandleId]) -> Contact {
    let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
    Contact {
        id,
        identifier: Some(format!("+1555000{id:04}")),
        first_name: opt(first),
        last_name: opt(last),
        handle_ids: handles.to_vec(),
    }
}
