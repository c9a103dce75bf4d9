//! Free-text contact filter.
//!
//! A contact matches when the lowercased query is a substring of its
//! lowercased full name, or when the query exactly as typed is a substring of
//! its phone number as stored. Matching keeps the input order.

use std::sync::Arc;

use tracing::trace;

use crate::contact::Contact;

/// A prepared search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryMatcher {
    raw: String,
    lowered: String,
}

impl QueryMatcher {
    /// Prepare a query. Returns `None` for an empty query, which matches
    /// everything.
    #[must_use]
    pub fn new(query: &str) -> Option<Self> {
        if query.is_empty() {
            return None;
        }
        Some(Self {
            raw: query.to_string(),
            lowered: query.to_lowercase(),
        })
    }

    /// The query as typed.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check a single contact.
    #[must_use]
    pub fn matches(&self, contact: &Contact) -> bool {
        contact.full_name().to_lowercase().contains(&self.lowered)
            || contact
                .phone_number
                .as_deref()
                .is_some_and(|phone| phone.contains(&self.raw))
    }
}

/// Filter a canonical list by a query.
///
/// An absent or empty query returns the whole list in the same order.
#[must_use]
pub fn filter_contacts(canonical: &[Arc<Contact>], query: Option<&str>) -> Vec<Arc<Contact>> {
    let Some(matcher) = query.and_then(QueryMatcher::new) else {
        return canonical.to_vec();
    };

    let filtered: Vec<_> = canonical
        .iter()
        .filter(|c| matcher.matches(c))
        .cloned()
        .collect();
    trace!(
        query = matcher.as_str(),
        total = canonical.len(),
        matched = filtered.len(),
        "Filtered contacts"
    );
    filtered
}
