//! Canonical contact list maintained from snapshot events.
//!
//! Each snapshot replaces the whole list. Documents that don't decode are
//! logged and skipped, the rest are sorted favorites first and then by name,
//! case-insensitively. The sort is stable, so contacts that compare equal keep
//! the order the store listed them in.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::contact::Contact;
use crate::error::Result;
use crate::store::{RawDocument, SnapshotEvent};

/// An immutable, shareable list of contacts.
pub type ContactList = Arc<[Arc<Contact>]>;

/// Holds the canonical, sorted contact list.
#[derive(Debug)]
pub struct ContactSynchronizer {
    canonical: ContactList,
    skipped: usize,
}

impl Default for ContactSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactSynchronizer {
    /// Create a synchronizer with an empty canonical list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            canonical: Arc::from(Vec::new()),
            skipped: 0,
        }
    }

    /// The current canonical list.
    #[must_use]
    pub fn canonical(&self) -> ContactList {
        Arc::clone(&self.canonical)
    }

    /// Number of documents skipped from the last applied snapshot.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Replace the canonical list with the contents of a snapshot.
    pub fn on_snapshot(&mut self, docs: &[RawDocument]) -> ContactList {
        let (mut contacts, skipped) = decode_snapshot(docs);
        sort_contacts(&mut contacts);

        debug!(
            received = docs.len(),
            kept = contacts.len(),
            skipped,
            "Applied snapshot"
        );
        self.canonical = Arc::from(contacts);
        self.skipped = skipped;
        self.canonical()
    }

    /// Apply one subscription event.
    ///
    /// # Errors
    ///
    /// Returns the subscription error unchanged. The canonical list is left
    /// exactly as it was.
    pub fn apply(&mut self, event: SnapshotEvent) -> Result<ContactList> {
        match event {
            Ok(docs) => Ok(self.on_snapshot(&docs)),
            Err(e) => {
                error!(error = %e, kept = self.canonical.len(), "Snapshot failed, keeping last list");
                Err(e)
            }
        }
    }
}

/// Decode every document, returning the contacts and the number skipped.
#[must_use]
pub fn decode_snapshot(docs: &[RawDocument]) -> (Vec<Arc<Contact>>, usize) {
    let mut skipped = 0;
    let contacts = docs
        .iter()
        .filter_map(|doc| match Contact::from_document(doc) {
            Ok(contact) => Some(Arc::new(contact)),
            Err(e) => {
                warn!(id = %doc.id, error = %e, "Skipping contact that failed to decode");
                skipped += 1;
                None
            }
        })
        .collect();
    (contacts, skipped)
}

/// Sort favorites first, then by lowercased full name. Stable.
pub fn sort_contacts(contacts: &mut [Arc<Contact>]) {
    contacts.sort_by_cached_key(|c| (!c.favorite, c.full_name().to_lowercase()));
}
