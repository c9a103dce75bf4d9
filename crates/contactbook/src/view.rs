//! Live contact list view.
//!
//! [`ContactListView`] ties the pipeline together: it owns at most one
//! subscription, feeds its snapshots through the synchronizer, applies the
//! current search query, and rebuilds the sectioned display after every
//! snapshot or query change.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::filter::filter_contacts;
use crate::sections::{DisplayItem, SectionBuilder};
use crate::store::{RemoteStore, Subscription};
use crate::sync::{ContactList, ContactSynchronizer};

/// A rendered display sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayList {
    /// Headers and entries in display order.
    pub items: Vec<DisplayItem>,
    /// Hex digest identifying the content of `items`.
    pub fingerprint: String,
    /// Whether the content differs from the previously produced list.
    pub changed: bool,
}

impl DisplayList {
    /// Number of contact entries, headers excluded.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.items.iter().filter(|i| i.contact().is_some()).count()
    }

    /// Whether there is nothing to display.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Digest a display sequence, contact ids included.
///
/// # Errors
///
/// Returns an error if a contact fails to serialize.
pub fn fingerprint(items: &[DisplayItem]) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    for item in items {
        match item {
            DisplayItem::Header(label) => {
                hasher.update(b"H");
                hasher.update(label.as_bytes());
            }
            DisplayItem::Entry(contact) => {
                hasher.update(b"E");
                hasher.update(contact.id.as_bytes());
                hasher.update(b"\0");
                hasher.update(&serde_json::to_vec(contact.as_ref())?);
            }
        }
        hasher.update(b"\n");
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Drives a live, filtered and sectioned contact list.
#[derive(Debug)]
pub struct ContactListView<S> {
    store: Arc<S>,
    collection: String,
    synchronizer: ContactSynchronizer,
    builder: SectionBuilder,
    query: Option<String>,
    subscription: Option<Subscription>,
    last_fingerprint: Option<String>,
}

impl<S: RemoteStore> ContactListView<S> {
    /// Create an inactive view over a collection.
    #[must_use]
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            synchronizer: ContactSynchronizer::new(),
            builder: SectionBuilder::default(),
            query: None,
            subscription: None,
            last_fingerprint: None,
        }
    }

    /// Use a custom section builder.
    #[must_use]
    pub fn with_builder(mut self, builder: SectionBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// The collection this view watches.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The current search query, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The canonical, unfiltered list.
    #[must_use]
    pub fn canonical(&self) -> ContactList {
        self.synchronizer.canonical()
    }

    /// Whether a subscription is open.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|sub| !sub.is_cancelled())
    }

    /// Open the subscription, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store refuses the subscription. The view is
    /// left inactive in that case.
    pub async fn activate(&mut self) -> Result<()> {
        if let Some(mut previous) = self.subscription.take() {
            debug!(collection = %self.collection, "Replacing existing subscription");
            previous.cancel();
        }
        let subscription = self.store.subscribe(&self.collection).await?;
        info!(collection = %self.collection, "Contact list view activated");
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Cancel the subscription. No further updates are produced until the
    /// view is activated again.
    pub fn deactivate(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.cancel();
            info!(collection = %self.collection, "Contact list view deactivated");
        }
    }

    /// Wait for the next snapshot and rebuild the display.
    ///
    /// Returns `None` when the view is inactive or the subscription ends.
    /// A subscription error is returned as `Some(Err(_))` and leaves the
    /// last good list in place.
    pub async fn next_update(&mut self) -> Option<Result<DisplayList>> {
        let event = self.subscription.as_mut()?.next().await?;
        match self.synchronizer.apply(event) {
            Ok(_) => Some(self.rebuild()),
            Err(e) => Some(Err(e)),
        }
    }

    /// Change the search query and rebuild from the canonical list.
    ///
    /// An empty query clears the filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the display cannot be fingerprinted.
    pub fn set_query(&mut self, query: Option<&str>) -> Result<DisplayList> {
        self.query = query.filter(|q| !q.is_empty()).map(str::to_string);
        debug!(query = ?self.query, "Search query changed");
        self.rebuild()
    }

    /// The display sequence for the current state, without touching the
    /// change tracking.
    #[must_use]
    pub fn display(&self) -> Vec<DisplayItem> {
        let filtered = filter_contacts(&self.synchronizer.canonical(), self.query.as_deref());
        self.builder.build(&filtered)
    }

    fn rebuild(&mut self) -> Result<DisplayList> {
        let items = self.display();
        let fingerprint = fingerprint(&items)?;
        let changed = self.last_fingerprint.as_deref() != Some(fingerprint.as_str());
        if !changed {
            debug!("Display unchanged");
        }
        self.last_fingerprint = Some(fingerprint.clone());
        Ok(DisplayList {
            items,
            fingerprint,
            changed,
        })
    }
}
