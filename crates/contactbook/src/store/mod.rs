//! Document store abstraction.
//!
//! Contacts live in a document store: collections of field maps keyed by a
//! store-assigned identifier. [`RemoteStore`] is the seam the rest of the
//! crate talks to; [`SqliteStore`] is the bundled backend.
//!
//! Live updates are delivered through a [`Subscription`]. Every event carries
//! the complete current contents of the collection, never a diff, and events
//! for one subscription arrive in the order the store produced them.

pub mod migrations;
pub mod schema;
mod sqlite;

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::Result;

pub use sqlite::SqliteStore;

/// The field map of a single document.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// A document as it comes out of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Store-assigned identifier.
    pub id: String,
    /// The document's fields.
    pub fields: FieldMap,
}

impl RawDocument {
    /// Create a document from an id and its fields.
    #[must_use]
    pub fn new(id: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// One event on a live subscription.
///
/// `Ok` carries the full collection; `Err` is a transport or permission
/// failure.
pub type SnapshotEvent = Result<Vec<RawDocument>>;

/// A write that was sent to the store.
///
/// Carried inside mutation errors so callers can undo optimistic changes.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRequest {
    /// Create a document with a generated id.
    Add {
        /// Target collection.
        collection: String,
        /// Fields of the new document.
        fields: FieldMap,
    },
    /// Overwrite a document completely.
    Set {
        /// Target collection.
        collection: String,
        /// Document id.
        id: String,
        /// Replacement fields.
        fields: FieldMap,
    },
    /// Update selected fields of an existing document.
    Patch {
        /// Target collection.
        collection: String,
        /// Document id.
        id: String,
        /// Fields to change.
        fields: FieldMap,
    },
    /// Remove a document.
    Delete {
        /// Target collection.
        collection: String,
        /// Document id.
        id: String,
    },
}

impl MutationRequest {
    /// The collection this request targets.
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Add { collection, .. }
            | Self::Set { collection, .. }
            | Self::Patch { collection, .. }
            | Self::Delete { collection, .. } => collection,
        }
    }

    /// The document id, if the request names one.
    #[must_use]
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Self::Add { .. } => None,
            Self::Set { id, .. } | Self::Patch { id, .. } | Self::Delete { id, .. } => Some(id),
        }
    }
}

impl fmt::Display for MutationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add { collection, .. } => write!(f, "add to {collection}"),
            Self::Set { collection, id, .. } => write!(f, "set {collection}/{id}"),
            Self::Patch { collection, id, .. } => write!(f, "patch {collection}/{id}"),
            Self::Delete { collection, id } => write!(f, "delete {collection}/{id}"),
        }
    }
}

/// A cloneable cancellation handle for a [`Subscription`].
#[derive(Debug, Clone, Default)]
pub struct SubscriptionHandle {
    token: CancellationToken,
}

impl SubscriptionHandle {
    /// Create a new, live handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the subscription. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the subscription is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// A scoped live query on one collection.
///
/// Dropping the subscription cancels it. After cancellation [`next`] returns
/// `None`, even if events were already queued.
///
/// [`next`]: Subscription::next
#[derive(Debug)]
pub struct Subscription {
    collection: String,
    receiver: mpsc::UnboundedReceiver<SnapshotEvent>,
    handle: SubscriptionHandle,
}

impl Subscription {
    /// Build a subscription from the receiving end of a store channel.
    ///
    /// The store keeps the matching sender and a clone of `handle`, and must
    /// stop sending once the handle is cancelled.
    #[must_use]
    pub fn new(
        collection: impl Into<String>,
        receiver: mpsc::UnboundedReceiver<SnapshotEvent>,
        handle: SubscriptionHandle,
    ) -> Self {
        Self {
            collection: collection.into(),
            receiver,
            handle,
        }
    }

    /// The collection being watched.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// A handle that can cancel this subscription from elsewhere.
    #[must_use]
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    /// Check if the subscription has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Wait for the next snapshot event.
    ///
    /// Returns `None` once cancelled or when the store has closed the channel.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        if self.handle.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            () = self.handle.token.cancelled() => None,
            event = self.receiver.recv() => {
                if self.handle.is_cancelled() {
                    None
                } else {
                    event
                }
            }
        }
    }

    /// Cancel the subscription and discard queued events.
    pub fn cancel(&mut self) {
        if !self.handle.is_cancelled() {
            debug!(collection = %self.collection, "Cancelling subscription");
        }
        self.handle.cancel();
        self.receiver.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

/// The operations the contact core needs from a document backend.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Open a live subscription on a collection.
    ///
    /// The first event is the collection's current contents; another full
    /// snapshot follows every change.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    async fn subscribe(&self, collection: &str) -> Result<Subscription>;

    /// Fetch one document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if no such document exists.
    async fn get(&self, collection: &str, id: &str) -> Result<RawDocument>;

    /// Fetch the documents whose `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<RawDocument>>;

    /// Create a document and return its generated id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Mutation`] if the write is rejected.
    async fn add(&self, collection: &str, fields: FieldMap) -> Result<String>;

    /// Overwrite a document, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Mutation`] if the write is rejected.
    async fn set(&self, collection: &str, id: &str, fields: FieldMap) -> Result<()>;

    /// Update selected fields of an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Mutation`] if the document is missing or the
    /// write is rejected.
    async fn patch(&self, collection: &str, id: &str, fields: FieldMap) -> Result<()>;

    /// Remove a document. Removing a missing document succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Mutation`] if the delete is rejected.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}
