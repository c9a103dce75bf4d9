//! Single-record contact operations.
//!
//! The list view only reads. Creating, editing, deleting and blocking
//! contacts goes through [`ContactRepository`], whose writes come back to any
//! open view as a fresh snapshot.

use std::sync::Arc;

use chrono::Utc;
use image::DynamicImage;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::contact::{fields, Contact};
use crate::error::{Error, Result};
use crate::photo::{ImageCodec, JpegBase64Codec};
use crate::store::{FieldMap, RemoteStore};
use crate::sync::{decode_snapshot, sort_contacts};

/// Reads and writes individual contacts in one collection.
#[derive(Debug)]
pub struct ContactRepository<S, C = JpegBase64Codec> {
    store: Arc<S>,
    collection: String,
    codec: C,
}

impl<S: RemoteStore> ContactRepository<S> {
    /// Create a repository with the default photo codec.
    #[must_use]
    pub fn new(store: Arc<S>, collection: impl Into<String>) -> Self {
        Self::with_codec(store, collection, JpegBase64Codec::default())
    }
}

impl<S: RemoteStore, C: ImageCodec> ContactRepository<S, C> {
    /// Create a repository with a specific photo codec.
    #[must_use]
    pub fn with_codec(store: Arc<S>, collection: impl Into<String>, codec: C) -> Self {
        Self {
            store,
            collection: collection.into(),
            codec,
        }
    }

    /// The collection this repository writes to.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Fetch one contact.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the contact doesn't exist, or
    /// [`Error::Decode`] if the stored document is malformed.
    pub async fn get(&self, id: &str) -> Result<Contact> {
        let doc = self.store.get(&self.collection, id).await?;
        Contact::from_document(&doc)
    }

    /// Save a new contact and return its id.
    ///
    /// Text fields are trimmed first. On success `contact` holds the stored
    /// state, id and timestamps included; on failure it is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the contact has no name, or the
    /// store's error if the write fails.
    pub async fn create(&self, contact: &mut Contact) -> Result<String> {
        let mut draft = contact.clone();
        draft.normalize();
        draft.validate()?;

        let now = Utc::now();
        draft.created_at.get_or_insert(now);
        draft.updated_at = Some(now);

        let id = self.store.add(&self.collection, draft.to_fields()?).await?;
        info!(collection = %self.collection, id = %id, "Created contact");
        draft.id.clone_from(&id);
        *contact = draft;
        Ok(id)
    }

    /// Overwrite a stored contact with the given state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the contact has no id or no name, or
    /// the store's error if the write fails.
    pub async fn update(&self, contact: &mut Contact) -> Result<()> {
        if !contact.is_persisted() {
            return Err(Error::validation("cannot update a contact that was never saved"));
        }
        let mut draft = contact.clone();
        draft.normalize();
        draft.validate()?;
        draft.updated_at = Some(Utc::now());

        self.store
            .set(&self.collection, &draft.id, draft.to_fields()?)
            .await?;
        info!(collection = %self.collection, id = %draft.id, "Updated contact");
        *contact = draft;
        Ok(())
    }

    /// Remove a contact. Removing a missing contact succeeds.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the delete fails.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(&self.collection, id).await?;
        info!(collection = %self.collection, id = %id, "Deleted contact");
        Ok(())
    }

    /// Set the blocked flag.
    ///
    /// The flag changes on `contact` immediately and only the `blocked` field
    /// is written. If the write fails the flag is restored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unsaved contact, or the store's
    /// mutation error.
    pub async fn set_blocked(&self, contact: &mut Contact, blocked: bool) -> Result<()> {
        if !contact.is_persisted() {
            return Err(Error::validation("cannot block a contact that was never saved"));
        }

        let previous = contact.blocked;
        contact.blocked = blocked;

        let mut patch = FieldMap::new();
        patch.insert(fields::BLOCKED.to_string(), Value::Bool(blocked));
        if let Err(e) = self.store.patch(&self.collection, &contact.id, patch).await {
            contact.blocked = previous;
            warn!(id = %contact.id, error = %e, "Block change rejected, rolled back");
            return Err(e);
        }

        debug!(id = %contact.id, blocked, "Blocked flag written");
        Ok(())
    }

    /// Flip the blocked flag and return the new value.
    ///
    /// # Errors
    ///
    /// Same as [`set_blocked`](Self::set_blocked).
    pub async fn toggle_blocked(&self, contact: &mut Contact) -> Result<bool> {
        let target = !contact.blocked;
        self.set_blocked(contact, target).await?;
        Ok(target)
    }

    /// Attach a photo.
    ///
    /// The image is encoded with the repository's codec. A saved contact is
    /// written back immediately; an unsaved one keeps the photo until it is
    /// created. On failure the previous photo is kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Photo`] if encoding fails, or the error from
    /// [`update`](Self::update).
    pub async fn set_photo(&self, contact: &mut Contact, image: &DynamicImage) -> Result<()> {
        let encoded = self.codec.encode(image)?;
        let previous = contact.photo.replace(encoded);

        if contact.is_persisted() {
            if let Err(e) = self.update(contact).await {
                contact.photo = previous;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Decode a contact's photo, if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Photo`] if the stored blob is not a valid image.
    pub fn photo(&self, contact: &Contact) -> Result<Option<DynamicImage>> {
        match contact.photo.as_ref().filter(|p| !p.is_empty()) {
            Some(photo) => self.codec.decode(photo).map(Some),
            None => Ok(None),
        }
    }

    /// Contacts whose `isFavorite` field is `true`, sorted by name.
    ///
    /// Contacts that only carry the entity's own `favorite` flag are not
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the query fails.
    pub async fn favorites(&self) -> Result<Vec<Arc<Contact>>> {
        let docs = self
            .store
            .query_equal(&self.collection, fields::FAVORITES_QUERY, &Value::Bool(true))
            .await?;
        let (mut contacts, skipped) = decode_snapshot(&docs);
        sort_contacts(&mut contacts);
        debug!(found = contacts.len(), skipped, "Favorites query");
        Ok(contacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MutationRequest, RawDocument, SqliteStore, Subscription};
    use image::{GenericImageView, Rgb, RgbImage};
    use serde_json::json;

    fn fields_of(value: Value) -> FieldMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn repo() -> (Arc<SqliteStore>, ContactRepository<SqliteStore>) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let repo = ContactRepository::new(Arc::clone(&store), "contacts");
        (store, repo)
    }

    /// Wraps a real store and rejects every patch.
    #[derive(Debug)]
    struct RejectingPatches(SqliteStore);

    #[async_trait::async_trait]
    impl RemoteStore for RejectingPatches {
        async fn subscribe(&self, collection: &str) -> Result<Subscription> {
            self.0.subscribe(collection).await
        }

        async fn get(&self, collection: &str, id: &str) -> Result<RawDocument> {
            self.0.get(collection, id).await
        }

        async fn query_equal(
            &self,
            collection: &str,
            field: &str,
            value: &Value,
        ) -> Result<Vec<RawDocument>> {
            self.0.query_equal(collection, field, value).await
        }

        async fn add(&self, collection: &str, fields: FieldMap) -> Result<String> {
            self.0.add(collection, fields).await
        }

        async fn set(&self, collection: &str, id: &str, fields: FieldMap) -> Result<()> {
            self.0.set(collection, id, fields).await
        }

        async fn patch(&self, collection: &str, id: &str, fields: FieldMap) -> Result<()> {
            Err(Error::mutation(
                MutationRequest::Patch {
                    collection: collection.to_string(),
                    id: id.to_string(),
                    fields,
                },
                "permission denied",
            ))
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<()> {
            self.0.delete(collection, id).await
        }
    }

    #[tokio::test]
    async fn test_create_trims_stamps_and_assigns_id() {
        let (_store, repo) = repo();
        let mut contact = Contact::new("  Amy ", "");
        contact.phone_number = Some(" 555-1234 ".to_string());
        contact.email = Some("   ".to_string());

        let id = repo.create(&mut contact).await.unwrap();

        assert_eq!(contact.id, id);
        assert_eq!(contact.first_name.as_deref(), Some("Amy"));
        assert_eq!(contact.phone_number.as_deref(), Some("555-1234"));
        assert!(contact.email.is_none());
        assert!(contact.created_at.is_some());
        assert_eq!(contact.created_at, contact.updated_at);

        let stored = repo.get(&id).await.unwrap();
        assert_eq!(stored, contact);
    }

    #[tokio::test]
    async fn test_create_requires_a_name() {
        let (store, repo) = repo();
        let mut contact = Contact::new(" ", "");
        contact.phone_number = Some("555".to_string());

        let err = repo.create(&mut contact).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(!contact.is_persisted());
        assert_eq!(store.count("contacts").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_overwrites() {
        let (_store, repo) = repo();
        let mut contact = Contact::new("Amy", "Smith");
        contact.notes = Some("old".to_string());
        repo.create(&mut contact).await.unwrap();
        let created_at = contact.created_at;

        contact.notes = None;
        contact.last_name = Some("Jones".to_string());
        repo.update(&mut contact).await.unwrap();

        let stored = repo.get(&contact.id).await.unwrap();
        assert_eq!(stored.full_name(), "Amy Jones");
        assert!(stored.notes.is_none());
        assert_eq!(stored.created_at, created_at);
    }

    #[tokio::test]
    async fn test_update_requires_id() {
        let (_store, repo) = repo();
        let mut contact = Contact::new("Amy", "");
        assert!(matches!(
            repo.update(&mut contact).await,
            Err(Error::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_store, repo) = repo();
        let mut contact = Contact::new("Amy", "");
        let id = repo.create(&mut contact).await.unwrap();

        repo.delete(&id).await.unwrap();
        assert!(repo.get(&id).await.unwrap_err().is_not_found());
        repo.delete(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_toggle_blocked_writes_only_the_flag() {
        let (store, repo) = repo();
        let mut contact = Contact::new("Amy", "");
        repo.create(&mut contact).await.unwrap();
        let before = store.get("contacts", &contact.id).await.unwrap();

        assert!(repo.toggle_blocked(&mut contact).await.unwrap());
        assert!(contact.blocked);

        let after = store.get("contacts", &contact.id).await.unwrap();
        assert_eq!(after.fields.get("blocked"), Some(&json!(true)));
        assert_eq!(after.fields.get("updatedAt"), before.fields.get("updatedAt"));

        assert!(!repo.toggle_blocked(&mut contact).await.unwrap());
        assert!(!repo.get(&contact.id).await.unwrap().blocked);
    }

    #[tokio::test]
    async fn test_blocked_rolls_back_on_failure() {
        let inner = SqliteStore::open_in_memory().unwrap();
        let id = inner
            .add("contacts", fields_of(json!({"firstName": "Amy"})))
            .await
            .unwrap();
        let store = Arc::new(RejectingPatches(inner));
        let repo = ContactRepository::new(Arc::clone(&store), "contacts");
        let mut contact = repo.get(&id).await.unwrap();

        let err = repo.toggle_blocked(&mut contact).await.unwrap_err();

        assert!(err.is_mutation_error());
        assert!(matches!(
            err.mutation_request(),
            Some(MutationRequest::Patch { id: patched, .. }) if *patched == id
        ));
        assert!(!contact.blocked);
        assert!(!repo.get(&id).await.unwrap().blocked);
    }

    #[tokio::test]
    async fn test_block_unsaved_contact_is_rejected() {
        let (_store, repo) = repo();
        let mut contact = Contact::new("Amy", "");
        assert!(repo.set_blocked(&mut contact, true).await.is_err());
        assert!(!contact.blocked);
    }

    #[tokio::test]
    async fn test_set_photo_persists_and_decodes() {
        let (_store, repo) = repo();
        let mut contact = Contact::new("Amy", "");
        repo.create(&mut contact).await.unwrap();

        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(1024, 256, Rgb([200, 10, 10])));
        repo.set_photo(&mut contact, &image).await.unwrap();

        let stored = repo.get(&contact.id).await.unwrap();
        assert!(stored.has_photo());
        let decoded = repo.photo(&stored).unwrap().unwrap();
        assert_eq!(decoded.dimensions(), (512, 128));
    }

    #[tokio::test]
    async fn test_set_photo_on_unsaved_contact_stays_local() {
        let (store, repo) = repo();
        let mut contact = Contact::new("Amy", "");
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([0, 0, 0])));

        repo.set_photo(&mut contact, &image).await.unwrap();
        assert!(contact.has_photo());
        assert_eq!(store.count("contacts").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_photo_none_without_blob() {
        let (_store, repo) = repo();
        assert!(repo.photo(&Contact::new("Amy", "")).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_favorites_uses_is_favorite_key() {
        let (store, repo) = repo();
        for doc in [
            json!({"firstName": "zed", "isFavorite": true}),
            json!({"firstName": "Amy", "isFavorite": true}),
            json!({"firstName": "Bob", "favorite": true}),
            json!({"firstName": "Cy", "isFavorite": false}),
        ] {
            store.add("contacts", fields_of(doc)).await.unwrap();
        }

        let names: Vec<String> = repo
            .favorites()
            .await
            .unwrap()
            .iter()
            .map(|c| c.full_name())
            .collect();
        assert_eq!(names, vec!["Amy", "zed"]);
    }
}
