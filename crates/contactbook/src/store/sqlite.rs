//! `SQLite`-backed document store.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::{
    migrations, FieldMap, MutationRequest, RawDocument, RemoteStore, SnapshotEvent, Subscription,
    SubscriptionHandle,
};
use crate::error::{Error, Result};

/// Length of generated document ids.
const ID_LENGTH: usize = 20;

/// Disambiguates ids generated within the same clock tick.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Document store kept in a local `SQLite` database.
///
/// All access goes through one connection behind an async mutex. A mutation
/// and the snapshots it triggers are produced under the same lock, so every
/// subscriber sees changes in the order they were committed.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    conn: Connection,
    watchers: Vec<Watcher>,
}

#[derive(Debug)]
struct Watcher {
    collection: String,
    sender: mpsc::UnboundedSender<SnapshotEvent>,
    handle: SubscriptionHandle,
}

impl Watcher {
    fn is_live(&self) -> bool {
        !self.handle.is_cancelled() && !self.sender.is_closed()
    }
}

impl SqliteStore {
    /// Open or create a store database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Contact store opened at {}", path.display());
        Ok(Self::from_connection(path, conn))
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Ok(Self::from_connection(PathBuf::from(":memory:"), conn))
    }

    fn from_connection(path: PathBuf, conn: Connection) -> Self {
        Self {
            path,
            inner: Mutex::new(Inner {
                conn,
                watchers: Vec::new(),
            }),
        }
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of uncancelled subscriptions on a collection.
    pub async fn live_subscriptions(&self, collection: &str) -> usize {
        let inner = self.inner.lock().await;
        inner
            .watchers
            .iter()
            .filter(|w| w.collection == collection && w.is_live())
            .count()
    }

    /// Count documents in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count(&self, collection: &str) -> Result<usize> {
        let inner = self.inner.lock().await;
        let count: i64 = inner.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl Inner {
    fn fetch_all(&self, collection: &str) -> Result<Vec<RawDocument>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT id, fields FROM documents
            WHERE collection = ?1 ORDER BY seq ASC
            ",
        )?;
        let rows = stmt
            .query_map([collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, json)| match parse_fields(&json) {
                Ok(fields) => Some(RawDocument::new(id, fields)),
                Err(e) => {
                    warn!(collection, id = %id, error = %e, "Skipping unreadable document");
                    None
                }
            })
            .collect())
    }

    fn fetch_fields(&self, collection: &str, id: &str) -> Result<Option<FieldMap>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT fields FROM documents WHERE collection = ?1 AND id = ?2",
                [collection, id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| parse_fields(&j)).transpose()
    }

    /// Push the collection's current contents to every live subscriber and
    /// forget the ones that went away.
    fn publish(&mut self, collection: &str) {
        self.watchers.retain(Watcher::is_live);
        if !self.watchers.iter().any(|w| w.collection == collection) {
            return;
        }

        let snapshot = self.fetch_all(collection);
        let mut delivered = 0usize;
        for watcher in self.watchers.iter().filter(|w| w.collection == collection) {
            let event = match &snapshot {
                Ok(docs) => Ok(docs.clone()),
                Err(e) => Err(Error::subscription(collection, e.to_string())),
            };
            if watcher.sender.send(event).is_ok() {
                delivered += 1;
            }
        }
        debug!(collection, subscribers = delivered, "Published snapshot");
    }
}

fn parse_fields(json: &str) -> Result<FieldMap> {
    Ok(serde_json::from_str(json)?)
}

fn generate_id(collection: &str) -> String {
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let mut hasher = blake3::Hasher::new();
    hasher.update(collection.as_bytes());
    hasher.update(&counter.to_le_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.finalize().to_hex().as_str()[..ID_LENGTH].to_string()
}

#[async_trait::async_trait]
impl RemoteStore for SqliteStore {
    async fn subscribe(&self, collection: &str) -> Result<Subscription> {
        let mut inner = self.inner.lock().await;
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = SubscriptionHandle::new();

        let initial = inner
            .fetch_all(collection)
            .map_err(|e| Error::subscription(collection, e.to_string()));
        // The receiver is still in scope, so this cannot fail
        let _ = sender.send(initial);

        inner.watchers.retain(Watcher::is_live);
        inner.watchers.push(Watcher {
            collection: collection.to_string(),
            sender,
            handle: handle.clone(),
        });
        debug!(collection, "Subscription opened");

        Ok(Subscription::new(collection, receiver, handle))
    }

    async fn get(&self, collection: &str, id: &str) -> Result<RawDocument> {
        let inner = self.inner.lock().await;
        inner
            .fetch_fields(collection, id)?
            .map(|fields| RawDocument::new(id, fields))
            .ok_or_else(|| Error::not_found(collection, id))
    }

    async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<RawDocument>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .fetch_all(collection)?
            .into_iter()
            .filter(|doc| doc.fields.get(field) == Some(value))
            .collect())
    }

    async fn add(&self, collection: &str, fields: FieldMap) -> Result<String> {
        let mut inner = self.inner.lock().await;
        let id = generate_id(collection);
        let json = serde_json::to_string(&fields)?;

        if let Err(e) = inner.conn.execute(
            "INSERT INTO documents (collection, id, fields) VALUES (?1, ?2, ?3)",
            params![collection, id, json],
        ) {
            let request = MutationRequest::Add {
                collection: collection.to_string(),
                fields,
            };
            return Err(Error::mutation(request, e.to_string()));
        }

        debug!(collection, id = %id, "Added document");
        inner.publish(collection);
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: FieldMap) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let json = serde_json::to_string(&fields)?;

        if let Err(e) = inner.conn.execute(
            r"
            INSERT INTO documents (collection, id, fields) VALUES (?1, ?2, ?3)
            ON CONFLICT (collection, id)
            DO UPDATE SET fields = excluded.fields, updated_at = datetime('now')
            ",
            params![collection, id, json],
        ) {
            let request = MutationRequest::Set {
                collection: collection.to_string(),
                id: id.to_string(),
                fields,
            };
            return Err(Error::mutation(request, e.to_string()));
        }

        debug!(collection, id, "Set document");
        inner.publish(collection);
        Ok(())
    }

    async fn patch(&self, collection: &str, id: &str, fields: FieldMap) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let request = |fields: FieldMap| MutationRequest::Patch {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        };

        let existing = match inner.fetch_fields(collection, id) {
            Ok(Some(existing)) => existing,
            Ok(None) => return Err(Error::mutation(request(fields), "document not found")),
            Err(e) => return Err(Error::mutation(request(fields), e.to_string())),
        };

        let mut merged = existing;
        for (key, value) in &fields {
            merged.insert(key.clone(), value.clone());
        }
        let json = serde_json::to_string(&merged)?;

        if let Err(e) = inner.conn.execute(
            r"
            UPDATE documents SET fields = ?3, updated_at = datetime('now')
            WHERE collection = ?1 AND id = ?2
            ",
            params![collection, id, json],
        ) {
            return Err(Error::mutation(request(fields), e.to_string()));
        }

        debug!(collection, id, keys = fields.len(), "Patched document");
        inner.publish(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let affected = inner
            .conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                [collection, id],
            )
            .map_err(|e| {
                let request = MutationRequest::Delete {
                    collection: collection.to_string(),
                    id: id.to_string(),
                };
                Error::mutation(request, e.to_string())
            })?;

        if affected > 0 {
            debug!(collection, id, "Deleted document");
            inner.publish(collection);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONTACTS: &str = "contacts";

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("failed to create test store")
    }

    fn fields(value: serde_json::Value) -> FieldMap {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn ids(docs: &[RawDocument]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_generate_id_shape() {
        let a = generate_id(CONTACTS);
        let b = generate_id(CONTACTS);
        assert_eq!(a.len(), ID_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let store = create_test_store();
        let id = store
            .add(CONTACTS, fields(json!({"firstName": "Amy"})))
            .await
            .unwrap();

        let doc = store.get(CONTACTS, &id).await.unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.fields.get("firstName"), Some(&json!("Amy")));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = create_test_store();
        let err = store.get(CONTACTS, "nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_collections_are_separate() {
        let store = create_test_store();
        let id = store.add("other", fields(json!({"a": 1}))).await.unwrap();

        assert!(store.get(CONTACTS, &id).await.unwrap_err().is_not_found());
        assert_eq!(store.count(CONTACTS).await.unwrap(), 0);
        assert_eq!(store.count("other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_set_overwrites_every_field() {
        let store = create_test_store();
        let id = store
            .add(CONTACTS, fields(json!({"firstName": "Amy", "notes": "x"})))
            .await
            .unwrap();

        store
            .set(CONTACTS, &id, fields(json!({"firstName": "Amelia"})))
            .await
            .unwrap();

        let doc = store.get(CONTACTS, &id).await.unwrap();
        assert_eq!(doc.fields.get("firstName"), Some(&json!("Amelia")));
        assert!(!doc.fields.contains_key("notes"));
    }

    #[tokio::test]
    async fn test_set_creates_missing_document() {
        let store = create_test_store();
        store
            .set(CONTACTS, "fixed-id", fields(json!({"lastName": "Lee"})))
            .await
            .unwrap();
        assert!(store.get(CONTACTS, "fixed-id").await.is_ok());
    }

    #[tokio::test]
    async fn test_patch_merges_fields() {
        let store = create_test_store();
        let id = store
            .add(CONTACTS, fields(json!({"firstName": "Amy", "blocked": false})))
            .await
            .unwrap();

        store
            .patch(CONTACTS, &id, fields(json!({"blocked": true})))
            .await
            .unwrap();

        let doc = store.get(CONTACTS, &id).await.unwrap();
        assert_eq!(doc.fields.get("blocked"), Some(&json!(true)));
        assert_eq!(doc.fields.get("firstName"), Some(&json!("Amy")));
    }

    #[tokio::test]
    async fn test_patch_missing_document_is_a_mutation_error() {
        let store = create_test_store();
        let err = store
            .patch(CONTACTS, "ghost", fields(json!({"blocked": true})))
            .await
            .unwrap_err();

        assert!(err.is_mutation_error());
        match err.mutation_request() {
            Some(MutationRequest::Patch { id, fields, .. }) => {
                assert_eq!(id, "ghost");
                assert_eq!(fields.get("blocked"), Some(&json!(true)));
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete() {
        let store = create_test_store();
        let id = store.add(CONTACTS, FieldMap::new()).await.unwrap();

        store.delete(CONTACTS, &id).await.unwrap();
        assert!(store.get(CONTACTS, &id).await.unwrap_err().is_not_found());

        // Deleting again is not an error
        store.delete(CONTACTS, &id).await.unwrap();
    }

    #[tokio::test]
    async fn test_query_equal() {
        let store = create_test_store();
        let fav = store
            .add(CONTACTS, fields(json!({"firstName": "A", "isFavorite": true})))
            .await
            .unwrap();
        store
            .add(CONTACTS, fields(json!({"firstName": "B", "favorite": true})))
            .await
            .unwrap();
        store
            .add(CONTACTS, fields(json!({"firstName": "C", "isFavorite": false})))
            .await
            .unwrap();

        let docs = store
            .query_equal(CONTACTS, "isFavorite", &json!(true))
            .await
            .unwrap();
        assert_eq!(ids(&docs), vec![fav.as_str()]);
    }

    #[tokio::test]
    async fn test_subscribe_delivers_initial_snapshot() {
        let store = create_test_store();
        let id = store.add(CONTACTS, FieldMap::new()).await.unwrap();

        let mut sub = store.subscribe(CONTACTS).await.unwrap();
        let docs = sub.next().await.unwrap().unwrap();
        assert_eq!(ids(&docs), vec![id.as_str()]);
    }

    #[tokio::test]
    async fn test_every_mutation_pushes_a_full_snapshot() {
        let store = create_test_store();
        let mut sub = store.subscribe(CONTACTS).await.unwrap();
        assert!(sub.next().await.unwrap().unwrap().is_empty());

        let a = store.add(CONTACTS, FieldMap::new()).await.unwrap();
        let b = store.add(CONTACTS, FieldMap::new()).await.unwrap();
        store
            .set(CONTACTS, &a, fields(json!({"firstName": "Z"})))
            .await
            .unwrap();
        store.delete(CONTACTS, &b).await.unwrap();

        let snapshots: Vec<Vec<RawDocument>> = vec![
            sub.next().await.unwrap().unwrap(),
            sub.next().await.unwrap().unwrap(),
            sub.next().await.unwrap().unwrap(),
            sub.next().await.unwrap().unwrap(),
        ];
        assert_eq!(ids(&snapshots[0]), vec![a.as_str()]);
        assert_eq!(ids(&snapshots[1]), vec![a.as_str(), b.as_str()]);
        // Overwrite keeps the document's position
        assert_eq!(ids(&snapshots[2]), vec![a.as_str(), b.as_str()]);
        assert_eq!(snapshots[2][0].fields.get("firstName"), Some(&json!("Z")));
        assert_eq!(ids(&snapshots[3]), vec![a.as_str()]);
    }

    #[tokio::test]
    async fn test_other_collections_do_not_notify() {
        let store = create_test_store();
        let mut sub = store.subscribe(CONTACTS).await.unwrap();
        sub.next().await.unwrap().unwrap();

        store.add("other", FieldMap::new()).await.unwrap();
        let id = store.add(CONTACTS, FieldMap::new()).await.unwrap();

        let docs = sub.next().await.unwrap().unwrap();
        assert_eq!(ids(&docs), vec![id.as_str()]);
    }

    #[tokio::test]
    async fn test_failed_mutation_does_not_notify() {
        let store = create_test_store();
        let mut sub = store.subscribe(CONTACTS).await.unwrap();
        sub.next().await.unwrap().unwrap();

        assert!(store
            .patch(CONTACTS, "ghost", FieldMap::new())
            .await
            .is_err());
        store.delete(CONTACTS, "ghost").await.unwrap();
        let id = store.add(CONTACTS, FieldMap::new()).await.unwrap();

        let docs = sub.next().await.unwrap().unwrap();
        assert_eq!(ids(&docs), vec![id.as_str()]);
    }

    #[tokio::test]
    async fn test_cancelled_subscription_is_pruned() {
        let store = create_test_store();
        let mut first = store.subscribe(CONTACTS).await.unwrap();
        let second = store.subscribe(CONTACTS).await.unwrap();
        assert_eq!(store.live_subscriptions(CONTACTS).await, 2);

        first.cancel();
        assert_eq!(store.live_subscriptions(CONTACTS).await, 1);

        drop(second);
        assert_eq!(store.live_subscriptions(CONTACTS).await, 0);

        store.add(CONTACTS, FieldMap::new()).await.unwrap();
        assert!(first.next().await.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_rows_are_skipped() {
        let store = create_test_store();
        let good = store.add(CONTACTS, FieldMap::new()).await.unwrap();
        {
            let inner = store.inner.lock().await;
            inner
                .conn
                .execute(
                    "INSERT INTO documents (collection, id, fields) VALUES (?1, 'bad', '[1,2]')",
                    [CONTACTS],
                )
                .unwrap();
        }

        let mut sub = store.subscribe(CONTACTS).await.unwrap();
        let docs = sub.next().await.unwrap().unwrap();
        assert_eq!(ids(&docs), vec![good.as_str()]);
    }

    #[test]
    fn test_path_in_memory() {
        let store = create_test_store();
        assert_eq!(store.path().to_string_lossy(), ":memory:");
    }

    #[tokio::test]
    async fn test_open_file_based_persists() {
        let temp_dir = std::env::temp_dir();
        let nested = temp_dir.join(format!("contactbook_test_{}", std::process::id()));
        let db_path = nested.join("nested/contacts.db");
        let _ = std::fs::remove_dir_all(&nested);

        let id = {
            let store = SqliteStore::open(&db_path).unwrap();
            assert_eq!(store.path(), db_path);
            store
                .add(CONTACTS, fields(json!({"firstName": "Kept"})))
                .await
                .unwrap()
        };

        let reopened = SqliteStore::open(&db_path).unwrap();
        let doc = reopened.get(CONTACTS, &id).await.unwrap();
        assert_eq!(doc.fields.get("firstName"), Some(&json!("Kept")));

        drop(reopened);
        let _ = std::fs::remove_dir_all(&nested);
    }
}
