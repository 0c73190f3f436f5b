//! File-backed document store.
//!
//! Layout: `<data_dir>/<collection>.json`, each holding a JSON array of
//! objects. Every mutation rewrites the full collection snapshot (via a
//! uniquely named temporary file persisted over the collection) before
//! returning. Within one process the read-modify-write of a collection is
//! serialized; separate processes sharing a directory still race, and the
//! last writer wins.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use super::{
    Document, DocumentStore, ID_ALIAS, ID_KEY, Query, StoreError, check_collection, merge_patch,
    new_document_id,
};

type CollectionLock = Arc<tokio::sync::Mutex<()>>;

/// JSON file document store.
#[derive(Debug, Clone)]
pub struct FileStore {
    data_dir: PathBuf,
    locks: Arc<Mutex<HashMap<String, CollectionLock>>>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir).await?;
        Ok(Self {
            data_dir,
            locks: Arc::default(),
        })
    }

    /// Directory holding the collection files.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path(&self, collection: &str) -> Result<PathBuf, StoreError> {
        check_collection(collection)?;
        Ok(self.data_dir.join(format!("{collection}.json")))
    }

    /// Writer lock for `collection`, shared by every clone of this store.
    fn collection_lock(&self, collection: &str) -> CollectionLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(collection.to_owned()).or_default())
    }

    async fn read_all(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let path = self.path(collection)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Value> = serde_json::from_str(&raw)?;
        values
            .into_iter()
            .map(|value| match value {
                Value::Object(doc) => Ok(doc),
                other => Err(StoreError::Corrupt {
                    collection: collection.to_owned(),
                    reason: format!("expected object, found {other}"),
                }),
            })
            .collect()
    }

    async fn write_all(&self, collection: &str, docs: &[Document]) -> Result<(), StoreError> {
        let path = self.path(collection)?;
        let dir = self.data_dir.clone();
        let body = serde_json::to_vec_pretty(docs)?;
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&body)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    fn mode(&self) -> &'static str {
        "JSON file storage"
    }

    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let docs = self.read_all(collection).await?;
        Ok(docs.into_iter().filter(|doc| query.matches(doc)).collect())
    }

    async fn insert(&self, collection: &str, mut doc: Document) -> Result<Document, StoreError> {
        let lock = self.collection_lock(collection);
        let _guard = lock.lock().await;
        let mut docs = self.read_all(collection).await?;

        let id = Value::String(new_document_id());
        doc.insert(ID_KEY.to_owned(), id.clone());
        doc.insert(ID_ALIAS.to_owned(), id);
        doc.entry("createdAt").or_insert_with(|| {
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
        });

        docs.push(doc.clone());
        self.write_all(collection, &docs).await?;
        Ok(doc)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        query: &Query,
        patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        let lock = self.collection_lock(collection);
        let _guard = lock.lock().await;
        let mut docs = self.read_all(collection).await?;
        let Some(doc) = docs.iter_mut().find(|doc| query.matches(doc)) else {
            return Ok(None);
        };
        merge_patch(doc, patch);
        let updated = doc.clone();
        self.write_all(collection, &docs).await?;
        Ok(Some(updated))
    }

    async fn delete(&self, collection: &str, query: &Query) -> Result<bool, StoreError> {
        let lock = self.collection_lock(collection);
        let _guard = lock.lock().await;
        let mut docs = self.read_all(collection).await?;
        let before = docs.len();
        docs.retain(|doc| !query.matches(doc));
        if docs.len() == before {
            return Ok(false);
        }
        self.write_all(collection, &docs).await?;
        Ok(true)
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Option<Document>, StoreError> {
        let lock = self.collection_lock(collection);
        let _guard = lock.lock().await;
        let mut docs = self.read_all(collection).await?;
        let Some(position) = docs.iter().position(|doc| query.matches(doc)) else {
            return Ok(None);
        };
        let removed = docs.remove(position);
        self.write_all(collection, &docs).await?;
        Ok(Some(removed))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        tokio::fs::metadata(&self.data_dir).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    async fn store() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_missing_collection_reads_empty() {
        let (_dir, store) = store().await;
        assert!(store.find("orders", &Query::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_assigns_id_alias_and_created_at() {
        let (_dir, store) = store().await;
        let saved = store
            .insert("contacts", doc(json!({"name": "Ana"})))
            .await
            .unwrap();

        assert_eq!(saved.get(ID_KEY), saved.get(ID_ALIAS));
        assert!(saved.get(ID_KEY).is_some());
        assert!(saved.get("createdAt").is_some());

        let found = store.find("contacts", &Query::all()).await.unwrap();
        assert_eq!(found, vec![saved]);
    }

    #[tokio::test]
    async fn test_insert_keeps_existing_created_at() {
        let (_dir, store) = store().await;
        let saved = store
            .insert("users", doc(json!({"createdAt": "2024-01-01T00:00:00.000Z"})))
            .await
            .unwrap();
        assert_eq!(saved.get("createdAt"), Some(&json!("2024-01-01T00:00:00.000Z")));
    }

    #[tokio::test]
    async fn test_update_merges_first_match_only() {
        let (_dir, store) = store().await;
        store.insert("orders", doc(json!({"userId": "u1", "n": 1}))).await.unwrap();
        store.insert("orders", doc(json!({"userId": "u1", "n": 2}))).await.unwrap();

        let updated = store
            .find_one_and_update(
                "orders",
                &Query::all().eq("userId", "u1"),
                doc(json!({"status": "accepted"})),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.get("n"), Some(&json!(1)));

        let accepted = store
            .find("orders", &Query::all().eq("status", "accepted"))
            .await
            .unwrap();
        assert_eq!(accepted.len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let (_dir, store) = store().await;
        let result = store
            .find_one_and_update("orders", &Query::by_id("nope"), Document::new())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_all_matches() {
        let (_dir, store) = store().await;
        for owner in ["u1", "u1", "u2"] {
            store.insert("contacts", doc(json!({"userId": owner}))).await.unwrap();
        }

        assert!(store.delete("contacts", &Query::all().eq("userId", "u1")).await.unwrap());
        assert!(!store.delete("contacts", &Query::all().eq("userId", "u1")).await.unwrap());
        assert_eq!(store.find("contacts", &Query::all()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_one_and_delete_returns_removed() {
        let (_dir, store) = store().await;
        let saved = store.insert("contacts", doc(json!({"name": "Ana"}))).await.unwrap();
        let id = saved.get(ID_KEY).and_then(Value::as_str).unwrap().to_owned();

        let removed = store
            .find_one_and_delete("contacts", &Query::all().eq("id", id.as_str()))
            .await
            .unwrap();
        assert_eq!(removed, Some(saved));
        assert!(store.find("contacts", &Query::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_id_returns_inserted_document() {
        let (_dir, store) = store().await;
        let db = crate::db::Db::new(Arc::new(store.clone()));
        let saved = db
            .insert("contacts", doc(json!({"name": "Ana", "phone": "555-0100"})))
            .await
            .unwrap();
        let id = saved.get(ID_ALIAS).and_then(Value::as_str).unwrap().to_owned();

        let found = db.find_by_id("contacts", &id).await.unwrap();
        assert_eq!(found, saved);
        assert_eq!(found.get("name"), Some(&json!("Ana")));
        assert_eq!(found.get(ID_ALIAS), Some(&json!(id)));
        assert!(found.get("createdAt").is_some());
        assert!(db.find_by_id("contacts", "missing").await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_inserts_are_all_kept() {
        let (dir, store) = store().await;
        let tasks: Vec<_> = (0..64)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move { store.insert("orders", doc(json!({"n": n}))).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stored = store.find("orders", &Query::all()).await.unwrap();
        assert_eq!(stored.len(), 64);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_keep_collection_readable() {
        let (_dir, store) = store().await;
        let saved = store.insert("orders", doc(json!({"n": 0}))).await.unwrap();
        let id = saved.get(ID_KEY).and_then(Value::as_str).unwrap().to_owned();

        let tasks: Vec<_> = (1..=32)
            .map(|n| {
                let store = store.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    store
                        .find_one_and_update("orders", &Query::by_id(id), doc(json!({"n": n})))
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().unwrap().is_some());
        }

        let stored = store.find("orders", &Query::all()).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_collection_is_an_error() {
        let (dir, store) = store().await;
        std::fs::write(dir.path().join("orders.json"), "{not json").unwrap();
        assert!(store.find("orders", &Query::all()).await.is_err());
    }
}
