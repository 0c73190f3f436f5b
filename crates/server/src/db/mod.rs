//! Document persistence.
//!
//! Everything the server stores is a schemaless JSON document inside a named
//! collection (`users`, `contacts`, `orders`). Two backends implement
//! [`DocumentStore`]:
//!
//! - [`file::FileStore`] - one JSON array per collection on local disk
//! - [`postgres::PgDocumentStore`] - a single `documents` table with a JSONB body
//!
//! Route handlers never talk to a backend directly. They go through the typed
//! repositories ([`UserRepository`], [`ContactRepository`], [`OrderRepository`]),
//! which sit on the [`Db`] facade. The facade applies the failure policy:
//! read failures degrade to "nothing found" and are logged, write failures
//! propagate.
//!
//! # Migrations
//!
//! The `PostgreSQL` table is created by the migrations in `crates/server/migrations/`:
//! ```bash
//! cargo run -p pizza-time-cli -- migrate
//! ```

pub mod contacts;
pub mod file;
pub mod orders;
pub mod postgres;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

pub use contacts::ContactRepository;
pub use orders::OrderRepository;
pub use users::UserRepository;

/// A stored JSON object.
pub type Document = Map<String, Value>;

/// Primary identifier key.
pub const ID_KEY: &str = "_id";
/// Compatibility alias carried alongside [`ID_KEY`].
pub const ID_ALIAS: &str = "id";

/// Every collection the gateway writes.
pub const COLLECTIONS: &[&str] = &[users::COLLECTION, contacts::COLLECTION, orders::COLLECTION];

/// Whether `key` names the document identifier.
#[must_use]
pub fn is_id_key(key: &str) -> bool {
    key == ID_KEY || key == ID_ALIAS
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error from the file store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A collection file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Collection name is not a plain identifier.
    #[error("invalid collection name: {0}")]
    InvalidCollection(String),

    /// A collection holds something other than an array of objects.
    #[error("collection {collection} is corrupt: {reason}")]
    Corrupt { collection: String, reason: String },
}

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Stored data does not match the expected shape.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate username).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Field equality filter.
///
/// Keys `_id` and `id` are interchangeable: either matches a document whose
/// `_id` or `id` equals the value. An empty query matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    fields: Vec<(String, Value)>,
}

impl Query {
    /// A query matching every document.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A query matching one identifier.
    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::all().eq(ID_KEY, id.into())
    }

    /// Add an equality constraint.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    /// Whether `doc` satisfies every constraint.
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        self.fields.iter().all(|(field, expected)| {
            if is_id_key(field) {
                doc.get(ID_KEY) == Some(expected) || doc.get(ID_ALIAS) == Some(expected)
            } else {
                doc.get(field) == Some(expected)
            }
        })
    }

    /// The identifier constraint, if any, rendered as text.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.fields
            .iter()
            .find(|(field, _)| is_id_key(field))
            .map(|(_, value)| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }

    /// Non-identifier constraints as a JSON object (for containment queries).
    #[must_use]
    pub fn field_object(&self) -> Document {
        self.fields
            .iter()
            .filter(|(field, _)| !is_id_key(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }
}

/// Uniform document-store interface shared by every backend.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Human readable backend name.
    fn mode(&self) -> &'static str;

    /// All documents matching `query`, in insertion order.
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// First document matching `query`.
    async fn find_one(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self.find(collection, query).await?.into_iter().next())
    }

    /// Store `doc` under a fresh id, stamping `createdAt` when absent.
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError>;

    /// Shallow-merge `patch` onto the first match and return the result.
    async fn find_one_and_update(
        &self,
        collection: &str,
        query: &Query,
        patch: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Remove every match. Returns whether anything was removed.
    async fn delete(&self, collection: &str, query: &Query) -> Result<bool, StoreError>;

    /// Remove the first match and return it.
    async fn find_one_and_delete(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Option<Document>, StoreError>;

    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Shared handle to the configured backend with the failure policy applied.
#[derive(Clone)]
pub struct Db {
    store: Arc<dyn DocumentStore>,
}

impl Db {
    /// Wrap a backend.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Backend name for health reporting.
    #[must_use]
    pub fn mode(&self) -> &'static str {
        self.store.mode()
    }

    /// Matching documents; empty when the backend fails.
    pub async fn find(&self, collection: &str, query: &Query) -> Vec<Document> {
        match self.store.find(collection, query).await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(collection, error = %e, "read failed, treating as empty");
                Vec::new()
            }
        }
    }

    /// First matching document; `None` when the backend fails.
    pub async fn find_one(&self, collection: &str, query: &Query) -> Option<Document> {
        match self.store.find_one(collection, query).await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(collection, error = %e, "read failed, treating as missing");
                None
            }
        }
    }

    /// Document by identifier; `None` when the backend fails.
    pub async fn find_by_id(&self, collection: &str, id: &str) -> Option<Document> {
        self.find_one(collection, &Query::by_id(id)).await
    }

    /// # Errors
    ///
    /// Propagates backend write failures.
    pub async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        self.store.insert(collection, doc).await
    }

    /// Same as [`Db::find_one_and_update`].
    ///
    /// # Errors
    ///
    /// Propagates backend write failures.
    pub async fn update(
        &self,
        collection: &str,
        query: &Query,
        patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.find_one_and_update(collection, query, patch).await
    }

    /// # Errors
    ///
    /// Propagates backend write failures.
    pub async fn find_one_and_update(
        &self,
        collection: &str,
        query: &Query,
        patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.store.find_one_and_update(collection, query, patch).await
    }

    /// # Errors
    ///
    /// Propagates backend write failures.
    pub async fn delete(&self, collection: &str, query: &Query) -> Result<bool, StoreError> {
        self.store.delete(collection, query).await
    }

    /// # Errors
    ///
    /// Propagates backend write failures.
    pub async fn find_one_and_delete(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Option<Document>, StoreError> {
        self.store.find_one_and_delete(collection, query).await
    }

    /// # Errors
    ///
    /// Returns the backend error when it is unreachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }
}

/// Fresh identifier for a new document.
#[must_use]
pub fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Shallow-merge `patch` into `doc`, ignoring identifier keys.
pub fn merge_patch(doc: &mut Document, patch: Document) {
    for (key, value) in patch {
        if !is_id_key(&key) {
            doc.insert(key, value);
        }
    }
}

/// Reject collection names that could escape the storage namespace.
///
/// # Errors
///
/// Returns [`StoreError::InvalidCollection`] unless the name is non-empty
/// ASCII alphanumerics or underscores.
pub fn check_collection(collection: &str) -> Result<(), StoreError> {
    if !collection.is_empty()
        && collection
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(collection.to_owned()))
    }
}

/// Serialize a new entity for insertion, dropping any identifier it carries.
///
/// # Errors
///
/// Returns [`RepositoryError::DataCorruption`] if the value is not a JSON object.
pub fn encode_new<T: Serialize>(value: &T) -> Result<Document, RepositoryError> {
    let mut doc = encode(value)?;
    doc.remove(ID_KEY);
    doc.remove(ID_ALIAS);
    Ok(doc)
}

/// Serialize an entity into a document.
///
/// # Errors
///
/// Returns [`RepositoryError::DataCorruption`] if the value is not a JSON object.
pub fn encode<T: Serialize>(value: &T) -> Result<Document, RepositoryError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(doc)) => Ok(doc),
        Ok(other) => Err(RepositoryError::DataCorruption(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(RepositoryError::DataCorruption(e.to_string())),
    }
}

/// Deserialize a stored document, folding `_id` into `id`.
///
/// # Errors
///
/// Returns [`RepositoryError::DataCorruption`] if the document does not match `T`.
pub fn decode<T: DeserializeOwned>(mut doc: Document) -> Result<T, RepositoryError> {
    if let Some(primary) = doc.remove(ID_KEY) {
        doc.entry(ID_ALIAS).or_insert(primary);
    }
    serde_json::from_value(Value::Object(doc))
        .map_err(|e| RepositoryError::DataCorruption(e.to_string()))
}

/// Decode every document, skipping (and logging) the ones that do not fit.
#[must_use]
pub fn decode_all<T: DeserializeOwned>(collection: &str, docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match decode(doc) {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(collection, error = %e, "skipping malformed document");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }

    #[test]
    fn test_id_keys_are_aliases() {
        let stored = doc(json!({"_id": "a1", "id": "a1", "userId": "u1"}));
        let legacy = doc(json!({"_id": "b2", "userId": "u1"}));

        assert!(Query::all().eq("id", "a1").matches(&stored));
        assert!(Query::all().eq("_id", "a1").matches(&stored));
        assert!(Query::by_id("b2").matches(&legacy));
        assert!(Query::all().eq("id", "b2").matches(&legacy));
    }

    #[test]
    fn test_empty_query_matches_all() {
        assert!(Query::all().matches(&Document::new()));
    }

    #[test]
    fn test_all_constraints_must_hold() {
        let stored = doc(json!({"_id": "a1", "userId": "u1"}));
        assert!(Query::by_id("a1").eq("userId", "u1").matches(&stored));
        assert!(!Query::by_id("a1").eq("userId", "u2").matches(&stored));
    }

    #[test]
    fn test_merge_patch_never_touches_ids() {
        let mut stored = doc(json!({"_id": "a1", "id": "a1", "name": "old"}));
        merge_patch(&mut stored, doc(json!({"id": "zzz", "name": "new", "extra": 1})));
        assert_eq!(Value::Object(stored), json!({"_id": "a1", "id": "a1", "name": "new", "extra": 1}));
    }

    #[test]
    fn test_field_object_excludes_ids() {
        let query = Query::by_id("a1").eq("userId", "u1");
        assert_eq!(query.id().as_deref(), Some("a1"));
        assert_eq!(Value::Object(query.field_object()), json!({"userId": "u1"}));
    }

    #[test]
    fn test_check_collection() {
        assert!(check_collection("orders").is_ok());
        assert!(check_collection("../etc").is_err());
        assert!(check_collection("").is_err());
    }

    #[test]
    fn test_decode_folds_primary_id() {
        #[derive(serde::Deserialize)]
        struct Row {
            id: String,
        }
        let row: Row = decode(doc(json!({"_id": "x"}))).unwrap_or(Row { id: String::new() });
        assert_eq!(row.id, "x");
    }
}
