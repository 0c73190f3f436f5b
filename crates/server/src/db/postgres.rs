//! `PostgreSQL` document store.
//!
//! # Table: `documents`
//!
//! | column       | type        | notes                              |
//! |--------------|-------------|------------------------------------|
//! | `seq`        | `BIGSERIAL` | insertion order                    |
//! | `collection` | `TEXT`      | `users`, `contacts`, `orders`      |
//! | `id`         | `TEXT`      | unique within a collection         |
//! | `body`       | `JSONB`     | full document, `_id` and `id` kept |
//!
//! Field filters become a JSONB containment test (`body @> $filter`), so they
//! use the GIN index on `body`. Single-document writes re-check the filter in
//! the same statement that changes the row, so a filter on a field acts as a
//! compare-and-set against concurrent writers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use secrecy::ExposeSecret;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;

use super::{
    Document, DocumentStore, ID_ALIAS, ID_KEY, Query, StoreError, check_collection, is_id_key,
    new_document_id,
};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// JSONB-backed document store.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Store `doc` keeping its existing identifier.
    ///
    /// Used when importing file-store collections. A document whose id is
    /// already present is left untouched; returns whether a row was written.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Corrupt` if the document has no `_id` or `id`.
    /// Returns `StoreError::Database` if the insert fails.
    pub async fn import(&self, collection: &str, mut doc: Document) -> Result<bool, StoreError> {
        check_collection(collection)?;
        let id = match doc.get(ID_KEY).or_else(|| doc.get(ID_ALIAS)) {
            Some(Value::String(id)) => id.clone(),
            Some(other) => other.to_string(),
            None => {
                return Err(StoreError::Corrupt {
                    collection: collection.to_owned(),
                    reason: "document has no identifier".to_owned(),
                });
            }
        };
        doc.insert(ID_KEY.to_owned(), Value::String(id.clone()));
        doc.insert(ID_ALIAS.to_owned(), Value::String(id.clone()));

        let result = sqlx::query(
            r"
            INSERT INTO documents (collection, id, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO NOTHING
            ",
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(doc))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn first_match_id(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Option<String>, StoreError> {
        let id = sqlx::query_scalar::<_, String>(
            r"
            SELECT id FROM documents
            WHERE collection = $1
              AND body @> $2
              AND ($3::text IS NULL OR id = $3)
            ORDER BY seq
            LIMIT 1
            ",
        )
        .bind(collection)
        .bind(Json(query.field_object()))
        .bind(query.id())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn mode(&self) -> &'static str {
        "PostgreSQL document store"
    }

    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        check_collection(collection)?;
        let rows = sqlx::query_scalar::<_, Json<Document>>(
            r"
            SELECT body FROM documents
            WHERE collection = $1
              AND body @> $2
              AND ($3::text IS NULL OR id = $3)
            ORDER BY seq
            ",
        )
        .bind(collection)
        .bind(Json(query.field_object()))
        .bind(query.id())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|Json(doc)| doc).collect())
    }

    async fn insert(&self, collection: &str, mut doc: Document) -> Result<Document, StoreError> {
        check_collection(collection)?;
        let id = new_document_id();
        doc.insert(ID_KEY.to_owned(), Value::String(id.clone()));
        doc.insert(ID_ALIAS.to_owned(), Value::String(id.clone()));
        doc.entry("createdAt").or_insert_with(|| {
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
        });

        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(&id)
            .bind(Json(&doc))
            .execute(&self.pool)
            .await?;

        Ok(doc)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        query: &Query,
        patch: Document,
    ) -> Result<Option<Document>, StoreError> {
        check_collection(collection)?;
        let Some(id) = self.first_match_id(collection, query).await? else {
            return Ok(None);
        };
        let patch: Document = patch.into_iter().filter(|(k, _)| !is_id_key(k)).collect();

        let updated = sqlx::query_scalar::<_, Json<Document>>(
            r"
            UPDATE documents
            SET body = body || $3
            WHERE collection = $1 AND id = $2 AND body @> $4
            RETURNING body
            ",
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(patch))
        .bind(Json(query.field_object()))
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated.map(|Json(doc)| doc))
    }

    async fn delete(&self, collection: &str, query: &Query) -> Result<bool, StoreError> {
        check_collection(collection)?;
        let result = sqlx::query(
            r"
            DELETE FROM documents
            WHERE collection = $1
              AND body @> $2
              AND ($3::text IS NULL OR id = $3)
            ",
        )
        .bind(collection)
        .bind(Json(query.field_object()))
        .bind(query.id())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Option<Document>, StoreError> {
        check_collection(collection)?;
        let Some(id) = self.first_match_id(collection, query).await? else {
            return Ok(None);
        };

        let removed = sqlx::query_scalar::<_, Json<Document>>(
            "DELETE FROM documents WHERE collection = $1 AND id = $2 AND body @> $3 RETURNING body",
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(query.field_object()))
        .fetch_optional(&self.pool)
        .await?;

        Ok(removed.map(|Json(doc)| doc))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
