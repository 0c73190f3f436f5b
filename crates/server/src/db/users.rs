//! User repository.
//!
//! Usernames are stored lowercased and are unique. The password hash never
//! leaves this layer except through [`StoredUser::password_hash`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pizza_time_core::{PublicUser, UserId};

use super::{Db, Query, RepositoryError, decode, encode_new};

pub const COLLECTION: &str = "users";

/// A user record as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    pub id: UserId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub password_hash: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl StoredUser {
    /// The client-safe view of this user.
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewUserRecord<'a> {
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    password_hash: &'a str,
    created_at: DateTime<Utc>,
}

/// Repository for user records.
pub struct UserRepository<'a> {
    db: &'a Db,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Get a user by (lowercased) username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored record is malformed.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<StoredUser>, RepositoryError> {
        self.db
            .find_one(COLLECTION, &Query::all().eq("username", username))
            .await
            .map(decode)
            .transpose()
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored record is malformed.
    pub async fn get_by_id(&self, id: &UserId) -> Result<Option<StoredUser>, RepositoryError> {
        self.db
            .find_by_id(COLLECTION, id.as_str())
            .await
            .map(decode)
            .transpose()
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username is taken.
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn create(
        &self,
        username: &str,
        email: Option<&str>,
        password_hash: &str,
    ) -> Result<StoredUser, RepositoryError> {
        if self.get_by_username(username).await?.is_some() {
            return Err(RepositoryError::Conflict(format!(
                "username {username} already exists"
            )));
        }

        let record = encode_new(&NewUserRecord {
            username,
            email,
            password_hash,
            created_at: Utc::now(),
        })?;
        let saved = self.db.insert(COLLECTION, record).await?;
        decode(saved)
    }

    /// Delete a user by ID. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn delete(&self, id: &UserId) -> Result<bool, RepositoryError> {
        Ok(self.db.delete(COLLECTION, &Query::by_id(id.as_str())).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::db::file::FileStore;

    async fn db() -> (tempfile::TempDir, Db) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        (dir, Db::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let (_dir, db) = db().await;
        let users = UserRepository::new(&db);

        let created = users.create("ana", Some("ana@example.com"), "hash").await.unwrap();
        let by_name = users.get_by_username("ana").await.unwrap().unwrap();
        let by_id = users.get_by_id(&created.id).await.unwrap().unwrap();

        assert_eq!(by_name.id, created.id);
        assert_eq!(by_id.username, "ana");
        assert_eq!(by_id.to_public().email.as_deref(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let (_dir, db) = db().await;
        let users = UserRepository::new(&db);
        users.create("ana", None, "hash").await.unwrap();

        let err = users.create("ana", None, "other").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete() {
        let (_dir, db) = db().await;
        let users = UserRepository::new(&db);
        let created = users.create("ana", None, "hash").await.unwrap();

        assert!(users.delete(&created.id).await.unwrap());
        assert!(users.get_by_id(&created.id).await.unwrap().is_none());
    }
}
