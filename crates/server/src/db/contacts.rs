//! Emergency contact repository.
//!
//! Every operation is scoped to an owner: a contact that belongs to someone
//! else behaves exactly like one that does not exist.

use pizza_time_core::{Contact, ContactId, ContactPatch, NewContact, UserId};

use super::{Db, Query, RepositoryError, decode, decode_all, encode, encode_new};

pub const COLLECTION: &str = "contacts";

/// Repository for emergency contacts.
pub struct ContactRepository<'a> {
    db: &'a Db,
}

impl<'a> ContactRepository<'a> {
    #[must_use]
    pub const fn new(db: &'a Db) -> Self {
        Self { db }
    }

    fn owned(owner: &UserId) -> Query {
        Query::all().eq("userId", owner.as_str())
    }

    /// All contacts belonging to `owner`, in insertion order.
    pub async fn list_for_owner(&self, owner: &UserId) -> Vec<Contact> {
        let docs = self.db.find(COLLECTION, &Self::owned(owner)).await;
        decode_all(COLLECTION, docs)
    }

    /// Store a new contact for `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn create(&self, owner: &UserId, new: NewContact) -> Result<Contact, RepositoryError> {
        let contact = new.into_contact(ContactId::new(""), Some(owner.clone()));
        let saved = self.db.insert(COLLECTION, encode_new(&contact)?).await?;
        decode(saved)
    }

    /// Merge `patch` onto the owner's contact.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such contact belongs to `owner`.
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn update_for_owner(
        &self,
        owner: &UserId,
        id: &ContactId,
        patch: ContactPatch,
    ) -> Result<Contact, RepositoryError> {
        let query = Self::owned(owner).eq("id", id.as_str());
        let fields = encode(&patch)?;
        self.db
            .find_one_and_update(COLLECTION, &query, fields)
            .await?
            .map_or(Err(RepositoryError::NotFound), decode)
    }

    /// Remove the owner's contact and return it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such contact belongs to `owner`.
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn delete_for_owner(
        &self,
        owner: &UserId,
        id: &ContactId,
    ) -> Result<Contact, RepositoryError> {
        let query = Self::owned(owner).eq("id", id.as_str());
        self.db
            .find_one_and_delete(COLLECTION, &query)
            .await?
            .map_or(Err(RepositoryError::NotFound), decode)
    }

    /// Remove every contact belonging to `owner`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Store` if the write fails.
    pub async fn delete_all_for_owner(&self, owner: &UserId) -> Result<bool, RepositoryError> {
        Ok(self.db.delete(COLLECTION, &Self::owned(owner)).await?)
    }
}
