//! Emergency contact roster.

use std::sync::Arc;

use pizza_time_core::{Contact, ContactId, ContactPatch, NewContact};
use tracing::{instrument, warn};

use crate::api::Remote;
use crate::error::{ClientError, Result};
use crate::fallback::{Synced, remote_or_local};
use crate::observable::{Observable, Subscription};
use crate::storage::{CONTACTS_KEY, LocalStore};

/// The customer's contacts, gateway first with a local copy.
pub struct ContactRoster {
    remote: Arc<dyn Remote>,
    store: LocalStore,
    contacts: Observable<Vec<Contact>>,
}

impl ContactRoster {
    pub fn new(remote: Arc<dyn Remote>, store: LocalStore) -> Self {
        let contacts = store.load::<Vec<Contact>>(CONTACTS_KEY).unwrap_or_default();
        Self {
            remote,
            store,
            contacts: Observable::new(contacts),
        }
    }

    /// Edit under the lock, persist, then publish. Nothing changes if the
    /// edit or the write fails.
    fn commit<R>(&self, edit: impl FnOnce(&mut Vec<Contact>) -> Result<R>) -> Result<R> {
        self.contacts.try_update(|contacts| {
            let result = edit(contacts)?;
            self.store.save(CONTACTS_KEY, contacts)?;
            Ok(result)
        })
    }

    fn cache(&self, edit: impl FnOnce(&mut Vec<Contact>)) {
        self.contacts.update(|contacts| {
            edit(contacts);
            if let Err(e) = self.store.save(CONTACTS_KEY, contacts) {
                warn!(error = %e, "failed to cache contacts locally");
            }
        });
    }

    /// Fetch the gateway's list, or keep the local one when it is unreachable.
    ///
    /// # Errors
    ///
    /// Returns an error only for local failures.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Synced<Vec<Contact>>> {
        let synced =
            remote_or_local(self.remote.list_contacts(), || Ok(self.contacts.get())).await?;
        if let Synced::Remote(remote) = &synced {
            self.cache(|contacts| contacts.clone_from(remote));
        }
        Ok(synced)
    }

    /// Add a contact. Name and phone are required; duplicates are allowed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a blank name or phone, or a
    /// storage error when the local fallback cannot be saved.
    #[instrument(skip(self, contact))]
    pub async fn add(&self, contact: NewContact) -> Result<Synced<Contact>> {
        if !contact.is_complete() {
            return Err(ClientError::Validation(
                "Name and phone are required".to_owned(),
            ));
        }

        let added = remote_or_local(self.remote.create_contact(&contact), || {
            let created = contact.clone().into_contact(ContactId::generate(), None);
            self.commit(|contacts| {
                contacts.push(created.clone());
                Ok(())
            })?;
            Ok(created)
        })
        .await?;

        if let Synced::Remote(created) = &added {
            self.cache(|contacts| contacts.push(created.clone()));
        }
        Ok(added)
    }

    /// Apply `patch` to contact `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] when the contact is unknown locally
    /// and the gateway is unavailable.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &ContactId, patch: ContactPatch) -> Result<Synced<Contact>> {
        let updated = remote_or_local(self.remote.update_contact(id, &patch), || {
            self.commit(|contacts| {
                let contact = contacts
                    .iter_mut()
                    .find(|c| &c.id == id)
                    .ok_or_else(|| ClientError::NotFound("Contact".to_owned()))?;
                patch.clone().apply(contact);
                Ok(contact.clone())
            })
        })
        .await?;

        if let Synced::Remote(contact) = &updated {
            self.cache(|contacts| {
                match contacts.iter_mut().find(|c| c.id == contact.id) {
                    Some(existing) => *existing = contact.clone(),
                    None => contacts.push(contact.clone()),
                }
            });
        }
        Ok(updated)
    }

    /// Remove contact `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] when the contact is unknown locally
    /// and the gateway is unavailable.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &ContactId) -> Result<Synced<()>> {
        let removed = remote_or_local(self.remote.delete_contact(id), || {
            self.commit(|contacts| {
                let before = contacts.len();
                contacts.retain(|c| &c.id != id);
                if contacts.len() == before {
                    return Err(ClientError::NotFound("Contact".to_owned()));
                }
                Ok(())
            })
        })
        .await?;

        if removed.is_synced() {
            self.cache(|contacts| contacts.retain(|c| &c.id != id));
        }
        Ok(removed)
    }

    #[must_use]
    pub fn contacts(&self) -> Vec<Contact> {
        self.contacts.get()
    }

    /// The first contact flagged primary.
    #[must_use]
    pub fn primary(&self) -> Option<Contact> {
        self.contacts.get().into_iter().find(|c| c.is_primary)
    }

    /// Forget the local copy.
    pub(crate) fn forget(&self) {
        if let Err(e) = self.store.remove(CONTACTS_KEY) {
            warn!(error = %e, "failed to remove persisted contacts");
        }
        self.contacts.update(Vec::clear);
    }

    pub fn subscribe(&self, listener: impl Fn(&Vec<Contact>) + Send + Sync + 'static) -> Subscription {
        self.contacts.subscribe(listener)
    }
}

impl std::fmt::Debug for ContactRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactRoster")
            .field("contacts", &self.contacts.get().len())
            .finish_non_exhaustive()
    }
}
