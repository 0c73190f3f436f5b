//! Emergency contacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ContactId, UserId};

/// A person the account holder wants reachable.
///
/// Duplicates are allowed, and more than one contact may be flagged primary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: ContactId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body accepted when creating a contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub is_primary: bool,
}

impl NewContact {
    /// Both name and phone are present after trimming.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.phone.trim().is_empty()
    }

    /// Materialize the contact under `id`.
    #[must_use]
    pub fn into_contact(self, id: ContactId, user_id: Option<UserId>) -> Contact {
        Contact {
            id,
            user_id,
            name: self.name.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
            is_primary: self.is_primary,
            created_at: Some(Utc::now()),
        }
    }
}

/// Partial update for a contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_primary: Option<bool>,
}

impl ContactPatch {
    /// Shallow-merge onto `contact`.
    pub fn apply(self, contact: &mut Contact) {
        if let Some(name) = self.name {
            contact.name = name;
        }
        if let Some(phone) = self.phone {
            contact.phone = phone;
        }
        if let Some(is_primary) = self.is_primary {
            contact.is_primary = is_primary;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_contact_requires_name_and_phone() {
        let blank_phone = NewContact {
            name: "Ana".to_owned(),
            phone: "   ".to_owned(),
            is_primary: false,
        };
        assert!(!blank_phone.is_complete());
        assert!(!NewContact::default().is_complete());
    }

    #[test]
    fn test_is_primary_defaults_to_false() {
        let parsed: NewContact =
            serde_json::from_str(r#"{"name":"Ana","phone":"555-0100"}"#).unwrap_or_default();
        assert!(parsed.is_complete());
        assert!(!parsed.is_primary);
    }

    #[test]
    fn test_patch_merges_only_present_fields() {
        let mut contact = NewContact {
            name: "Ana".to_owned(),
            phone: "555-0100".to_owned(),
            is_primary: false,
        }
        .into_contact(ContactId::new("c-1"), None);

        ContactPatch {
            is_primary: Some(true),
            ..ContactPatch::default()
        }
        .apply(&mut contact);

        assert_eq!(contact.name, "Ana");
        assert!(contact.is_primary);
    }
}
