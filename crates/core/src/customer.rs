//! Customer records held by the catalog store.
//!
//! A customer's contact details change over time; superseded values are
//! archived, never discarded. [`CustomerRecord::apply`] is the single place
//! that rule is enforced.

use serde::{Deserialize, Serialize};

use crate::address::ShippingAddress;
use crate::types::{CustomerId, IdentityUserId};

/// Postal address as stored on a customer record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Contact details to write onto a customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdate {
    pub identity_provider_id: IdentityUserId,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub address: PostalAddress,
}

impl ContactUpdate {
    /// Contact details taken from checkout shipping details.
    #[must_use]
    pub fn from_shipping(identity_provider_id: IdentityUserId, shipping: &ShippingAddress) -> Self {
        Self {
            identity_provider_id,
            name: shipping.name.clone(),
            email: shipping.email.as_str().to_owned(),
            mobile: shipping.mobile.clone(),
            address: shipping.postal(),
        }
    }
}

/// Canonical customer document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub id: CustomerId,
    #[serde(default)]
    pub identity_provider_id: Option<IdentityUserId>,
    pub name: String,
    pub email: String,
    pub mobile: String,
    #[serde(default)]
    pub current_address: Option<PostalAddress>,
    #[serde(default)]
    pub address_history: Vec<PostalAddress>,
    #[serde(default)]
    pub previous_phones: Vec<String>,
    #[serde(default)]
    pub previous_emails: Vec<String>,
}

impl CustomerRecord {
    /// A brand-new record with empty histories.
    #[must_use]
    pub fn create(id: CustomerId, update: ContactUpdate) -> Self {
        Self {
            id,
            identity_provider_id: Some(update.identity_provider_id),
            name: update.name,
            email: update.email,
            mobile: update.mobile,
            current_address: Some(update.address),
            address_history: Vec::new(),
            previous_phones: Vec::new(),
            previous_emails: Vec::new(),
        }
    }

    /// Whether the stored contact details already equal the update.
    ///
    /// Name, mobile, email and address are compared; a record that matches
    /// on those does not need to be written.
    #[must_use]
    pub fn matches(&self, update: &ContactUpdate) -> bool {
        self.name == update.name
            && self.mobile == update.mobile
            && self.email == update.email
            && self.current_address.as_ref() == Some(&update.address)
    }

    /// Apply a contact update, archiving superseded values.
    ///
    /// The record is attached to the update's identity-provider user even
    /// when it previously belonged to another one. Returns `true` if any
    /// field changed.
    pub fn apply(&mut self, update: ContactUpdate) -> bool {
        let before = self.clone();

        if self.current_address.as_ref() != Some(&update.address) {
            if let Some(previous) = self.current_address.take() {
                self.address_history.push(previous);
            }
            self.current_address = Some(update.address);
        }
        if self.mobile != update.mobile {
            let previous = std::mem::replace(&mut self.mobile, update.mobile);
            if !previous.is_empty() {
                self.previous_phones.push(previous);
            }
        }
        if self.email != update.email {
            let previous = std::mem::replace(&mut self.email, update.email);
            if !previous.is_empty() {
                self.previous_emails.push(previous);
            }
        }
        self.name = update.name;
        self.identity_provider_id = Some(update.identity_provider_id);

        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(street: &str) -> PostalAddress {
        PostalAddress {
            street: street.to_string(),
            city: "Lahore".to_string(),
            state: String::new(),
            postal_code: "54000".to_string(),
            country: "PK".to_string(),
        }
    }

    fn update(email: &str, mobile: &str, street: &str) -> ContactUpdate {
        ContactUpdate {
            identity_provider_id: IdentityUserId::new("user_1"),
            name: "Bilal Ahmed".to_string(),
            email: email.to_string(),
            mobile: mobile.to_string(),
            address: address(street),
        }
    }

    #[test]
    fn test_create_starts_with_empty_histories() {
        let record = CustomerRecord::create(
            CustomerId::new("c1"),
            update("b@example.pk", "0300-1", "1 Mall Rd"),
        );
        assert!(record.address_history.is_empty());
        assert!(record.previous_phones.is_empty());
        assert!(record.previous_emails.is_empty());
    }

    #[test]
    fn test_matching_update_changes_nothing() {
        let original = update("b@example.pk", "0300-1", "1 Mall Rd");
        let mut record = CustomerRecord::create(CustomerId::new("c1"), original.clone());
        assert!(record.matches(&original));
        assert!(!record.apply(original));
        assert!(record.address_history.is_empty());
    }

    #[test]
    fn test_name_change_is_not_a_match() {
        let original = update("b@example.pk", "0300-1", "1 Mall Rd");
        let mut record = CustomerRecord::create(CustomerId::new("c1"), original.clone());
        let mut renamed = original;
        renamed.name = "Bilal A. Khan".to_string();

        assert!(!record.matches(&renamed));
        assert!(record.apply(renamed));
        assert_eq!(record.name, "Bilal A. Khan");
    }

    #[test]
    fn test_changed_fields_are_archived() {
        let mut record = CustomerRecord::create(
            CustomerId::new("c1"),
            update("old@example.pk", "0300-1", "1 Mall Rd"),
        );
        assert!(record.apply(update("new@example.pk", "0300-2", "2 Canal Rd")));

        assert_eq!(record.email, "new@example.pk");
        assert_eq!(record.previous_emails, vec!["old@example.pk".to_string()]);
        assert_eq!(record.previous_phones, vec!["0300-1".to_string()]);
        assert_eq!(record.address_history, vec![address("1 Mall Rd")]);
        assert_eq!(record.current_address, Some(address("2 Canal Rd")));
    }

    #[test]
    fn test_histories_never_shrink_over_many_updates() {
        let mut record = CustomerRecord::create(
            CustomerId::new("c1"),
            update("e0@example.pk", "m0", "s0"),
        );
        let mut lengths = (0, 0, 0);
        for i in 1..6 {
            let email = if i % 2 == 0 { "e0@example.pk".to_string() } else { format!("e{i}@example.pk") };
            record.apply(update(&email, &format!("m{}", i % 3), &format!("s{i}")));
            let now = (
                record.address_history.len(),
                record.previous_phones.len(),
                record.previous_emails.len(),
            );
            assert!(now.0 >= lengths.0 && now.1 >= lengths.1 && now.2 >= lengths.2);
            lengths = now;
        }
        assert_eq!(record.address_history.len(), 5);
        assert_eq!(record.address_history[0], address("s0"));
    }

    #[test]
    fn test_apply_reattaches_identity() {
        let mut record = CustomerRecord::create(
            CustomerId::new("c1"),
            update("b@example.pk", "0300-1111111", "1 Mall Rd"),
        );
        record.identity_provider_id = Some(IdentityUserId::new("user_other"));
        assert!(record.apply(update("b@example.pk", "0300-1111111", "1 Mall Rd")));
        assert_eq!(
            record.identity_provider_id,
            Some(IdentityUserId::new("user_1"))
        );
    }

    #[test]
    fn test_missing_histories_deserialize_as_empty() {
        let json = r#"{"id":"c1","name":"A","email":"a@x.pk","mobile":"1"}"#;
        let record: CustomerRecord = serde_json::from_str(json).unwrap_or_else(|e| panic!("{e}"));
        assert!(record.previous_emails.is_empty());
        assert_eq!(record.current_address, None);
    }
}
