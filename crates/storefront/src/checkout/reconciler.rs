//! Keeps the catalog customer record and the identity profile in step with
//! the shipping details entered at checkout.

use tracing::instrument;

use furnimart_core::{ContactUpdate, CustomerRecord, ShippingAddress, VerificationStatus};

use super::CheckoutError;
use crate::catalog::CatalogStore;
use crate::config::CustomerMatchPolicy;
use crate::identity::{IdentityProfile, IdentityProvider, ProfileMetadata, ProfileUpdate};

pub const VERIFICATION_SENT: &str =
    "A verification email has been sent to your inbox. Please verify your email to proceed.";
pub const EMAIL_NOT_VERIFIED: &str =
    "Your email is not verified. A verification email has been sent to your inbox.";

/// Outcome of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The customer record is current and the shipping email is verified.
    Synced(CustomerRecord),
    /// The shopper must verify their email before checkout can finish.
    NotYetSynced { message: &'static str },
}

pub struct IdentityReconciler<'a> {
    catalog: &'a dyn CatalogStore,
    identity: &'a dyn IdentityProvider,
    policy: CustomerMatchPolicy,
}

impl<'a> IdentityReconciler<'a> {
    #[must_use]
    pub fn new(
        catalog: &'a dyn CatalogStore,
        identity: &'a dyn IdentityProvider,
        policy: CustomerMatchPolicy,
    ) -> Self {
        Self {
            catalog,
            identity,
            policy,
        }
    }

    /// Bring the customer record and identity profile in line with `address`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Catalog`] or [`CheckoutError::Identity`] when
    /// a collaborator call fails.
    #[instrument(skip_all, fields(user_id = %profile.user_id))]
    pub async fn reconcile(
        &self,
        profile: &IdentityProfile,
        address: &ShippingAddress,
    ) -> Result<Reconciliation, CheckoutError> {
        let update = ContactUpdate::from_shipping(profile.user_id.clone(), address);
        let record = self.upsert_customer(update).await?;

        let (first_name, last_name) = address.split_name();
        self.identity
            .update_profile(
                &profile.user_id,
                &ProfileUpdate {
                    first_name: first_name.to_owned(),
                    last_name: last_name.to_owned(),
                    metadata: ProfileMetadata {
                        address: address.postal(),
                        phone_number: address.mobile.clone(),
                    },
                },
            )
            .await?;

        if let Some(message) = self.check_email(profile, address).await? {
            tracing::info!(customer_id = %record.id, "Email awaiting verification");
            return Ok(Reconciliation::NotYetSynced { message });
        }
        Ok(Reconciliation::Synced(record))
    }

    async fn find_customer(
        &self,
        update: &ContactUpdate,
    ) -> Result<Option<CustomerRecord>, CheckoutError> {
        if self.policy == CustomerMatchPolicy::MobileFirst
            && !update.mobile.is_empty()
            && let Some(record) = self.catalog.find_customer_by_mobile(&update.mobile).await?
        {
            return Ok(Some(record));
        }
        Ok(self
            .catalog
            .find_customer_by_identity(&update.identity_provider_id)
            .await?)
    }

    async fn upsert_customer(&self, update: ContactUpdate) -> Result<CustomerRecord, CheckoutError> {
        let Some(mut record) = self.find_customer(&update).await? else {
            let record = self.catalog.create_customer(update).await?;
            tracing::info!(customer_id = %record.id, "Customer created");
            return Ok(record);
        };

        let same_identity =
            record.identity_provider_id.as_ref() == Some(&update.identity_provider_id);
        if same_identity && record.matches(&update) {
            tracing::debug!(customer_id = %record.id, "Customer already up to date");
            return Ok(record);
        }

        if !same_identity {
            tracing::info!(customer_id = %record.id, "Attaching customer to signed-in identity");
        }
        record.apply(update);
        self.catalog.save_customer(&record).await?;
        Ok(record)
    }

    /// `Some(message)` when checkout must wait for email verification.
    async fn check_email(
        &self,
        profile: &IdentityProfile,
        address: &ShippingAddress,
    ) -> Result<Option<&'static str>, CheckoutError> {
        let Some(email) = profile.email(address.email.as_str()) else {
            let email_id = self
                .identity
                .create_email(&profile.user_id, address.email.as_str())
                .await?;
            self.identity.prepare_verification(&email_id).await?;
            return Ok(Some(VERIFICATION_SENT));
        };

        if email.verification != VerificationStatus::Verified {
            self.identity.prepare_verification(&email.id).await?;
            return Ok(Some(EMAIL_NOT_VERIFIED));
        }

        if profile.primary_email_id.as_ref() != Some(&email.id) {
            self.identity
                .set_primary_email(&profile.user_id, &email.id)
                .await?;
        }
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use furnimart_core::{CustomerId, Email, EmailAddressId, IdentityUserId, PostalAddress};

    use super::*;
    use crate::checkout::memory::{InMemoryCatalog, InMemoryIdentity};

    fn shipping() -> ShippingAddress {
        ShippingAddress {
            name: "Sana Malik".to_string(),
            email: Email::parse("sana@example.pk").unwrap(),
            mobile: "0300-1111111".to_string(),
            street: "1 Mall Rd".to_string(),
            city: "Lahore".to_string(),
            state: None,
            postal_code: "54000".to_string(),
            country: "PK".to_string(),
        }
    }

    fn stored(id: &str, identity: &str, street: &str) -> CustomerRecord {
        CustomerRecord {
            id: CustomerId::new(id),
            identity_provider_id: Some(IdentityUserId::new(identity)),
            name: "Sana Malik".to_string(),
            email: "sana@example.pk".to_string(),
            mobile: "0300-1111111".to_string(),
            current_address: Some(PostalAddress {
                street: street.to_string(),
                city: "Lahore".to_string(),
                state: String::new(),
                postal_code: "54000".to_string(),
                country: "PK".to_string(),
            }),
            address_history: Vec::new(),
            previous_phones: Vec::new(),
            previous_emails: Vec::new(),
        }
    }

    fn verified_identity(user: &str) -> InMemoryIdentity {
        InMemoryIdentity::new().with_user(user, "sana@example.pk", VerificationStatus::Verified)
    }

    async fn profile(identity: &InMemoryIdentity, token: &str) -> IdentityProfile {
        identity.resolve_session(token).await.unwrap()
    }

    #[tokio::test]
    async fn test_mobile_match_attaches_session_identity() {
        let catalog = InMemoryCatalog::new().with_customer(stored("user-1", "user_old", "1 Mall Rd"));
        let identity = verified_identity("user_new");
        let reconciler =
            IdentityReconciler::new(&catalog, &identity, CustomerMatchPolicy::MobileFirst);

        let outcome = reconciler
            .reconcile(&profile(&identity, "user_new").await, &shipping())
            .await
            .unwrap();

        let Reconciliation::Synced(record) = outcome else {
            panic!("expected synced record");
        };
        assert_eq!(record.id, CustomerId::new("user-1"));
        assert_eq!(record.identity_provider_id, Some(IdentityUserId::new("user_new")));
        assert_eq!(catalog.customers()[0].identity_provider_id, record.identity_provider_id);
        assert_eq!(catalog.customers().len(), 1);
    }

    #[tokio::test]
    async fn test_provider_id_only_ignores_mobile_match() {
        let catalog = InMemoryCatalog::new().with_customer(stored("user-1", "user_old", "1 Mall Rd"));
        let identity = verified_identity("user_new");
        let reconciler =
            IdentityReconciler::new(&catalog, &identity, CustomerMatchPolicy::ProviderIdOnly);

        reconciler
            .reconcile(&profile(&identity, "user_new").await, &shipping())
            .await
            .unwrap();

        assert_eq!(catalog.customers().len(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_record_is_not_written() {
        let catalog = InMemoryCatalog::new().with_customer(stored("user-1", "user_a", "1 Mall Rd"));
        let identity = verified_identity("user_a");
        let reconciler =
            IdentityReconciler::new(&catalog, &identity, CustomerMatchPolicy::MobileFirst);

        reconciler
            .reconcile(&profile(&identity, "user_a").await, &shipping())
            .await
            .unwrap();

        assert_eq!(catalog.customer_writes(), 0);
    }

    #[tokio::test]
    async fn test_renamed_shopper_is_written() {
        let mut record = stored("user-1", "user_a", "1 Mall Rd");
        record.name = "Sana M.".to_string();
        let catalog = InMemoryCatalog::new().with_customer(record);
        let identity = verified_identity("user_a");
        let reconciler =
            IdentityReconciler::new(&catalog, &identity, CustomerMatchPolicy::MobileFirst);

        reconciler
            .reconcile(&profile(&identity, "user_a").await, &shipping())
            .await
            .unwrap();

        assert_eq!(catalog.customer_writes(), 1);
        assert_eq!(catalog.customers()[0].name, "Sana Malik");
    }

    #[tokio::test]
    async fn test_changed_address_is_archived() {
        let catalog = InMemoryCatalog::new().with_customer(stored("user-1", "user_a", "9 Old St"));
        let identity = verified_identity("user_a");
        let reconciler =
            IdentityReconciler::new(&catalog, &identity, CustomerMatchPolicy::MobileFirst);

        reconciler
            .reconcile(&profile(&identity, "user_a").await, &shipping())
            .await
            .unwrap();

        let saved = &catalog.customers()[0];
        assert_eq!(saved.address_history.len(), 1);
        assert_eq!(saved.address_history[0].street, "9 Old St");
        assert_eq!(saved.current_address.as_ref().unwrap().street, "1 Mall Rd");
        assert_eq!(catalog.customer_writes(), 1);
    }

    #[tokio::test]
    async fn test_profile_gets_split_name_and_metadata() {
        let catalog = InMemoryCatalog::new();
        let identity = verified_identity("user_a");
        let reconciler =
            IdentityReconciler::new(&catalog, &identity, CustomerMatchPolicy::MobileFirst);

        reconciler
            .reconcile(&profile(&identity, "user_a").await, &shipping())
            .await
            .unwrap();

        let update = identity.last_profile_update().unwrap();
        assert_eq!(update.first_name, "Sana");
        assert_eq!(update.last_name, "Malik");
        assert_eq!(update.metadata.phone_number, "0300-1111111");
        assert_eq!(update.metadata.address.street, "1 Mall Rd");
    }

    #[tokio::test]
    async fn test_new_email_is_added_and_challenged() {
        let catalog = InMemoryCatalog::new();
        let identity =
            InMemoryIdentity::new().with_user("user_a", "other@example.pk", VerificationStatus::Verified);
        let reconciler =
            IdentityReconciler::new(&catalog, &identity, CustomerMatchPolicy::MobileFirst);

        let outcome = reconciler
            .reconcile(&profile(&identity, "user_a").await, &shipping())
            .await
            .unwrap();

        assert_eq!(outcome, Reconciliation::NotYetSynced { message: VERIFICATION_SENT });
        assert_eq!(identity.verifications_sent(), 1);
    }

    #[tokio::test]
    async fn test_unverified_email_is_rechallenged() {
        let catalog = InMemoryCatalog::new();
        let identity = InMemoryIdentity::new().with_user(
            "user_a",
            "sana@example.pk",
            VerificationStatus::Unverified,
        );
        let reconciler =
            IdentityReconciler::new(&catalog, &identity, CustomerMatchPolicy::MobileFirst);

        let outcome = reconciler
            .reconcile(&profile(&identity, "user_a").await, &shipping())
            .await
            .unwrap();

        assert_eq!(outcome, Reconciliation::NotYetSynced { message: EMAIL_NOT_VERIFIED });
        assert_eq!(identity.verifications_sent(), 1);
    }

    #[tokio::test]
    async fn test_verified_secondary_email_becomes_primary() {
        let catalog = InMemoryCatalog::new();
        let identity = InMemoryIdentity::new()
            .with_user("user_a", "first@example.pk", VerificationStatus::Verified)
            .with_email("user_a", "sana@example.pk", VerificationStatus::Verified);
        let reconciler =
            IdentityReconciler::new(&catalog, &identity, CustomerMatchPolicy::MobileFirst);

        let before = profile(&identity, "user_a").await;
        let secondary: EmailAddressId = before.email("sana@example.pk").unwrap().id.clone();
        assert_ne!(before.primary_email_id.as_ref(), Some(&secondary));

        let outcome = reconciler.reconcile(&before, &shipping()).await.unwrap();

        assert!(matches!(outcome, Reconciliation::Synced(_)));
        let after = profile(&identity, "user_a").await;
        assert_eq!(after.primary_email_id, Some(secondary));
    }
}
