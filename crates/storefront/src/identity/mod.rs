//! Identity provider: signed-in shopper profiles and email verification.

mod client;

pub use client::IdentityClient;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use furnimart_core::{EmailAddressId, IdentityUserId, PostalAddress, VerificationStatus};

/// Errors that can occur when talking to the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The session token is missing, expired or revoked.
    #[error("Identity session is not valid")]
    InvalidSession,

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// An email address attached to an identity profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityEmail {
    pub id: EmailAddressId,
    pub address: String,
    pub verification: VerificationStatus,
}

/// The signed-in user behind a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProfile {
    pub user_id: IdentityUserId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub primary_email_id: Option<EmailAddressId>,
    pub emails: Vec<IdentityEmail>,
    pub phones: Vec<String>,
}

impl IdentityProfile {
    /// The profile's entry for `address`, compared case-insensitively.
    #[must_use]
    pub fn email(&self, address: &str) -> Option<&IdentityEmail> {
        self.emails
            .iter()
            .find(|e| e.address.eq_ignore_ascii_case(address))
    }
}

/// Shipping contact details mirrored onto the profile's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    pub address: PostalAddress,
    pub phone_number: String,
}

/// Name and metadata written to the profile after a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub metadata: ProfileMetadata,
}

/// Operations checkout needs from the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a session token to its user's profile.
    async fn resolve_session(&self, session_token: &str) -> Result<IdentityProfile, IdentityError>;

    async fn update_profile(
        &self,
        user_id: &IdentityUserId,
        update: &ProfileUpdate,
    ) -> Result<(), IdentityError>;

    /// Attach a new, unverified email address to the user.
    async fn create_email(
        &self,
        user_id: &IdentityUserId,
        address: &str,
    ) -> Result<EmailAddressId, IdentityError>;

    /// Send a one-time verification code to the address.
    async fn prepare_verification(&self, email_id: &EmailAddressId) -> Result<(), IdentityError>;

    async fn set_primary_email(
        &self,
        user_id: &IdentityUserId,
        email_id: &EmailAddressId,
    ) -> Result<(), IdentityError>;
}
