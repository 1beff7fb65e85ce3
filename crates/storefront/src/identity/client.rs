//! HTTP client for the identity provider's backend API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::instrument;

use furnimart_core::{EmailAddressId, IdentityUserId, VerificationStatus};

use super::{IdentityEmail, IdentityError, IdentityProfile, IdentityProvider, ProfileUpdate};
use crate::config::IdentityConfig;

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    primary_email_address_id: Option<String>,
    #[serde(default)]
    email_addresses: Vec<EmailAddressResponse>,
    #[serde(default)]
    phone_numbers: Vec<PhoneNumberResponse>,
}

#[derive(Debug, Deserialize)]
struct EmailAddressResponse {
    id: String,
    email_address: String,
    #[serde(default)]
    verification: Option<VerificationResponse>,
}

#[derive(Debug, Deserialize)]
struct VerificationResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct PhoneNumberResponse {
    phone_number: String,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

fn verification_status(raw: Option<&VerificationResponse>) -> VerificationStatus {
    match raw.map(|v| v.status.as_str()) {
        Some("verified") => VerificationStatus::Verified,
        Some("expired") => VerificationStatus::Expired,
        _ => VerificationStatus::Unverified,
    }
}

impl From<UserResponse> for IdentityProfile {
    fn from(user: UserResponse) -> Self {
        Self {
            user_id: IdentityUserId::new(user.id),
            first_name: user.first_name,
            last_name: user.last_name,
            primary_email_id: user.primary_email_address_id.map(EmailAddressId::new),
            emails: user
                .email_addresses
                .into_iter()
                .map(|e| IdentityEmail {
                    verification: verification_status(e.verification.as_ref()),
                    id: EmailAddressId::new(e.id),
                    address: e.email_address,
                })
                .collect(),
            phones: user.phone_numbers.into_iter().map(|p| p.phone_number).collect(),
        }
    }
}

/// Client for the identity provider.
#[derive(Clone)]
pub struct IdentityClient {
    inner: Arc<IdentityClientInner>,
}

struct IdentityClientInner {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl IdentityClient {
    /// Create a new identity client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &IdentityConfig, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner: Arc::new(IdentityClientInner {
                client,
                api_url: config.api_url.trim_end_matches('/').to_string(),
                secret_key: config.secret_key.expose_secret().to_string(),
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.inner.api_url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, IdentityError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IdentityError::InvalidSession);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, "Identity API returned non-success status");
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message: message.chars().take(500).collect(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))
    }

    fn backend(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.inner
            .client
            .request(method, self.url(path))
            .bearer_auth(&self.inner.secret_key)
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    #[instrument(skip_all)]
    async fn resolve_session(&self, session_token: &str) -> Result<IdentityProfile, IdentityError> {
        if session_token.trim().is_empty() {
            return Err(IdentityError::InvalidSession);
        }
        let request = self
            .inner
            .client
            .get(self.url("/me"))
            .bearer_auth(session_token);
        let user: UserResponse = self.send(request).await?;
        Ok(user.into())
    }

    #[instrument(skip(self, update))]
    async fn update_profile(
        &self,
        user_id: &IdentityUserId,
        update: &ProfileUpdate,
    ) -> Result<(), IdentityError> {
        let request = self
            .backend(reqwest::Method::PATCH, &format!("/users/{user_id}"))
            .json(&json!({
                "first_name": update.first_name,
                "last_name": update.last_name,
                "unsafe_metadata": update.metadata,
            }));
        let _: serde_json::Value = self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, address))]
    async fn create_email(
        &self,
        user_id: &IdentityUserId,
        address: &str,
    ) -> Result<EmailAddressId, IdentityError> {
        let request = self
            .backend(reqwest::Method::POST, "/email_addresses")
            .json(&json!({
                "user_id": user_id.as_str(),
                "email_address": address,
                "verified": false,
                "primary": false,
            }));
        let created: CreatedResponse = self.send(request).await?;
        Ok(EmailAddressId::new(created.id))
    }

    #[instrument(skip(self))]
    async fn prepare_verification(&self, email_id: &EmailAddressId) -> Result<(), IdentityError> {
        let request = self
            .backend(
                reqwest::Method::POST,
                &format!("/email_addresses/{email_id}/prepare_verification"),
            )
            .json(&json!({ "strategy": "email_code" }));
        let _: serde_json::Value = self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_primary_email(
        &self,
        user_id: &IdentityUserId,
        email_id: &EmailAddressId,
    ) -> Result<(), IdentityError> {
        let request = self
            .backend(reqwest::Method::PATCH, &format!("/users/{user_id}"))
            .json(&json!({ "primary_email_address_id": email_id.as_str() }));
        let _: serde_json::Value = self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use furnimart_core::PostalAddress;

    use crate::identity::ProfileMetadata;
    use super::*;

    fn client(server: &MockServer) -> IdentityClient {
        let config = IdentityConfig {
            api_url: server.uri(),
            secret_key: SecretString::from("sk_identity"),
        };
        IdentityClient::new(&config, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_resolve_session_maps_profile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me"))
            .and(header("authorization", "Bearer sess_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "user_1",
                "first_name": "Sana",
                "last_name": null,
                "primary_email_address_id": "idn_1",
                "email_addresses": [
                    {"id": "idn_1", "email_address": "Sana@Example.pk", "verification": {"status": "verified"}},
                    {"id": "idn_2", "email_address": "old@example.pk", "verification": null}
                ],
                "phone_numbers": [{"phone_number": "+923001111111"}]
            })))
            .mount(&server)
            .await;

        let profile = client(&server).resolve_session("sess_123").await.unwrap();
        assert_eq!(profile.user_id, IdentityUserId::new("user_1"));
        assert_eq!(
            profile.email("sana@example.pk").map(|e| e.verification),
            Some(VerificationStatus::Verified)
        );
        assert_eq!(
            profile.email("old@example.pk").map(|e| e.verification),
            Some(VerificationStatus::Unverified)
        );
        assert_eq!(profile.phones, vec!["+923001111111".to_string()]);
    }

    #[tokio::test]
    async fn test_rejected_token_is_invalid_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).resolve_session("expired").await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidSession));
    }

    #[tokio::test]
    async fn test_blank_token_never_leaves_the_process() {
        let server = MockServer::start().await;
        let err = client(&server).resolve_session("  ").await.unwrap_err();
        assert!(matches!(err, IdentityError::InvalidSession));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_profile_sends_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1/users/user_1"))
            .and(header("authorization", "Bearer sk_identity"))
            .and(body_json(json!({
                "first_name": "Sana",
                "last_name": "Malik",
                "unsafe_metadata": {
                    "address": {"street": "1 Mall Rd", "city": "Lahore", "state": "", "postalCode": "54000", "country": "PK"},
                    "phoneNumber": "0300-1111111"
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "user_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let update = ProfileUpdate {
            first_name: "Sana".to_string(),
            last_name: "Malik".to_string(),
            metadata: ProfileMetadata {
                address: PostalAddress {
                    street: "1 Mall Rd".to_string(),
                    city: "Lahore".to_string(),
                    state: String::new(),
                    postal_code: "54000".to_string(),
                    country: "PK".to_string(),
                },
                phone_number: "0300-1111111".to_string(),
            },
        };
        client(&server)
            .update_profile(&IdentityUserId::new("user_1"), &update)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_email_then_prepare_verification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/email_addresses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "idn_9"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/email_addresses/idn_9/prepare_verification"))
            .and(body_json(json!({"strategy": "email_code"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "idn_9"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let id = client
            .create_email(&IdentityUserId::new("user_1"), "new@example.pk")
            .await
            .unwrap();
        assert_eq!(id, EmailAddressId::new("idn_9"));
        client.prepare_verification(&id).await.unwrap();
    }
}
