//! HTTP client for the payment processor's payment-intents API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;

use furnimart_core::{Money, PaymentOutcome, TransactionId};

use super::{CaptureRequest, PaymentError, PaymentProcessor};
use crate::config::PaymentsConfig;

#[derive(Debug, Deserialize)]
struct PaymentIntent {
    id: String,
    status: String,
    #[serde(default)]
    last_payment_error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    payment_intent: Option<IntentRef>,
}

#[derive(Debug, Deserialize)]
struct IntentRef {
    id: String,
}

/// Client for the payment processor.
#[derive(Clone)]
pub struct PaymentsClient {
    inner: Arc<PaymentsClientInner>,
}

struct PaymentsClientInner {
    client: reqwest::Client,
    intents_url: String,
    secret_key: String,
    currency: String,
}

impl PaymentsClient {
    /// Create a new payments client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PaymentsConfig, timeout: Duration) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            inner: Arc::new(PaymentsClientInner {
                client,
                intents_url: format!("{}/v1/payment_intents", config.api_url.trim_end_matches('/')),
                secret_key: config.secret_key.expose_secret().to_string(),
                currency: config.currency.clone(),
            }),
        })
    }
}

#[async_trait]
impl PaymentProcessor for PaymentsClient {
    #[instrument(skip(self, request), fields(amount = %request.amount, idempotency_key = %request.idempotency_key))]
    async fn capture(&self, request: &CaptureRequest) -> Result<PaymentOutcome, PaymentError> {
        let minor_units = Money::new(request.amount, &self.inner.currency).to_minor_units()?;

        let form = [
            ("amount", minor_units.to_string()),
            ("currency", self.inner.currency.clone()),
            ("payment_method", request.payment_method.clone()),
            ("description", request.description.clone()),
            ("confirm", "true".to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("automatic_payment_methods[allow_redirects]", "never".to_string()),
        ];

        let response = self
            .inner
            .client
            .post(&self.inner.intents_url)
            .bearer_auth(&self.inner.secret_key)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let intent: PaymentIntent =
                serde_json::from_str(&body).map_err(|e| PaymentError::Parse(e.to_string()))?;
            let transaction_id = TransactionId::new(intent.id);

            return Ok(if intent.status == "succeeded" {
                tracing::info!(transaction_id = %transaction_id, "Payment captured");
                PaymentOutcome::success(transaction_id, request.amount)
            } else {
                let reason = intent
                    .last_payment_error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| format!("Payment was not completed (status: {})", intent.status));
                tracing::warn!(transaction_id = %transaction_id, status = %intent.status, "Payment not completed");
                PaymentOutcome::declined(transaction_id, request.amount, reason)
            });
        }

        let envelope: Option<ErrorEnvelope> = serde_json::from_str(&body).ok();
        match envelope {
            // Card declines come back as 402 with a card_error body.
            Some(ErrorEnvelope { error })
                if status == StatusCode::PAYMENT_REQUIRED
                    || error.kind.as_deref() == Some("card_error") =>
            {
                let transaction_id =
                    TransactionId::new(error.payment_intent.map(|p| p.id).unwrap_or_default());
                let reason = error
                    .message
                    .unwrap_or_else(|| "Your card was declined.".to_string());
                tracing::warn!(reason = %reason, "Payment declined");
                Ok(PaymentOutcome::declined(transaction_id, request.amount, reason))
            }
            Some(ErrorEnvelope { error }) => Err(PaymentError::Api {
                status: status.as_u16(),
                message: error.message.unwrap_or_default(),
            }),
            None => Err(PaymentError::Api {
                status: status.as_u16(),
                message: body.chars().take(500).collect(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> PaymentsClient {
        let config = PaymentsConfig {
            api_url: server.uri(),
            secret_key: SecretString::from("sk_test_payments"),
            currency: "usd".to_string(),
        };
        PaymentsClient::new(&config, Duration::from_secs(5)).unwrap()
    }

    fn request(amount: Decimal) -> CaptureRequest {
        CaptureRequest {
            amount,
            payment_method: "pm_card_visa".to_string(),
            idempotency_key: "checkout-abc-capture-1".to_string(),
            description: "FurniMart order".to_string(),
        }
    }

    #[tokio::test]
    async fn test_capture_sends_minor_units_and_idempotency_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .and(header("idempotency-key", "checkout-abc-capture-1"))
            .and(body_string_contains("amount=4500"))
            .and(body_string_contains("currency=usd"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "pi_1", "status": "succeeded"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server).capture(&request(Decimal::new(4500, 2))).await.unwrap();
        assert!(outcome.succeeded);
        assert_eq!(outcome.transaction_id, TransactionId::new("pi_1"));
        assert_eq!(outcome.amount, Decimal::from(45));
    }

    #[tokio::test]
    async fn test_card_decline_is_a_failed_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/payment_intents"))
            .respond_with(ResponseTemplate::new(402).set_body_json(json!({
                "error": {
                    "type": "card_error",
                    "code": "card_declined",
                    "message": "Your card has insufficient funds.",
                    "payment_intent": {"id": "pi_2"}
                }
            })))
            .mount(&server)
            .await;

        let outcome = client(&server).capture(&request(Decimal::from(45))).await.unwrap();
        assert!(!outcome.succeeded);
        assert_eq!(
            outcome.failure_reason.as_deref(),
            Some("Your card has insufficient funds.")
        );
        assert_eq!(outcome.transaction_id, TransactionId::new("pi_2"));
    }

    #[tokio::test]
    async fn test_incomplete_intent_is_declined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "pi_3", "status": "requires_action"})),
            )
            .mount(&server)
            .await;

        let outcome = client(&server).capture(&request(Decimal::from(45))).await.unwrap();
        assert!(!outcome.succeeded);
        assert!(outcome.failure_reason.unwrap().contains("requires_action"));
    }

    #[tokio::test]
    async fn test_sub_cent_amount_is_rejected_before_sending() {
        let server = MockServer::start().await;
        let err = client(&server)
            .capture(&request(Decimal::new(1001, 3)))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidAmount(_)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"type": "api_error", "message": "Something went wrong"}
            })))
            .mount(&server)
            .await;

        let err = client(&server).capture(&request(Decimal::from(45))).await.unwrap_err();
        assert!(matches!(err, PaymentError::Api { status: 500, .. }));
    }
}
