//! Order status webhook.
//!
//! Fulfilment systems report order and payment status changes here. Calls
//! must carry the shared secret in `x-webhook-secret`.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::instrument;

use furnimart_core::OrderId;

use crate::catalog::OrderStatusUpdate;
use crate::error::{AppError, Result};
use crate::state::AppState;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusRequest {
    pub order_id: OrderId,
    #[serde(flatten)]
    pub update: OrderStatusUpdate,
}

/// Check the presented secret against the configured one in constant time.
/// Without a configured secret every call is refused.
fn authorize(expected: Option<&SecretString>, headers: &HeaderMap) -> Result<()> {
    let unauthorized = || AppError::Unauthorized("invalid webhook secret".to_string());
    let expected = expected.ok_or_else(unauthorized)?;
    let presented = headers
        .get(WEBHOOK_SECRET_HEADER)
        .map(|value| value.as_bytes())
        .ok_or_else(unauthorized)?;

    if bool::from(presented.ct_eq(expected.expose_secret().as_bytes())) {
        Ok(())
    } else {
        Err(unauthorized())
    }
}

/// Apply a status update to an existing order.
#[instrument(skip_all, fields(order_id = %request.order_id))]
pub async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<OrderStatusRequest>,
) -> Result<StatusCode> {
    authorize(state.config().order_webhook_secret.as_ref(), &headers)?;
    if request.update.is_empty() {
        return Err(AppError::BadRequest(
            "status or paymentStatus is required".to_string(),
        ));
    }

    state
        .checkout()
        .catalog()
        .update_order_status(&request.order_id, &request.update)
        .await?;

    tracing::info!(
        status = ?request.update.status,
        payment_status = ?request.update.payment_status,
        "Order status updated"
    );
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(secret: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(WEBHOOK_SECRET_HEADER, HeaderValue::from_static(secret));
        headers
    }

    #[test]
    fn test_matching_secret_is_accepted() {
        let secret = SecretString::from("whsec-0123456789abcdef0123456789");
        assert!(authorize(Some(&secret), &headers("whsec-0123456789abcdef0123456789")).is_ok());
    }

    #[test]
    fn test_wrong_or_missing_secret_is_refused() {
        let secret = SecretString::from("whsec-0123456789abcdef0123456789");
        assert!(authorize(Some(&secret), &headers("whsec-nope")).is_err());
        assert!(authorize(Some(&secret), &HeaderMap::new()).is_err());
    }

    #[test]
    fn test_unconfigured_secret_refuses_everything() {
        assert!(matches!(
            authorize(None, &headers("anything")),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_request_flattens_update_fields() {
        let request: OrderStatusRequest =
            serde_json::from_str(r#"{"orderId":"order-1","status":"shipped"}"#).unwrap();
        assert_eq!(request.order_id, OrderId::new("order-1"));
        assert!(request.update.status.is_some());
        assert!(request.update.payment_status.is_none());
    }
}
