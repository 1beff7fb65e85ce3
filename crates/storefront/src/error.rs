//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures upstream and server
//! errors to Sentry before responding to the client with a JSON body of the
//! form `{"error": "...", "fields": [...]}`. All route handlers return
//! `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use furnimart_core::CartError;

use crate::catalog::CatalogError;
use crate::checkout::CheckoutError;
use crate::identity::IdentityError;
use crate::shipping::ShippingError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// A checkout transition was refused.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Reading or writing the session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// A cart edit was refused.
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Shipping error: {0}")]
    Shipping(#[from] ShippingError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<&'static str>,
}

const UPSTREAM_MESSAGE: &str = "External service error";

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err {
        CheckoutError::EmptyCart
        | CheckoutError::NoValidItems
        | CheckoutError::CartShrank
        | CheckoutError::InvalidAddress(_)
        | CheckoutError::InvalidCart(_)
        | CheckoutError::NoRateSelected
        | CheckoutError::UnknownRate(_)
        | CheckoutError::InvalidTotal
        | CheckoutError::MissingPaymentMethod
        | CheckoutError::VerificationPending(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CheckoutError::WrongStep { .. }
        | CheckoutError::MissingDetails
        | CheckoutError::NothingToAcknowledge
        | CheckoutError::PaymentAlreadyCaptured
        | CheckoutError::InProgress => StatusCode::CONFLICT,
        CheckoutError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,
        CheckoutError::Identity(IdentityError::InvalidSession) => StatusCode::UNAUTHORIZED,
        CheckoutError::CartValidationFailed
        | CheckoutError::Payment(_)
        | CheckoutError::OrderRejected(_)
        | CheckoutError::Catalog(_)
        | CheckoutError::Identity(_) => StatusCode::BAD_GATEWAY,
    }
}

fn checkout_message(err: &CheckoutError) -> String {
    match err {
        CheckoutError::Payment(_) => "Payment could not be processed. Please try again.".to_string(),
        CheckoutError::Identity(IdentityError::InvalidSession) => {
            "Please sign in to complete your purchase".to_string()
        }
        CheckoutError::OrderRejected(_) => {
            "Your order could not be created. Please contact support.".to_string()
        }
        CheckoutError::Catalog(_) | CheckoutError::Identity(_) => UPSTREAM_MESSAGE.to_string(),
        _ => err.to_string(),
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Checkout(err) => checkout_status(err),
            Self::Session(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Catalog(CatalogError::NotFound(_)) | Self::Shipping(ShippingError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            Self::Catalog(_) | Self::Shipping(_) => StatusCode::BAD_GATEWAY,
            Self::Cart(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server and upstream errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Checkout(err) => checkout_message(err),
            Self::Session(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Catalog(CatalogError::NotFound(_)) => "Order not found".to_string(),
            Self::Shipping(ShippingError::NotFound) => "Shipment not found".to_string(),
            Self::Catalog(_) | Self::Shipping(_) => UPSTREAM_MESSAGE.to_string(),
            _ => self.to_string(),
        };

        let fields = match &self {
            Self::Checkout(CheckoutError::InvalidAddress(err)) => {
                err.fields().into_iter().map(|f| f.as_str()).collect()
            }
            _ => Vec::new(),
        };

        (status, Json(ErrorBody { error: message, fields })).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for shopper actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Selected shipping rate", Some(&[("rate_id", "rate_123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
