//! Card payment capture.

mod client;

pub use client::PaymentsClient;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use furnimart_core::{MoneyError, PaymentOutcome};

/// Errors that can occur when capturing a payment.
///
/// A card decline is not an error: it is a [`PaymentOutcome`] with
/// `succeeded == false`.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),
}

/// A single capture instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Amount in major units of the configured currency.
    pub amount: Decimal,
    /// Tokenized card from the client-side payment form.
    pub payment_method: String,
    /// Sent as the `Idempotency-Key` header.
    pub idempotency_key: String,
    pub description: String,
}

/// Operations checkout needs from the payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn capture(&self, request: &CaptureRequest) -> Result<PaymentOutcome, PaymentError>;
}
