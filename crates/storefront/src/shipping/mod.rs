//! Shipping provider: rate quotes, label purchase and tracking.

mod client;

pub use client::ShippingClient;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use furnimart_core::{Parcel, RateId, ShipmentLabel, ShippingAddress, ShippingRate, TrackingStatus};

use crate::config::ShippingOrigin;

/// Errors that can occur when talking to the shipping provider.
#[derive(Debug, Error)]
pub enum ShippingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    /// The carrier returned no rates for the shipment.
    #[error("No shipping rates available")]
    NoRates,

    /// The label transaction completed with an error status.
    #[error("Label purchase failed: {0}")]
    LabelFailed(String),

    #[error("Shipment not found")]
    NotFound,
}

/// A sender or recipient as the shipping provider expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingParty {
    pub name: String,
    pub street1: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
    pub phone: String,
    pub email: String,
}

impl From<&ShippingOrigin> for ShippingParty {
    fn from(origin: &ShippingOrigin) -> Self {
        Self {
            name: origin.name.clone(),
            street1: origin.street.clone(),
            city: origin.city.clone(),
            state: origin.state.clone(),
            zip: origin.zip.clone(),
            country: origin.country.clone(),
            phone: origin.phone.clone(),
            email: origin.email.clone(),
        }
    }
}

impl From<&ShippingAddress> for ShippingParty {
    fn from(address: &ShippingAddress) -> Self {
        Self {
            name: address.name.clone(),
            street1: address.street.clone(),
            city: address.city.clone(),
            state: address.state.clone().unwrap_or_default(),
            zip: address.postal_code.clone(),
            country: address.country.clone(),
            phone: address.mobile.clone(),
            email: address.email.as_str().to_owned(),
        }
    }
}

/// Everything needed to quote a shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRequest {
    pub origin: ShippingParty,
    pub destination: ShippingParty,
    pub parcel: Parcel,
}

/// Operations checkout needs from the shipping provider.
#[async_trait]
pub trait ShippingCarrier: Send + Sync {
    /// Quote every available service, in the order the provider lists them.
    ///
    /// An empty quote is reported as [`ShippingError::NoRates`].
    async fn quote(&self, request: &RateRequest) -> Result<Vec<ShippingRate>, ShippingError>;

    /// Buy a label for a previously quoted rate.
    async fn purchase_label(&self, rate_id: &RateId) -> Result<ShipmentLabel, ShippingError>;

    async fn track(
        &self,
        carrier: &str,
        tracking_number: &str,
    ) -> Result<TrackingStatus, ShippingError>;
}
