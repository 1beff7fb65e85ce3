//! Carrier rate quotes, parcels and tracking.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::RateId;

/// A carrier-provided, time-limited price for shipping the parcel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingRate {
    pub id: RateId,
    pub carrier_name: String,
    pub service_level_name: String,
    pub amount: Decimal,
    pub currency: String,
    /// Carrier estimate; 0 when the carrier gives none.
    pub estimated_transit_days: u32,
}

/// Aggregate parcel for a whole order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub length: Decimal,
    pub width: Decimal,
    pub height: Decimal,
    /// Distance unit for the dimensions (e.g. "in", "cm").
    pub distance_unit: String,
    pub weight: Decimal,
    /// Mass unit for the weight (e.g. "lb", "kg").
    pub mass_unit: String,
}

/// Current carrier status of a shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStatus {
    pub carrier: String,
    pub tracking_number: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
}
