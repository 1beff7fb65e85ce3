//! Rate quotes for the aggregate order parcel.

use tracing::instrument;

use furnimart_core::{Parcel, ShippingAddress, ShippingRate, ValidatedCart};

use crate::config::ParcelDefaults;
use crate::shipping::{RateRequest, ShippingCarrier, ShippingError, ShippingParty};

/// One parcel for the whole order: configured box, summed weight.
#[must_use]
pub fn order_parcel(defaults: &ParcelDefaults, cart: &ValidatedCart) -> Parcel {
    Parcel {
        length: defaults.length,
        width: defaults.width,
        height: defaults.height,
        distance_unit: defaults.distance_unit.clone(),
        weight: cart.total_weight(),
        mass_unit: defaults.mass_unit.clone(),
    }
}

/// Quote every service for shipping `cart` to `destination`.
///
/// # Errors
///
/// Returns the carrier's error, or [`ShippingError::NoRates`] when the
/// carrier has nothing to offer.
#[instrument(skip_all, fields(city = %destination.city, weight = %cart.total_weight()))]
pub async fn resolve_rates(
    carrier: &dyn ShippingCarrier,
    origin: &ShippingParty,
    defaults: &ParcelDefaults,
    destination: &ShippingAddress,
    cart: &ValidatedCart,
) -> Result<Vec<ShippingRate>, ShippingError> {
    let request = RateRequest {
        origin: origin.clone(),
        destination: ShippingParty::from(destination),
        parcel: order_parcel(defaults, cart),
    };
    let rates = carrier.quote(&request).await?;
    if rates.is_empty() {
        return Err(ShippingError::NoRates);
    }
    tracing::info!(count = rates.len(), "Shipping rates quoted");
    Ok(rates)
}
