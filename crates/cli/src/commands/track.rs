//! Shipment tracking lookup.
//!
//! # Environment Variables
//!
//! - `SHIPPING_API_KEY` and the `SHIPPING_ORIGIN_*` variables

use std::time::Duration;

use thiserror::Error;

use furnimart_storefront::config::{ConfigError, ShippingConfig};
use furnimart_storefront::shipping::{ShippingCarrier, ShippingClient, ShippingError};

const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TrackCommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Shipping(#[from] ShippingError),

    #[error("Could not render status: {0}")]
    Render(#[from] serde_json::Error),
}

/// Print the current tracking status as JSON.
pub async fn show(carrier: &str, tracking_number: &str) -> Result<(), TrackCommandError> {
    dotenvy::dotenv().ok();
    let client = ShippingClient::new(&ShippingConfig::from_env()?, TIMEOUT)?;

    let status = client.track(carrier, tracking_number).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&status)?);
    }
    Ok(())
}
