//! Order status updates.
//!
//! # Environment Variables
//!
//! - `CATALOG_PROJECT_URL`, `CATALOG_TOKEN` (and optionally `CATALOG_DATASET`,
//!   `CATALOG_API_VERSION`)

use std::time::Duration;

use thiserror::Error;

use furnimart_core::{OrderId, OrderStatus, PaymentStatus};
use furnimart_storefront::catalog::{CatalogClient, CatalogError, CatalogStore, OrderStatusUpdate};
use furnimart_storefront::config::{CatalogConfig, ConfigError};

const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum OrderCommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Nothing to update: pass --status and/or --payment-status")]
    NothingToUpdate,
}

/// Patch an existing order document.
pub async fn update_status(
    order_id: &OrderId,
    status: Option<OrderStatus>,
    payment_status: Option<PaymentStatus>,
) -> Result<(), OrderCommandError> {
    let update = OrderStatusUpdate {
        status,
        payment_status,
    };
    if update.is_empty() {
        return Err(OrderCommandError::NothingToUpdate);
    }

    dotenvy::dotenv().ok();
    let client = CatalogClient::new(&CatalogConfig::from_env()?, TIMEOUT)?;

    tracing::info!(%order_id, ?status, ?payment_status, "Updating order");
    client.update_order_status(order_id, &update).await?;

    tracing::info!(%order_id, "Order updated");
    Ok(())
}
