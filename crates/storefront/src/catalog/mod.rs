//! Headless catalog store: products, sellers, customers and orders.
//!
//! The store is the system of record for everything except sessions. All
//! reads are GROQ queries and all writes are transactional mutations over
//! its HTTP API (see [`CatalogClient`]).

mod client;
mod documents;

pub use client::CatalogClient;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use furnimart_core::{
    ContactUpdate, CustomerId, CustomerRecord, IdentityUserId, NewOrder, OrderId, OrderStatus,
    PaymentStatus, ProductId, SellerId,
};

/// Errors that can occur when talking to the catalog store.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request failed (includes timeouts).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A referenced document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// A product as currently listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub title: String,
    pub price: Decimal,
    /// Unit shipping weight, when the catalog records one.
    pub weight: Option<Decimal>,
    pub seller_id: Option<SellerId>,
    /// Units in stock; `None` when the catalog does not track inventory.
    pub inventory: Option<u32>,
}

impl CatalogProduct {
    /// Whether `quantity` units can be bought right now.
    #[must_use]
    pub fn is_purchasable(&self, quantity: u32) -> bool {
        self.price >= Decimal::ZERO && self.inventory.is_none_or(|stock| stock >= quantity)
    }
}

/// Status fields that may change on an existing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusUpdate {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

impl OrderStatusUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none() && self.payment_status.is_none()
    }
}

/// Operations checkout needs from the catalog store.
///
/// Implemented over HTTP by [`CatalogClient`] and in memory by
/// [`crate::checkout::memory::InMemoryCatalog`].
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Current listing for each requested product. Unknown ids are omitted.
    async fn products(&self, ids: &[ProductId]) -> Result<Vec<CatalogProduct>, CatalogError>;

    async fn find_customer_by_mobile(
        &self,
        mobile: &str,
    ) -> Result<Option<CustomerRecord>, CatalogError>;

    async fn find_customer_by_identity(
        &self,
        identity_id: &IdentityUserId,
    ) -> Result<Option<CustomerRecord>, CatalogError>;

    async fn customer_exists(&self, id: &CustomerId) -> Result<bool, CatalogError>;

    /// Create a new customer with empty histories.
    async fn create_customer(&self, update: ContactUpdate) -> Result<CustomerRecord, CatalogError>;

    /// Overwrite the stored contact fields and histories of an existing customer.
    async fn save_customer(&self, record: &CustomerRecord) -> Result<(), CatalogError>;

    /// The subset of `ids` that refer to existing sellers.
    async fn existing_sellers(&self, ids: &[SellerId]) -> Result<Vec<SellerId>, CatalogError>;

    /// Persist an order. Writing the same checkout attempt twice returns the
    /// id of the first write without creating a second document.
    async fn write_order(&self, order: &NewOrder) -> Result<OrderId, CatalogError>;

    async fn update_order_status(
        &self,
        id: &OrderId,
        update: &OrderStatusUpdate,
    ) -> Result<(), CatalogError>;
}

/// Document id used for the order produced by a checkout attempt.
#[must_use]
pub fn order_document_id(order: &NewOrder) -> OrderId {
    OrderId::new(format!("order-{}", order.attempt_id.as_uuid().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(inventory: Option<u32>) -> CatalogProduct {
        CatalogProduct {
            id: ProductId::new("sofa"),
            title: "Sofa".to_string(),
            price: Decimal::from(400),
            weight: None,
            seller_id: None,
            inventory,
        }
    }

    #[test]
    fn test_untracked_inventory_is_purchasable() {
        assert!(product(None).is_purchasable(10));
    }

    #[test]
    fn test_inventory_must_cover_quantity() {
        assert!(product(Some(2)).is_purchasable(2));
        assert!(!product(Some(2)).is_purchasable(3));
        assert!(!product(Some(0)).is_purchasable(1));
    }

    #[test]
    fn test_status_update_deserializes_partial_body() {
        let update: OrderStatusUpdate =
            serde_json::from_str(r#"{"paymentStatus":"paid"}"#).unwrap_or_default();
        assert_eq!(update.payment_status, Some(PaymentStatus::Paid));
        assert_eq!(update.status, None);
        assert!(!update.is_empty());
    }
}
