//! Order documents, payment outcomes and shipment labels.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::address::ShippingAddress;
use crate::cart::CartLine;
use crate::types::{CheckoutAttemptId, CustomerId, ProductId, SellerId, TransactionId};

/// Result of a single payment capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub succeeded: bool,
    pub transaction_id: TransactionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Amount the processor was asked to capture.
    pub amount: Decimal,
}

impl PaymentOutcome {
    #[must_use]
    pub const fn success(transaction_id: TransactionId, amount: Decimal) -> Self {
        Self {
            succeeded: true,
            transaction_id,
            failure_reason: None,
            amount,
        }
    }

    #[must_use]
    pub fn declined(transaction_id: TransactionId, amount: Decimal, reason: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            transaction_id,
            failure_reason: Some(reason.into()),
            amount,
        }
    }
}

/// A purchased shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentLabel {
    pub tracking_number: String,
    pub label_url: String,
}

/// A product line on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub seller_id: SellerId,
}

impl From<&CartLine> for OrderLine {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id.clone(),
            title: line.title.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            seller_id: line.seller_id.clone(),
        }
    }
}

/// Everything the order writer needs to persist a paid order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    /// Checkout attempt that produced this order; doubles as idempotency key.
    pub attempt_id: CheckoutAttemptId,
    pub customer_id: CustomerId,
    pub seller_ids: Vec<SellerId>,
    pub line_items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment: PaymentOutcome,
    pub shipping_cost: Decimal,
    pub grand_total: Decimal,
}

impl NewOrder {
    /// Products subtotal (Σ unit price × quantity).
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.line_items
            .iter()
            .map(|l| l.unit_price * Decimal::from(l.quantity))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_line_from_cart_line() {
        let cart_line = CartLine {
            product_id: ProductId::new("desk"),
            title: "Desk".to_string(),
            unit_price: Decimal::from(80),
            quantity: 2,
            weight: Decimal::from(12),
            seller_id: SellerId::new("s1"),
        };
        let line = OrderLine::from(&cart_line);
        assert_eq!(line.quantity, 2);
        assert_eq!(line.unit_price, Decimal::from(80));
    }

    #[test]
    fn test_declined_outcome_carries_reason() {
        let outcome = PaymentOutcome::declined(
            TransactionId::new("pi_1"),
            Decimal::from(10),
            "Your card was declined.",
        );
        assert!(!outcome.succeeded);
        assert_eq!(
            outcome.failure_reason.as_deref(),
            Some("Your card was declined.")
        );
    }
}
