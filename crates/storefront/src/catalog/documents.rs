//! Wire shapes of catalog documents and API envelopes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use furnimart_core::{
    CustomerId, CustomerRecord, IdentityUserId, NewOrder, OrderLine, OrderStatus, PaymentStatus,
    PostalAddress, ProductId, SellerId,
};

use super::CatalogProduct;

/// `GET /data/query` envelope.
#[derive(Debug, Deserialize)]
pub(super) struct QueryResponse<T> {
    pub result: T,
}

/// `POST /data/mutate` envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct MutateResponse<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<MutationResult<T>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct MutationResult<T> {
    pub id: String,
    #[serde(default = "Option::default")]
    pub document: Option<T>,
}

/// Projection used by the cart validation query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProductDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub price: Decimal,
    #[serde(default)]
    pub weight: Option<Decimal>,
    #[serde(default)]
    pub seller_id: Option<String>,
    #[serde(default)]
    pub inventory: Option<i64>,
}

impl From<ProductDocument> for CatalogProduct {
    fn from(doc: ProductDocument) -> Self {
        Self {
            id: ProductId::new(doc.id),
            title: doc.title,
            price: doc.price,
            weight: doc.weight.filter(|w| *w > Decimal::ZERO),
            seller_id: doc.seller_id.map(SellerId::new),
            inventory: doc
                .inventory
                .map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX)),
        }
    }
}

/// A `user` document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CustomerDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub clerk_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub address: Option<PostalAddress>,
    // Older documents carry null entries where an empty address was archived.
    #[serde(default)]
    pub address_history: Vec<Option<PostalAddress>>,
    #[serde(default)]
    pub previous_phones: Vec<Option<String>>,
    #[serde(default)]
    pub previous_emails: Vec<Option<String>>,
}

impl From<CustomerDocument> for CustomerRecord {
    fn from(doc: CustomerDocument) -> Self {
        Self {
            id: CustomerId::new(doc.id),
            identity_provider_id: doc.clerk_id.map(IdentityUserId::new),
            name: doc.name,
            email: doc.email,
            mobile: doc.mobile,
            current_address: doc.address,
            address_history: doc.address_history.into_iter().flatten().collect(),
            previous_phones: doc.previous_phones.into_iter().flatten().collect(),
            previous_emails: doc.previous_emails.into_iter().flatten().collect(),
        }
    }
}

/// Array members need a `_key` to be editable in the studio.
#[derive(Debug, Serialize)]
pub(super) struct Keyed<'a, T: Serialize> {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(flatten)]
    pub value: &'a T,
}

fn keyed<'a, T: Serialize>(prefix: &str, items: &'a [T]) -> Vec<Keyed<'a, T>> {
    items
        .iter()
        .enumerate()
        .map(|(i, value)| Keyed {
            key: format!("{prefix}-{i}"),
            value,
        })
        .collect()
}

/// Contact fields written on create and on every update.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CustomerFields<'a> {
    pub clerk_id: Option<&'a str>,
    pub name: &'a str,
    pub email: &'a str,
    pub mobile: &'a str,
    pub address: Option<&'a PostalAddress>,
    pub address_history: Vec<Keyed<'a, PostalAddress>>,
    pub previous_phones: &'a [String],
    pub previous_emails: &'a [String],
}

impl<'a> CustomerFields<'a> {
    pub fn from_record(record: &'a CustomerRecord) -> Self {
        Self {
            clerk_id: record.identity_provider_id.as_ref().map(IdentityUserId::as_str),
            name: &record.name,
            email: &record.email,
            mobile: &record.mobile,
            address: record.current_address.as_ref(),
            address_history: keyed("address", &record.address_history),
            previous_phones: &record.previous_phones,
            previous_emails: &record.previous_emails,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct Reference<'a> {
    #[serde(rename = "_type")]
    pub kind: &'static str,
    #[serde(rename = "_ref")]
    pub target: &'a str,
}

impl<'a> Reference<'a> {
    pub const fn to(target: &'a str) -> Self {
        Self {
            kind: "reference",
            target,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SellerRef<'a> {
    #[serde(rename = "_key")]
    pub key: &'a str,
    #[serde(flatten)]
    pub reference: Reference<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderProduct<'a> {
    #[serde(rename = "_key")]
    pub key: &'a str,
    pub product: Reference<'a>,
    pub title: &'a str,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

impl<'a> From<&'a OrderLine> for OrderProduct<'a> {
    fn from(line: &'a OrderLine) -> Self {
        Self {
            key: line.product_id.as_str(),
            product: Reference::to(line.product_id.as_str()),
            title: &line.title,
            quantity: line.quantity,
            price: line.unit_price,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PaymentDetails<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount_paid: Decimal,
    pub payment_method: &'static str,
    pub transaction_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderAddress<'a> {
    pub name: &'a str,
    pub street: &'a str,
    pub city: &'a str,
    pub state: &'a str,
    pub postal_code: &'a str,
    pub country: &'a str,
}

/// An `order` document.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderDocument<'a> {
    #[serde(rename = "_id")]
    pub id: &'a str,
    #[serde(rename = "_type")]
    pub kind: &'static str,
    pub order_id: &'a str,
    pub customer: Reference<'a>,
    pub sellers: Vec<SellerRef<'a>>,
    pub products: Vec<OrderProduct<'a>>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping_cost: Decimal,
    pub payment_details: PaymentDetails<'a>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_address: OrderAddress<'a>,
    pub created_at: DateTime<Utc>,
}

impl<'a> OrderDocument<'a> {
    pub fn new(id: &'a str, order: &'a NewOrder, created_at: DateTime<Utc>) -> Self {
        let address = &order.shipping_address;
        Self {
            id,
            kind: "order",
            order_id: id,
            customer: Reference::to(order.customer_id.as_str()),
            sellers: order
                .seller_ids
                .iter()
                .map(|s| SellerRef {
                    key: s.as_str(),
                    reference: Reference::to(s.as_str()),
                })
                .collect(),
            products: order.line_items.iter().map(OrderProduct::from).collect(),
            total: order.grand_total,
            shipping_cost: order.shipping_cost,
            payment_details: PaymentDetails {
                amount_paid: order.payment.amount,
                payment_method: "card",
                transaction_id: order.payment.transaction_id.as_str(),
            },
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Paid,
            shipping_address: OrderAddress {
                name: &address.name,
                street: &address.street,
                city: &address.city,
                state: address.state.as_deref().unwrap_or_default(),
                postal_code: &address.postal_code,
                country: &address.country,
            },
            created_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_customer_document_skips_null_history_entries() {
        let doc: CustomerDocument = serde_json::from_value(json!({
            "_id": "user-1",
            "clerkId": "user_abc",
            "name": "Sana Malik",
            "email": "sana@example.pk",
            "mobile": "0300-1111111",
            "address": {"street": "1 Mall Rd", "city": "Lahore", "state": "", "postalCode": "54000", "country": "PK"},
            "addressHistory": [null, {"_key": "a", "street": "2 Canal Rd", "city": "Lahore", "postalCode": "54000", "country": "PK"}],
            "previousPhones": [null]
        }))
        .unwrap();

        let record = CustomerRecord::from(doc);
        assert_eq!(record.address_history.len(), 1);
        assert_eq!(record.address_history[0].street, "2 Canal Rd");
        assert!(record.previous_phones.is_empty());
        assert_eq!(
            record.identity_provider_id,
            Some(IdentityUserId::new("user_abc"))
        );
    }

    #[test]
    fn test_product_document_clamps_negative_inventory() {
        let doc: ProductDocument = serde_json::from_value(json!({
            "_id": "p1", "title": "Lamp", "price": 19.5, "inventory": -3, "weight": 0
        }))
        .unwrap();
        let product = CatalogProduct::from(doc);
        assert_eq!(product.inventory, Some(0));
        assert_eq!(product.weight, None);
        assert_eq!(product.price, Decimal::new(195, 1));
    }

    #[test]
    fn test_customer_fields_key_history_entries() {
        let record = CustomerRecord {
            id: CustomerId::new("user-1"),
            identity_provider_id: None,
            name: "A".to_string(),
            email: "a@example.pk".to_string(),
            mobile: "1".to_string(),
            current_address: None,
            address_history: vec![PostalAddress::default(), PostalAddress::default()],
            previous_phones: Vec::new(),
            previous_emails: Vec::new(),
        };
        let value = serde_json::to_value(CustomerFields::from_record(&record)).unwrap();
        assert_eq!(value["addressHistory"][1]["_key"], "address-1");
        assert_eq!(value["clerkId"], serde_json::Value::Null);
    }
}
