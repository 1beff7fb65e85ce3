//! Newtype IDs for type-safe entity references.
//!
//! Catalog documents, identity-provider users, carrier rates and payment
//! transactions are all identified by opaque strings minted by the external
//! system that owns them. Use the `define_id!` macro to create wrappers that
//! prevent accidentally mixing IDs from different entity types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use furnimart_core::define_id;
/// define_id!(SkuId);
/// define_id!(WarehouseId);
///
/// let sku = SkuId::new("sku-1");
/// let warehouse = WarehouseId::new("wh-1");
/// assert_eq!(sku.as_str(), "sku-1");
///
/// // These are different types, so this won't compile:
/// // let _: SkuId = warehouse;
/// # let _ = warehouse;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the underlying string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Catalog store documents
define_id!(ProductId);
define_id!(SellerId);
define_id!(CustomerId);
define_id!(OrderId);

// Identity provider
define_id!(IdentityUserId);
define_id!(EmailAddressId);

// Carrier and payment processor
define_id!(RateId);
define_id!(TransactionId);

/// Identifier of a single checkout attempt.
///
/// Minted when a checkout starts and reused as the idempotency key for every
/// side effect of that attempt (payment capture, order write).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutAttemptId(Uuid);

impl CheckoutAttemptId {
    /// Mint a fresh random attempt ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Idempotency key for a named side effect of this attempt.
    #[must_use]
    pub fn idempotency_key(&self, scope: &str) -> String {
        format!("checkout-{}-{scope}", self.0.simple())
    }
}

impl core::fmt::Display for CheckoutAttemptId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_conversions() {
        let id = ProductId::from("prod-1");
        assert_eq!(id.to_string(), "prod-1");
        assert_eq!(id.as_str(), "prod-1");
        assert_eq!(String::from("prod-1"), id.into_inner());
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = SellerId::new("seller-9");
        assert_eq!(serde_json::to_string(&id).ok().as_deref(), Some("\"seller-9\""));
    }

    #[test]
    fn test_idempotency_key_is_stable_per_scope() {
        let attempt = CheckoutAttemptId::generate();
        assert_eq!(
            attempt.idempotency_key("payment"),
            attempt.idempotency_key("payment")
        );
        assert_ne!(
            attempt.idempotency_key("payment"),
            attempt.idempotency_key("order")
        );
    }
}
