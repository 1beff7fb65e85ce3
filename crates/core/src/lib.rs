//! FurniMart Core - Shared domain types.
//!
//! This crate provides the domain model used by every FurniMart component:
//! - `storefront` - JSON API serving cart, wishlist and checkout
//! - `cli` - Operational commands (migrations, order status, tracking)
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Anything that talks to the catalog store, the
//! identity provider, the payment processor or the carrier lives in the
//! storefront crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, email, money and status enums
//! - [`cart`] - Session cart and its reducer operations
//! - [`wishlist`] - Session wishlist
//! - [`address`] - Shipping address validation
//! - [`customer`] - Customer records with history-preserving updates
//! - [`order`] - Orders, payment outcomes and shipment labels
//! - [`shipping`] - Rate quotes, parcels and tracking

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod address;
pub mod cart;
pub mod customer;
pub mod order;
pub mod shipping;
pub mod types;
pub mod wishlist;

pub use address::{AddressError, AddressField, ShippingAddress, ShippingAddressInput};
pub use cart::{Cart, CartError, CartLine, ValidatedCart};
pub use customer::{ContactUpdate, CustomerRecord, PostalAddress};
pub use order::{NewOrder, OrderLine, PaymentOutcome, ShipmentLabel};
pub use shipping::{Parcel, ShippingRate, TrackingStatus};
pub use types::*;
pub use wishlist::{Wishlist, WishlistItem};
