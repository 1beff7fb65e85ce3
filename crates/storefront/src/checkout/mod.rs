//! Multi-step checkout: details, shipping, payment, confirmation.
//!
//! [`CheckoutSession`] is the per-shopper wizard state kept in the browser
//! session. [`Checkout`] drives the transitions that need collaborators:
//! cart validation, rate quotes and settlement (payment capture, customer
//! reconciliation, order write, label purchase).

mod guard;
pub mod memory;
mod orchestrator;
mod rates;
mod reconciler;
mod state;
mod validator;

pub use guard::SubmissionGuard;
pub use orchestrator::{Checkout, CheckoutSettings, Collaborators, SettlementClaim};
pub use rates::{order_parcel, resolve_rates};
pub use reconciler::{IdentityReconciler, Reconciliation};
pub use state::{
    CheckoutSession, CheckoutStep, Confirmation, IssuedLabel, LabelStatus, RatesState,
    SettlementProgress, quote_fingerprint,
};
pub use validator::{CartValidation, validate_cart};

use thiserror::Error;

use furnimart_core::{AddressError, CartError, RateId};

use crate::catalog::CatalogError;
use crate::identity::IdentityError;
use crate::payments::PaymentError;

/// Why a checkout transition was refused.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{}", validator::EMPTY_CART)]
    EmptyCart,

    #[error("{}", validator::NO_VALID_ITEMS)]
    NoValidItems,

    /// Validation dropped lines; the survivors await acknowledgment.
    #[error("{}", validator::ITEMS_UNAVAILABLE)]
    CartShrank,

    #[error("{}", validator::VALIDATION_FAILED)]
    CartValidationFailed,

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error(transparent)]
    InvalidCart(#[from] CartError),

    #[error("Checkout is at the {actual} step, not {expected}")]
    WrongStep {
        expected: CheckoutStep,
        actual: CheckoutStep,
    },

    #[error("Shipping details have not been submitted")]
    MissingDetails,

    #[error("There are no cart changes to accept")]
    NothingToAcknowledge,

    #[error("Please select a shipping rate")]
    NoRateSelected,

    #[error("Unknown shipping rate: {0}")]
    UnknownRate(RateId),

    #[error("Order total must be greater than zero")]
    InvalidTotal,

    #[error("A payment method is required")]
    MissingPaymentMethod,

    /// The card was declined. Holds the processor's reason.
    #[error("{0}")]
    PaymentDeclined(String),

    #[error("Payment failed: {0}")]
    Payment(#[from] PaymentError),

    #[error("Payment has already been captured for this checkout")]
    PaymentAlreadyCaptured,

    /// The shipping email must be verified before the order can be placed.
    #[error("{0}")]
    VerificationPending(&'static str),

    /// A customer or seller referenced by the order does not exist.
    #[error("Order could not be created: {0}")]
    OrderRejected(String),

    #[error("checkout already in progress")]
    InProgress,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}
