//! Per-session checkout wizard state.
//!
//! A [`CheckoutSession`] is serialized into the browser session between
//! requests. The synchronous transitions live here; the ones that call out
//! to collaborators are on [`super::Checkout`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use furnimart_core::{
    Cart, CheckoutAttemptId, CustomerId, OrderId, PaymentOutcome, RateId, ShippingAddress,
    ShippingRate, ValidatedCart,
};

use super::CheckoutError;

/// Wizard stages, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    #[default]
    Details,
    Shipping,
    Payment,
    Confirmation,
}

impl CheckoutStep {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Details => "details",
            Self::Shipping => "shipping",
            Self::Payment => "payment",
            Self::Confirmation => "confirmation",
        }
    }
}

impl std::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate lookup state for the current (address, cart) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RatesState {
    /// No lookup has been made for the current pair.
    #[default]
    NotRequested,
    /// The lookup failed or returned nothing. The stage keeps waiting until
    /// the shopper returns to details.
    Unavailable { message: String },
    Ready { rates: Vec<ShippingRate> },
}

impl RatesState {
    #[must_use]
    pub fn rates(&self) -> &[ShippingRate] {
        match self {
            Self::Ready { rates } => rates,
            Self::NotRequested | Self::Unavailable { .. } => &[],
        }
    }
}

/// Whether a label was bought for the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelStatus {
    Purchased,
    /// The order stands without a label; tracking shows "N/A".
    Failed,
}

/// The result of the label step, kept so a retry never buys a second label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedLabel {
    pub tracking_number: String,
    pub label_url: Option<String>,
    pub status: LabelStatus,
}

/// What the shopper sees once checkout is complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub order_id: OrderId,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub grand_total: Decimal,
    pub carrier_name: String,
    pub service_level_name: String,
    pub tracking_number: String,
    pub label_url: Option<String>,
    pub label: LabelStatus,
}

/// Settlement steps already completed in this attempt. A retry resumes
/// after the last completed step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementProgress {
    pub payment: Option<PaymentOutcome>,
    pub capture_attempts: u32,
    pub customer_id: Option<CustomerId>,
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub label: Option<IssuedLabel>,
}

/// The checkout attempt held in the shopper's session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub attempt_id: CheckoutAttemptId,
    pub step: CheckoutStep,
    pub address: Option<ShippingAddress>,
    pub cart: Option<ValidatedCart>,
    /// Surviving lines after validation dropped items, awaiting the shopper's ok.
    pub pending_shrink: Option<ValidatedCart>,
    pub rates: RatesState,
    /// Fingerprint of the (address, cart) pair the rates were quoted for.
    pub quoted_for: Option<Uuid>,
    pub selected_rate: Option<RateId>,
    pub payment_failure: Option<String>,
    pub settlement: SettlementProgress,
    pub confirmation: Option<Confirmation>,
}

impl Default for CheckoutSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutSession {
    /// A fresh attempt at the details stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempt_id: CheckoutAttemptId::generate(),
            step: CheckoutStep::Details,
            address: None,
            cart: None,
            pending_shrink: None,
            rates: RatesState::NotRequested,
            quoted_for: None,
            selected_rate: None,
            payment_failure: None,
            settlement: SettlementProgress::default(),
            confirmation: None,
        }
    }

    pub(super) fn require_step(&self, expected: CheckoutStep) -> Result<(), CheckoutError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(CheckoutError::WrongStep {
                expected,
                actual: self.step,
            })
        }
    }

    /// The selected rate, if it is among the current quotes.
    #[must_use]
    pub fn selected_rate(&self) -> Option<&ShippingRate> {
        let id = self.selected_rate.as_ref()?;
        self.rates.rates().iter().find(|r| &r.id == id)
    }

    /// Validated subtotal plus the selected rate.
    ///
    /// `None` until both a validated cart and a selected rate exist.
    #[must_use]
    pub fn grand_total(&self) -> Option<Decimal> {
        let cart = self.cart.as_ref()?;
        let rate = self.selected_rate()?;
        cart.checked_subtotal()?.checked_add(rate.amount)
    }

    /// Pick one of the quoted rates.
    ///
    /// # Errors
    ///
    /// Fails outside the shipping stage or when the id was not quoted.
    pub fn select_rate(&mut self, rate_id: RateId) -> Result<(), CheckoutError> {
        self.require_step(CheckoutStep::Shipping)?;
        if !self.rates.rates().iter().any(|r| r.id == rate_id) {
            return Err(CheckoutError::UnknownRate(rate_id));
        }
        self.selected_rate = Some(rate_id);
        Ok(())
    }

    /// Move from shipping to payment. Requires a selected rate.
    ///
    /// # Errors
    ///
    /// Fails outside the shipping stage or without a selected rate.
    pub fn continue_to_payment(&mut self) -> Result<(), CheckoutError> {
        self.require_step(CheckoutStep::Shipping)?;
        if self.selected_rate().is_none() {
            return Err(CheckoutError::NoRateSelected);
        }
        self.step = CheckoutStep::Payment;
        self.payment_failure = None;
        Ok(())
    }

    /// Return to the details stage to change the address.
    ///
    /// # Errors
    ///
    /// Fails from `details` and `confirmation`, and once a payment has been
    /// captured in this attempt.
    pub fn back_to_details(&mut self) -> Result<(), CheckoutError> {
        match self.step {
            CheckoutStep::Shipping | CheckoutStep::Payment => {}
            CheckoutStep::Details | CheckoutStep::Confirmation => {
                return Err(CheckoutError::WrongStep {
                    expected: CheckoutStep::Shipping,
                    actual: self.step,
                });
            }
        }
        if self.settlement.payment.is_some() {
            return Err(CheckoutError::PaymentAlreadyCaptured);
        }
        self.step = CheckoutStep::Details;
        self.payment_failure = None;
        Ok(())
    }

    /// Whether the attempt may be discarded for a fresh one.
    ///
    /// # Errors
    ///
    /// Fails once a payment is captured but the order is not yet confirmed:
    /// the capture belongs to this attempt.
    pub fn ensure_discardable(&self) -> Result<(), CheckoutError> {
        if self.settlement.payment.is_some() && self.step != CheckoutStep::Confirmation {
            return Err(CheckoutError::PaymentAlreadyCaptured);
        }
        Ok(())
    }

    /// Accept the lines that survived validation. The session cart is
    /// replaced by them; the shopper then resubmits their details.
    ///
    /// # Errors
    ///
    /// Fails outside the details stage or when nothing is pending.
    pub fn acknowledge_shrink(&mut self, cart: &mut Cart) -> Result<(), CheckoutError> {
        self.require_step(CheckoutStep::Details)?;
        let pending = self
            .pending_shrink
            .take()
            .ok_or(CheckoutError::NothingToAcknowledge)?;
        cart.set(pending.into_lines())?;
        Ok(())
    }

    /// The session cart was edited. An attempt that has not captured a
    /// payment goes back to `details` so the new cart gets validated.
    pub fn cart_changed(&mut self) {
        let editable = matches!(self.step, CheckoutStep::Shipping | CheckoutStep::Payment);
        if editable && self.settlement.payment.is_none() {
            self.step = CheckoutStep::Details;
            self.payment_failure = None;
        }
        self.pending_shrink = None;
    }

    /// The address and cart the current quotes are for.
    pub(super) fn shipping_inputs(&self) -> Result<(&ShippingAddress, &ValidatedCart), CheckoutError> {
        match (&self.address, &self.cart) {
            (Some(address), Some(cart)) => Ok((address, cart)),
            _ => Err(CheckoutError::MissingDetails),
        }
    }

    /// Whether rates must be (re)quoted for `fingerprint`.
    pub(super) fn needs_quote(&self, fingerprint: Uuid) -> bool {
        match self.rates {
            RatesState::NotRequested | RatesState::Unavailable { .. } => true,
            RatesState::Ready { .. } => self.quoted_for != Some(fingerprint),
        }
    }
}

/// Stable fingerprint of an (address, cart) pair.
#[must_use]
pub fn quote_fingerprint(address: &ShippingAddress, cart: &ValidatedCart) -> Uuid {
    let bytes = serde_json::to_vec(&(address, cart.lines())).unwrap_or_default();
    Uuid::new_v5(&Uuid::NAMESPACE_OID, &bytes)
}
