use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::instrument;

use furnimart_core::{
    Cart, CheckoutAttemptId, CustomerId, NewOrder, OrderId, OrderLine, PaymentOutcome, ShippingAddress,
    ShippingAddressInput,
};

use super::guard::SubmissionGuard;
use super::rates::resolve_rates;
use super::reconciler::{IdentityReconciler, Reconciliation};
use super::state::{
    CheckoutSession, CheckoutStep, Confirmation, IssuedLabel, LabelStatus, RatesState,
    quote_fingerprint,
};
use super::validator::{CartValidation, validate_cart};
use super::CheckoutError;
use crate::catalog::CatalogStore;
use crate::config::{CustomerMatchPolicy, ParcelDefaults};
use crate::identity::{IdentityProfile, IdentityProvider};
use crate::payments::{CaptureRequest, PaymentProcessor};
use crate::shipping::{ShippingCarrier, ShippingError, ShippingParty};

const NO_TRACKING: &str = "N/A";

/// The external services checkout talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub payments: Arc<dyn PaymentProcessor>,
    pub shipping: Arc<dyn ShippingCarrier>,
}

/// Deployment settings for checkout.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Where parcels ship from.
    pub origin: ShippingParty,
    pub parcel: ParcelDefaults,
    pub customer_match: CustomerMatchPolicy,
}

/// Drives checkout transitions that call out to collaborators.
///
/// Cheap to clone; all clones share the same collaborators and
/// submission guard.
#[derive(Clone)]
pub struct Checkout {
    inner: Arc<CheckoutInner>,
}

struct CheckoutInner {
    collaborators: Collaborators,
    settings: CheckoutSettings,
    guard: SubmissionGuard,
}

impl Checkout {
    #[must_use]
    pub fn new(collaborators: Collaborators, settings: CheckoutSettings) -> Self {
        Self::with_guard(collaborators, settings, SubmissionGuard::default())
    }

    #[must_use]
    pub fn with_guard(
        collaborators: Collaborators,
        settings: CheckoutSettings,
        guard: SubmissionGuard,
    ) -> Self {
        Self {
            inner: Arc::new(CheckoutInner {
                collaborators,
                settings,
                guard,
            }),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn CatalogStore {
        self.inner.collaborators.catalog.as_ref()
    }

    #[must_use]
    pub fn shipping(&self) -> &dyn ShippingCarrier {
        self.inner.collaborators.shipping.as_ref()
    }

    /// Whether a settlement for this session's attempt is running.
    #[must_use]
    pub fn is_processing(&self, session: &CheckoutSession) -> bool {
        self.inner.guard.is_held(session.attempt_id)
    }

    /// Submit shipping details and validate the cart.
    ///
    /// On success the session moves to `shipping`. Rates already quoted for
    /// the same address and cart are kept; otherwise they are cleared.
    ///
    /// # Errors
    ///
    /// Address and cart problems keep the session at `details`. A shrunk
    /// cart leaves its surviving lines in `pending_shrink`.
    #[instrument(skip_all, fields(attempt_id = %session.attempt_id))]
    pub async fn submit_details(
        &self,
        session: &mut CheckoutSession,
        cart: &Cart,
        input: ShippingAddressInput,
    ) -> Result<(), CheckoutError> {
        session.require_step(CheckoutStep::Details)?;
        let address = ShippingAddress::try_from(input)?;
        session.pending_shrink = None;

        let validated = match validate_cart(self.catalog(), cart.lines()).await {
            CartValidation::Valid(validated) if validated.len() == cart.len() => validated,
            CartValidation::Valid(survivors) | CartValidation::Shrank(survivors) => {
                tracing::info!(
                    requested = cart.len(),
                    available = survivors.len(),
                    "Cart shrank during validation"
                );
                session.address = Some(address);
                session.pending_shrink = Some(survivors);
                return Err(CheckoutError::CartShrank);
            }
            CartValidation::Empty => return Err(CheckoutError::EmptyCart),
            CartValidation::NoValidItems(_) => return Err(CheckoutError::NoValidItems),
            CartValidation::Failed(_) => return Err(CheckoutError::CartValidationFailed),
        };

        if session.needs_quote(quote_fingerprint(&address, &validated)) {
            session.rates = RatesState::NotRequested;
            session.quoted_for = None;
            session.selected_rate = None;
        }
        session.address = Some(address);
        session.cart = Some(validated);
        session.step = CheckoutStep::Shipping;
        Ok(())
    }

    /// Quote rates for the session's address and cart, once per pair.
    ///
    /// A failed or empty quote is not an error: the session records
    /// [`RatesState::Unavailable`] and waits until details are resubmitted.
    ///
    /// # Errors
    ///
    /// Fails outside the shipping stage.
    #[instrument(skip_all, fields(attempt_id = %session.attempt_id))]
    pub async fn load_rates(&self, session: &mut CheckoutSession) -> Result<(), CheckoutError> {
        session.require_step(CheckoutStep::Shipping)?;
        if session.rates != RatesState::NotRequested {
            return Ok(());
        }

        let (address, cart) = session.shipping_inputs()?;
        let settings = &self.inner.settings;
        let result = resolve_rates(
            self.shipping(),
            &settings.origin,
            &settings.parcel,
            address,
            cart,
        )
        .await;
        let fingerprint = quote_fingerprint(address, cart);

        session.rates = match result {
            Ok(rates) => RatesState::Ready { rates },
            Err(ShippingError::NoRates) => RatesState::Unavailable {
                message: "No shipping rates are available for this address".to_string(),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Rate lookup failed");
                RatesState::Unavailable {
                    message: "Unable to fetch shipping rates right now".to_string(),
                }
            }
        };
        session.quoted_for = Some(fingerprint);
        Ok(())
    }

    /// Claim the attempt for settlement.
    ///
    /// The claim must be released once the settled session has been
    /// persisted, so a concurrent request never settles from a stale copy.
    ///
    /// # Errors
    ///
    /// Fails outside the payment stage, or with
    /// [`CheckoutError::InProgress`] while another settlement holds the
    /// attempt.
    pub async fn claim(&self, session: &CheckoutSession) -> Result<SettlementClaim, CheckoutError> {
        session.require_step(CheckoutStep::Payment)?;
        let attempt = session.attempt_id;
        if !self.inner.guard.try_acquire(attempt).await {
            return Err(CheckoutError::InProgress);
        }
        Ok(SettlementClaim {
            attempt,
            guard: self.inner.guard.clone(),
        })
    }

    /// Capture payment and settle the order.
    ///
    /// Steps already completed in this attempt are not repeated: a captured
    /// payment is never captured again, a written order is never rewritten
    /// and a label is bought at most once. An attempt that already settled
    /// returns its confirmation.
    ///
    /// # Errors
    ///
    /// Declines and collaborator failures keep the session at `payment` so
    /// the shopper can retry. A claim for another attempt is refused with
    /// [`CheckoutError::InProgress`].
    #[instrument(skip_all, fields(attempt_id = %session.attempt_id))]
    pub async fn settle(
        &self,
        claim: &SettlementClaim,
        session: &mut CheckoutSession,
        session_token: &str,
        payment_method: &str,
    ) -> Result<Confirmation, CheckoutError> {
        if claim.attempt != session.attempt_id {
            return Err(CheckoutError::InProgress);
        }
        session.require_step(CheckoutStep::Payment)?;
        if let Some(confirmation) = self.inner.guard.confirmation(session.attempt_id).await {
            tracing::info!(order_id = %confirmation.order_id, "Attempt already settled");
            session.confirmation = Some(confirmation.clone());
            session.step = CheckoutStep::Confirmation;
            return Ok(confirmation);
        }

        let confirmation = self.run_settlement(session, session_token, payment_method).await?;
        self.inner
            .guard
            .record_confirmation(session.attempt_id, confirmation.clone())
            .await;
        Ok(confirmation)
    }

    async fn run_settlement(
        &self,
        session: &mut CheckoutSession,
        session_token: &str,
        payment_method: &str,
    ) -> Result<Confirmation, CheckoutError> {
        let total = session.grand_total().ok_or(CheckoutError::NoRateSelected)?;
        if total <= Decimal::ZERO {
            return Err(CheckoutError::InvalidTotal);
        }
        let profile = self
            .inner
            .collaborators
            .identity
            .resolve_session(session_token)
            .await?;

        let payment = self.capture(session, total, payment_method).await?;
        let customer_id = self.reconcile(session, &profile).await?;
        let order_id = self.write_order(session, customer_id, payment, total).await?;
        let confirmation = self.issue_label(session, order_id, total).await?;

        session.confirmation = Some(confirmation.clone());
        session.step = CheckoutStep::Confirmation;
        Ok(confirmation)
    }

    async fn capture(
        &self,
        session: &mut CheckoutSession,
        total: Decimal,
        payment_method: &str,
    ) -> Result<PaymentOutcome, CheckoutError> {
        if let Some(payment) = &session.settlement.payment {
            return Ok(payment.clone());
        }
        let payment_method = payment_method.trim();
        if payment_method.is_empty() {
            return Err(CheckoutError::MissingPaymentMethod);
        }

        session.settlement.capture_attempts += 1;
        let scope = format!("capture-{}", session.settlement.capture_attempts);
        let request = CaptureRequest {
            amount: total,
            payment_method: payment_method.to_owned(),
            idempotency_key: session.attempt_id.idempotency_key(&scope),
            description: format!("FurniMart order {}", session.attempt_id),
        };
        let outcome = self.inner.collaborators.payments.capture(&request).await?;

        if !outcome.succeeded {
            let reason = outcome
                .failure_reason
                .unwrap_or_else(|| "Your payment was declined.".to_string());
            session.payment_failure = Some(reason.clone());
            return Err(CheckoutError::PaymentDeclined(reason));
        }
        tracing::info!(transaction_id = %outcome.transaction_id, amount = %total, "Payment captured");
        session.payment_failure = None;
        session.settlement.payment = Some(outcome.clone());
        Ok(outcome)
    }

    async fn reconcile(
        &self,
        session: &mut CheckoutSession,
        profile: &IdentityProfile,
    ) -> Result<CustomerId, CheckoutError> {
        if let Some(id) = &session.settlement.customer_id {
            return Ok(id.clone());
        }
        let (address, _) = session.shipping_inputs()?;
        let collaborators = &self.inner.collaborators;
        let reconciler = IdentityReconciler::new(
            collaborators.catalog.as_ref(),
            collaborators.identity.as_ref(),
            self.inner.settings.customer_match,
        );

        match reconciler.reconcile(profile, address).await? {
            Reconciliation::Synced(record) => {
                session.settlement.customer_id = Some(record.id.clone());
                Ok(record.id)
            }
            Reconciliation::NotYetSynced { message } => {
                Err(CheckoutError::VerificationPending(message))
            }
        }
    }

    async fn write_order(
        &self,
        session: &mut CheckoutSession,
        customer_id: CustomerId,
        payment: PaymentOutcome,
        total: Decimal,
    ) -> Result<OrderId, CheckoutError> {
        if let Some(id) = &session.settlement.order_id {
            return Ok(id.clone());
        }
        let (address, cart) = session.shipping_inputs()?;
        let shipping_cost = session
            .selected_rate()
            .ok_or(CheckoutError::NoRateSelected)?
            .amount;
        let order = NewOrder {
            attempt_id: session.attempt_id,
            customer_id,
            seller_ids: cart.seller_ids(),
            line_items: cart.lines().iter().map(OrderLine::from).collect(),
            shipping_address: address.clone(),
            payment,
            shipping_cost,
            grand_total: total,
        };

        let catalog = self.catalog();
        if !catalog.customer_exists(&order.customer_id).await? {
            return Err(CheckoutError::OrderRejected(format!(
                "customer {} does not exist",
                order.customer_id
            )));
        }
        let sellers = catalog.existing_sellers(&order.seller_ids).await?;
        if let Some(missing) = order.seller_ids.iter().find(|s| !sellers.contains(s)) {
            return Err(CheckoutError::OrderRejected(format!(
                "seller {missing} does not exist"
            )));
        }

        let id = catalog.write_order(&order).await?;
        tracing::info!(order_id = %id, "Order written");
        session.settlement.order_id = Some(id.clone());
        Ok(id)
    }

    /// Buy the label. A failure here leaves the order standing.
    async fn issue_label(
        &self,
        session: &mut CheckoutSession,
        order_id: OrderId,
        total: Decimal,
    ) -> Result<Confirmation, CheckoutError> {
        let rate = session
            .selected_rate()
            .ok_or(CheckoutError::NoRateSelected)?
            .clone();

        let label = match session.settlement.label.clone() {
            Some(label) => label,
            None => {
                let label = match self.shipping().purchase_label(&rate.id).await {
                    Ok(purchased) => IssuedLabel {
                        tracking_number: purchased.tracking_number,
                        label_url: Some(purchased.label_url),
                        status: LabelStatus::Purchased,
                    },
                    Err(e) => {
                        tracing::warn!(order_id = %order_id, error = %e, "Label purchase failed, order kept without label");
                        IssuedLabel {
                            tracking_number: NO_TRACKING.to_string(),
                            label_url: None,
                            status: LabelStatus::Failed,
                        }
                    }
                };
                session.settlement.label = Some(label.clone());
                label
            }
        };
        let (_, cart) = session.shipping_inputs()?;

        Ok(Confirmation {
            order_id,
            subtotal: cart.subtotal(),
            shipping_cost: rate.amount,
            grand_total: total,
            carrier_name: rate.carrier_name,
            service_level_name: rate.service_level_name,
            tracking_number: label.tracking_number,
            label_url: label.label_url,
            label: label.status,
        })
    }
}

/// Exclusive right to settle one checkout attempt.
///
/// Obtained from [`Checkout::claim`]. Release it after the settled session
/// is saved; an unreleased claim expires with the guard's hold.
#[must_use = "a claim must be released once the session is saved"]
pub struct SettlementClaim {
    attempt: CheckoutAttemptId,
    guard: SubmissionGuard,
}

impl SettlementClaim {
    pub async fn release(self) {
        self.guard.release(self.attempt).await;
    }
}
