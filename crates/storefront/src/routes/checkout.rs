//! Checkout route handlers.
//!
//! Every handler loads the [`CheckoutSession`] from the browser session,
//! runs one transition and writes the session back before reporting the
//! transition's result. Progress made by a failed transition (a shrunk
//! cart awaiting acknowledgment, a captured payment) is saved to the store
//! directly, since the session layer skips server error responses.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header::AUTHORIZATION},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use furnimart_core::{
    Cart, CartLine, CheckoutAttemptId, RateId, ShippingAddress, ShippingAddressInput, ShippingRate,
};

use crate::checkout::{CheckoutError, CheckoutSession, CheckoutStep, Confirmation, RatesState};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::session::{load, store};
use crate::models::session_keys;
use crate::routes::cart::load_cart;
use crate::state::AppState;

/// Checkout display data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub attempt_id: CheckoutAttemptId,
    pub step: CheckoutStep,
    /// A settlement for this attempt is running; the pay button is disabled.
    pub processing: bool,
    pub address: Option<ShippingAddress>,
    pub lines: Vec<CartLine>,
    pub pending_shrink: Option<Vec<CartLine>>,
    /// `loading` until rates are ready. Unavailable rates stay `loading`.
    pub rates_status: &'static str,
    pub rates_message: Option<String>,
    pub rates: Vec<ShippingRate>,
    pub selected_rate: Option<RateId>,
    pub can_continue: bool,
    pub subtotal: Option<Decimal>,
    pub shipping_cost: Option<Decimal>,
    pub grand_total: Option<Decimal>,
    pub payment_failure: Option<String>,
    pub confirmation: Option<Confirmation>,
}

impl CheckoutView {
    fn new(state: &AppState, checkout: &CheckoutSession) -> Self {
        let (rates_status, rates_message) = match &checkout.rates {
            RatesState::Ready { .. } => ("ready", None),
            RatesState::NotRequested => ("loading", None),
            RatesState::Unavailable { message } => ("loading", Some(message.clone())),
        };
        let selected = checkout.selected_rate();

        Self {
            attempt_id: checkout.attempt_id,
            step: checkout.step,
            processing: state.checkout().is_processing(checkout),
            address: checkout.address.clone(),
            lines: checkout
                .cart
                .as_ref()
                .map(|c| c.lines().to_vec())
                .unwrap_or_default(),
            pending_shrink: checkout.pending_shrink.as_ref().map(|c| c.lines().to_vec()),
            rates_status,
            rates_message,
            rates: checkout.rates.rates().to_vec(),
            selected_rate: selected.map(|r| r.id.clone()),
            can_continue: checkout.step == CheckoutStep::Shipping && selected.is_some(),
            subtotal: checkout.cart.as_ref().map(furnimart_core::ValidatedCart::subtotal),
            shipping_cost: selected.map(|r| r.amount),
            grand_total: checkout.grand_total(),
            payment_failure: checkout.payment_failure.clone(),
            confirmation: checkout.confirmation.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRateRequest {
    pub rate_id: RateId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub payment_method: String,
}

async fn load_checkout(session: &Session) -> Result<CheckoutSession> {
    Ok(load(session, session_keys::CHECKOUT).await?)
}

async fn save_checkout(session: &Session, checkout: &CheckoutSession) -> Result<()> {
    Ok(store(session, session_keys::CHECKOUT, checkout).await?)
}

/// Store the attempt. After a failed transition the session is written
/// through immediately.
async fn persist(session: &Session, checkout: &CheckoutSession, failed: bool) -> Result<()> {
    save_checkout(session, checkout).await?;
    if failed {
        session.save().await?;
    }
    Ok(())
}

/// Save the attempt, then surface the transition result.
async fn finish(
    state: &AppState,
    session: &Session,
    checkout: &CheckoutSession,
    result: std::result::Result<(), CheckoutError>,
) -> Result<Json<CheckoutView>> {
    persist(session, checkout, result.is_err()).await?;
    result?;
    Ok(Json(CheckoutView::new(state, checkout)))
}

/// `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("missing session token".to_string()))
}

/// Show the current checkout.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CheckoutView>> {
    let checkout = load_checkout(&session).await?;
    Ok(Json(CheckoutView::new(&state, &checkout)))
}

/// Submit shipping details.
#[instrument(skip(state, session, input))]
pub async fn submit_details(
    State(state): State<AppState>,
    session: Session,
    Json(input): Json<ShippingAddressInput>,
) -> Result<Json<CheckoutView>> {
    let mut checkout = load_checkout(&session).await?;
    let cart = load_cart(&session).await?;
    let result = state
        .checkout()
        .submit_details(&mut checkout, &cart, input)
        .await;
    if result.is_ok() {
        add_breadcrumb("checkout", "Submitted shipping details", None);
    }
    finish(&state, &session, &checkout, result).await
}

/// Accept the lines that survived validation.
#[instrument(skip(state, session))]
pub async fn acknowledge(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CheckoutView>> {
    let mut checkout = load_checkout(&session).await?;
    let mut cart = load_cart(&session).await?;
    let result = checkout.acknowledge_shrink(&mut cart);
    if result.is_ok() {
        store(&session, session_keys::CART, &cart).await?;
    }
    finish(&state, &session, &checkout, result).await
}

/// Quote rates if none were requested for the current details, then show them.
#[instrument(skip(state, session))]
pub async fn rates(State(state): State<AppState>, session: Session) -> Result<Json<CheckoutView>> {
    let mut checkout = load_checkout(&session).await?;
    let result = state.checkout().load_rates(&mut checkout).await;
    finish(&state, &session, &checkout, result).await
}

#[instrument(skip(state, session))]
pub async fn select_rate(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<SelectRateRequest>,
) -> Result<Json<CheckoutView>> {
    let mut checkout = load_checkout(&session).await?;
    let rate_id = request.rate_id.to_string();
    let result = checkout.select_rate(request.rate_id);
    if result.is_ok() {
        add_breadcrumb(
            "checkout",
            "Selected shipping rate",
            Some(&[("rate_id", rate_id.as_str())]),
        );
    }
    finish(&state, &session, &checkout, result).await
}

#[instrument(skip(state, session))]
pub async fn continue_to_payment(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CheckoutView>> {
    let mut checkout = load_checkout(&session).await?;
    let result = checkout.continue_to_payment();
    finish(&state, &session, &checkout, result).await
}

#[instrument(skip(state, session))]
pub async fn back(State(state): State<AppState>, session: Session) -> Result<Json<CheckoutView>> {
    let mut checkout = load_checkout(&session).await?;
    let result = checkout.back_to_details();
    finish(&state, &session, &checkout, result).await
}

/// Capture payment and settle the order.
///
/// The attempt stays claimed until the settled session is saved. On success
/// the session cart is emptied.
#[instrument(skip_all)]
pub async fn pay(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Json(request): Json<PayRequest>,
) -> Result<Json<CheckoutView>> {
    let token = bearer_token(&headers)?;
    let mut checkout = load_checkout(&session).await?;
    let claim = state.checkout().claim(&checkout).await?;

    add_breadcrumb("checkout", "Submitted payment", None);
    let result = state
        .checkout()
        .settle(&claim, &mut checkout, token, &request.payment_method)
        .await;

    let saved = match &result {
        Ok(confirmation) => {
            tracing::info!(order_id = %confirmation.order_id, "Checkout complete");
            match store(&session, session_keys::CART, &Cart::default()).await {
                Ok(()) => persist(&session, &checkout, false).await,
                Err(e) => Err(e.into()),
            }
        }
        Err(_) => persist(&session, &checkout, true).await,
    };
    claim.release().await;

    saved?;
    result?;
    Ok(Json(CheckoutView::new(&state, &checkout)))
}

/// Discard the attempt and start a fresh one.
///
/// Refused while a settlement runs and once a payment is captured for an
/// order that is not yet confirmed.
#[instrument(skip(state, session))]
pub async fn restart(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<CheckoutView>> {
    let current = load_checkout(&session).await?;
    if state.checkout().is_processing(&current) {
        return Err(CheckoutError::InProgress.into());
    }
    current.ensure_discardable()?;
    session
        .remove::<CheckoutSession>(session_keys::CHECKOUT)
        .await?;

    let fresh = CheckoutSession::new();
    save_checkout(&session, &fresh).await?;
    Ok(Json(CheckoutView::new(&state, &fresh)))
}
