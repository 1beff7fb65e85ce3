//! Cart route handlers.
//!
//! The cart lives in the session. Prices submitted here are only what the
//! shopper saw; checkout re-prices every line against the catalog.

use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use furnimart_core::{Cart, CartLine, ProductId, format_amount};

use crate::checkout::CheckoutSession;
use crate::error::{AppError, Result};
use crate::models::session::{load, store};
use crate::models::session_keys;

/// Cart display data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub item_count: u64,
    pub subtotal: Decimal,
    pub formatted_subtotal: String,
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            lines: cart.lines().to_vec(),
            item_count: cart.item_count(),
            subtotal: cart.subtotal(),
            formatted_subtotal: format_amount(cart.subtotal()),
        }
    }
}

/// Update quantity request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub product_id: ProductId,
    /// Zero or less removes the line.
    pub quantity: i64,
}

/// Remove line request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartRequest {
    pub product_id: ProductId,
}

/// Replace-all request.
#[derive(Debug, Deserialize)]
pub struct ReplaceCartRequest {
    pub lines: Vec<CartLine>,
}

/// Load the session cart.
pub(crate) async fn load_cart(session: &Session) -> Result<Cart> {
    Ok(load(session, session_keys::CART).await?)
}

/// Persist the cart and tell any running checkout attempt about the edit.
pub(crate) async fn save_cart(session: &Session, cart: &Cart) -> Result<()> {
    store(session, session_keys::CART, cart).await?;
    if let Some(mut checkout) = session
        .get::<CheckoutSession>(session_keys::CHECKOUT)
        .await?
    {
        checkout.cart_changed();
        store(session, session_keys::CHECKOUT, &checkout).await?;
    }
    Ok(())
}

/// Display the cart.
#[instrument(skip(session))]
pub async fn show(session: Session) -> Result<Json<CartView>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Add a line. An existing line for the same product gains the quantity.
#[instrument(skip(session, line), fields(product_id = %line.product_id))]
pub async fn add(session: Session, Json(line): Json<CartLine>) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.add(line)?;
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Set a line's quantity.
#[instrument(skip(session))]
pub async fn update(
    session: Session,
    Json(request): Json<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    if cart
        .update_quantity(&request.product_id, request.quantity)?
        .is_none()
    {
        return Err(AppError::NotFound(format!(
            "product {} is not in the cart",
            request.product_id
        )));
    }
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Remove a line. Removing an absent product is a no-op.
#[instrument(skip(session))]
pub async fn remove(
    session: Session,
    Json(request): Json<RemoveFromCartRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    if cart.remove(&request.product_id) {
        save_cart(&session, &cart).await?;
    }
    Ok(Json(CartView::from(&cart)))
}

/// Empty the cart.
#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Json<CartView>> {
    let cart = Cart::default();
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::from(&cart)))
}

/// Replace every line.
#[instrument(skip(session, request), fields(lines = request.lines.len()))]
pub async fn replace(
    session: Session,
    Json(request): Json<ReplaceCartRequest>,
) -> Result<Json<CartView>> {
    let cart = Cart::from_lines(request.lines)?;
    save_cart(&session, &cart).await?;
    Ok(Json(CartView::from(&cart)))
}
