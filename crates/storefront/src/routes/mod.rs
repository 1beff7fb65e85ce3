//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness
//! GET  /health/ready               - Database readiness
//!
//! # Cart
//! GET  /cart                       - Cart view
//! PUT  /cart                       - Replace all lines
//! POST /cart/add                   - Add a line (merges same product)
//! POST /cart/update                - Set a line's quantity
//! POST /cart/remove                - Remove a line
//! POST /cart/clear                 - Empty the cart
//!
//! # Wishlist
//! GET  /wishlist                   - Wishlist view
//! POST /wishlist/add               - Save a product
//! POST /wishlist/remove            - Unsave a product
//! POST /wishlist/clear             - Empty the wishlist
//!
//! # Checkout
//! GET  /checkout                   - Current checkout view
//! POST /checkout/details           - Submit shipping details
//! POST /checkout/acknowledge       - Accept a shrunk cart
//! GET  /checkout/rates             - Quote (once) and show rates
//! POST /checkout/rates/select      - Select a rate
//! POST /checkout/continue          - Shipping -> payment
//! POST /checkout/back              - Back to details
//! POST /checkout/pay               - Capture and settle (Bearer identity token)
//! POST /checkout/restart           - Discard the attempt
//!
//! # API
//! POST /api/orders/status          - Order status webhook (x-webhook-secret)
//! GET  /api/track/{carrier}/{number} - Shipment tracking
//! ```

pub mod api;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod wishlist;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).put(cart::replace))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::show))
        .route("/add", post(wishlist::add))
        .route("/remove", post(wishlist::remove))
        .route("/clear", post(wishlist::clear))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show))
        .route("/details", post(checkout::submit_details))
        .route("/acknowledge", post(checkout::acknowledge))
        .route("/rates", get(checkout::rates))
        .route("/rates/select", post(checkout::select_rate))
        .route("/continue", post(checkout::continue_to_payment))
        .route("/back", post(checkout::back))
        .route("/pay", post(checkout::pay))
        .route("/restart", post(checkout::restart))
}

/// Create the machine-facing API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/status", post(api::orders::update_status))
        .route("/track/{carrier}/{tracking_number}", get(api::tracking::track))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/cart", cart_routes())
        .nest("/wishlist", wishlist_routes())
        .nest("/checkout", checkout_routes())
        .nest("/api", api_routes())
}
