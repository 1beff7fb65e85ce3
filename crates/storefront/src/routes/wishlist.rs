//! Wishlist route handlers.

use axum::Json;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use furnimart_core::{ProductId, Wishlist, WishlistItem};

use crate::error::Result;
use crate::models::session::{load, store};
use crate::models::session_keys;

#[derive(Debug, Serialize)]
pub struct WishlistView {
    pub items: Vec<WishlistItem>,
    pub count: usize,
}

impl From<&Wishlist> for WishlistView {
    fn from(wishlist: &Wishlist) -> Self {
        Self {
            items: wishlist.items().to_vec(),
            count: wishlist.items().len(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromWishlistRequest {
    pub product_id: ProductId,
}

#[instrument(skip(session))]
pub async fn show(session: Session) -> Result<Json<WishlistView>> {
    let wishlist: Wishlist = load(&session, session_keys::WISHLIST).await?;
    Ok(Json(WishlistView::from(&wishlist)))
}

/// Save a product. Saving it twice keeps a single entry.
#[instrument(skip(session, item), fields(product_id = %item.product_id))]
pub async fn add(session: Session, Json(item): Json<WishlistItem>) -> Result<Json<WishlistView>> {
    let mut wishlist: Wishlist = load(&session, session_keys::WISHLIST).await?;
    if wishlist.add(item) {
        store(&session, session_keys::WISHLIST, &wishlist).await?;
    }
    Ok(Json(WishlistView::from(&wishlist)))
}

#[instrument(skip(session))]
pub async fn remove(
    session: Session,
    Json(request): Json<RemoveFromWishlistRequest>,
) -> Result<Json<WishlistView>> {
    let mut wishlist: Wishlist = load(&session, session_keys::WISHLIST).await?;
    if wishlist.remove(&request.product_id) {
        store(&session, session_keys::WISHLIST, &wishlist).await?;
    }
    Ok(Json(WishlistView::from(&wishlist)))
}

#[instrument(skip(session))]
pub async fn clear(session: Session) -> Result<Json<WishlistView>> {
    let wishlist = Wishlist::default();
    store(&session, session_keys::WISHLIST, &wishlist).await?;
    Ok(Json(WishlistView::from(&wishlist)))
}
