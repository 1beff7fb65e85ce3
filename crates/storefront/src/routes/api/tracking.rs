//! Shipment tracking lookup.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::instrument;

use furnimart_core::TrackingStatus;

use crate::error::Result;
use crate::state::AppState;

#[instrument(skip(state))]
pub async fn track(
    State(state): State<AppState>,
    Path((carrier, tracking_number)): Path<(String, String)>,
) -> Result<Json<TrackingStatus>> {
    let status = state
        .checkout()
        .shipping()
        .track(&carrier, &tracking_number)
        .await?;
    Ok(Json(status))
}
