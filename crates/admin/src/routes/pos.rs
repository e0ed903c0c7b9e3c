//! POS handlers: cart preview and checkout.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use chrono::Utc;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::{CartPreview, CartRequest, CheckoutRequest, SaleReceipt};
use crate::services::{CheckoutService, SaleContext};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/pos/preview", post(preview))
        .route("/api/pos/sales", post(checkout))
}

/// POST /api/pos/preview
///
/// Reprices the cart from the catalog. Nothing is stored.
#[instrument(skip(tenant, state, cart), fields(lines = cart.lines.len()))]
async fn preview(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Json(cart): Json<CartRequest>,
) -> Result<Json<CartPreview>, AppError> {
    let preview = CheckoutService::new(state.pool())
        .preview(tenant.organization_id, &cart)
        .await?;
    Ok(Json(preview))
}

/// POST /api/pos/sales
#[instrument(skip(tenant, state, body), fields(lines = body.cart.lines.len(), document = %body.document_type))]
async fn checkout(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<SaleReceipt>), AppError> {
    let receipt = CheckoutService::new(state.pool())
        .checkout(SaleContext::from(&tenant), &body, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
