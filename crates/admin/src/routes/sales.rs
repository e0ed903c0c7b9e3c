//! Sale history, balance payments and voids.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use tracing::instrument;

use optica_core::SaleId;

use crate::db::SaleRepository;
use crate::error::AppError;
use crate::middleware::{RequireCatalogManager, RequireTenant};
use crate::models::{
    Paginated, Pagination, PaymentRequest, Sale, SaleFilter, SaleReceipt, VoidRequest,
};
use crate::services::{CheckoutService, SaleContext};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/sales", get(index))
        .route("/api/sales/{id}", get(show))
        .route("/api/sales/{id}/payments", post(add_payment))
        .route("/api/sales/{id}/void", post(void))
}

/// GET /api/sales
#[instrument(skip(tenant, state))]
async fn index(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Query(filter): Query<SaleFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<Sale>>, AppError> {
    let (sales, total) = SaleRepository::new(state.pool())
        .list(tenant.organization_id, &filter, page)
        .await?;
    Ok(Json(Paginated::new(sales, total, page)))
}

/// GET /api/sales/{id}
#[instrument(skip(tenant, state))]
async fn show(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<SaleId>,
) -> Result<Json<Sale>, AppError> {
    SaleRepository::new(state.pool())
        .get(tenant.organization_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("sale {id}")))
}

/// POST /api/sales/{id}/payments
#[instrument(skip(tenant, state, body))]
async fn add_payment(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<SaleId>,
    Json(body): Json<PaymentRequest>,
) -> Result<Json<SaleReceipt>, AppError> {
    let receipt = CheckoutService::new(state.pool())
        .add_payment(SaleContext::from(&tenant), id, &body.payments, Utc::now())
        .await?;
    Ok(Json(receipt))
}

/// POST /api/sales/{id}/void
#[instrument(skip(tenant, state, body))]
async fn void(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Path(id): Path<SaleId>,
    Json(body): Json<VoidRequest>,
) -> Result<Json<Sale>, AppError> {
    let sale = CheckoutService::new(state.pool())
        .void(tenant.organization_id, id, &body.reason)
        .await?;
    Ok(Json(sale))
}
