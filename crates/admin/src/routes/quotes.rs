//! Quote handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use tracing::instrument;

use optica_core::QuoteId;

use crate::db::QuoteRepository;
use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::{
    ConvertQuoteRequest, Paginated, Pagination, Quote, QuoteFilter, QuoteInput,
    QuoteStatusRequest, SaleReceipt,
};
use crate::services::{QuoteService, SaleContext};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/quotes", get(index).post(create))
        .route("/api/quotes/{id}", get(show))
        .route("/api/quotes/{id}/status", post(set_status))
        .route("/api/quotes/{id}/convert", post(convert))
}

/// GET /api/quotes
#[instrument(skip(tenant, state))]
async fn index(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Query(filter): Query<QuoteFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<Quote>>, AppError> {
    let (quotes, total) = QuoteRepository::new(state.pool())
        .list(tenant.organization_id, &filter, page)
        .await?;
    Ok(Json(Paginated::new(quotes, total, page)))
}

/// GET /api/quotes/{id}
#[instrument(skip(tenant, state))]
async fn show(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<QuoteId>,
) -> Result<Json<Quote>, AppError> {
    QuoteRepository::new(state.pool())
        .get(tenant.organization_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("quote {id}")))
}

/// POST /api/quotes
#[instrument(skip(tenant, state, input))]
async fn create(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Json(input): Json<QuoteInput>,
) -> Result<(StatusCode, Json<Quote>), AppError> {
    let quote = QuoteService::new(state.pool())
        .create(SaleContext::from(&tenant), &input, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

/// POST /api/quotes/{id}/status
#[instrument(skip(tenant, state))]
async fn set_status(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<QuoteId>,
    Json(body): Json<QuoteStatusRequest>,
) -> Result<Json<Quote>, AppError> {
    let quote = QuoteService::new(state.pool())
        .transition(tenant.organization_id, id, body.status, Utc::now().date_naive())
        .await?;
    Ok(Json(quote))
}

/// POST /api/quotes/{id}/convert
#[instrument(skip(tenant, state, body))]
async fn convert(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<QuoteId>,
    Json(body): Json<ConvertQuoteRequest>,
) -> Result<(StatusCode, Json<SaleReceipt>), AppError> {
    let receipt = QuoteService::new(state.pool())
        .convert(SaleContext::from(&tenant), id, &body, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
