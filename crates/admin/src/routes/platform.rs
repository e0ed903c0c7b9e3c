//! Platform administration: tenant organizations and subscriptions.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use optica_core::OrganizationId;
use optica_core::tenancy::Subscription;

use crate::db::OrganizationRepository;
use crate::error::AppError;
use crate::middleware::RequirePlatformAdmin;
use crate::models::{
    CascadeReport, Organization, OrganizationInput, OrganizationOverview, OrganizationUpdate,
    Paginated, Pagination,
};
use crate::services::TenancyService;
use crate::services::tenancy::check_tax_rate;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/platform/organizations",
            get(index).post(create),
        )
        .route(
            "/api/platform/organizations/{id}",
            get(show).put(update).delete(destroy),
        )
        .route(
            "/api/platform/organizations/{id}/subscription",
            put(set_subscription),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// GET /api/platform/organizations
#[instrument(skip(_admin, state))]
async fn index(
    RequirePlatformAdmin(_admin): RequirePlatformAdmin,
    State(state): State<AppState>,
    Query(search): Query<SearchQuery>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<Organization>>, AppError> {
    let (organizations, total) = OrganizationRepository::new(state.pool())
        .list(search.q.as_deref(), page)
        .await?;
    Ok(Json(Paginated::new(organizations, total, page)))
}

/// POST /api/platform/organizations
#[instrument(skip(_admin, state, input))]
async fn create(
    RequirePlatformAdmin(_admin): RequirePlatformAdmin,
    State(state): State<AppState>,
    Json(input): Json<OrganizationInput>,
) -> Result<(StatusCode, Json<OrganizationOverview>), AppError> {
    let overview = TenancyService::new(state.pool())
        .create_organization(&input, state.config().default_tax_rate, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(overview)))
}

/// GET /api/platform/organizations/{id}
#[instrument(skip(_admin, state))]
async fn show(
    RequirePlatformAdmin(_admin): RequirePlatformAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrganizationId>,
) -> Result<Json<OrganizationOverview>, AppError> {
    let overview = TenancyService::new(state.pool())
        .overview(id, Utc::now())
        .await?;
    Ok(Json(overview))
}

/// PUT /api/platform/organizations/{id}
#[instrument(skip(_admin, state, input))]
async fn update(
    RequirePlatformAdmin(_admin): RequirePlatformAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrganizationId>,
    Json(input): Json<OrganizationUpdate>,
) -> Result<Json<Organization>, AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Unprocessable("organization name is required".to_string()));
    }
    check_tax_rate(input.tax_rate)?;
    let organization = OrganizationRepository::new(state.pool())
        .update(id, &input)
        .await?;
    Ok(Json(organization))
}

/// DELETE /api/platform/organizations/{id}
#[instrument(skip(_admin, state))]
async fn destroy(
    RequirePlatformAdmin(_admin): RequirePlatformAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrganizationId>,
) -> Result<Json<CascadeReport>, AppError> {
    let report = TenancyService::new(state.pool())
        .delete_organization(id)
        .await?;
    Ok(Json(report))
}

/// PUT /api/platform/organizations/{id}/subscription
#[instrument(skip(_admin, state))]
async fn set_subscription(
    RequirePlatformAdmin(_admin): RequirePlatformAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrganizationId>,
    Json(subscription): Json<Subscription>,
) -> Result<Json<OrganizationOverview>, AppError> {
    let overview = TenancyService::new(state.pool())
        .set_subscription(id, &subscription, Utc::now())
        .await?;
    Ok(Json(overview))
}
