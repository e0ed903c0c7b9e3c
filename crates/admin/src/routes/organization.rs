//! The caller's own organization: overview, branches and users.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use chrono::Utc;
use tracing::instrument;

use optica_core::{BranchId, UserId};

use crate::db::{OrganizationRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::{RequireOwner, RequireTenant};
use crate::models::{Branch, BranchInput, OrganizationOverview, User, UserInput, UserUpdate};
use crate::services::TenancyService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/organization", get(overview))
        .route("/api/branches", get(branches).post(create_branch))
        .route("/api/branches/{id}", put(update_branch))
        .route("/api/users", get(users).post(create_user))
        .route("/api/users/{id}", put(update_user))
}

/// GET /api/organization
#[instrument(skip(tenant, state))]
async fn overview(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
) -> Result<Json<OrganizationOverview>, AppError> {
    let overview = TenancyService::new(state.pool())
        .overview(tenant.organization_id, Utc::now())
        .await?;
    Ok(Json(overview))
}

/// GET /api/branches
#[instrument(skip(tenant, state))]
async fn branches(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
) -> Result<Json<Vec<Branch>>, AppError> {
    let branches = OrganizationRepository::new(state.pool())
        .list_branches(tenant.organization_id)
        .await?;
    Ok(Json(branches))
}

/// POST /api/branches
#[instrument(skip(tenant, state, input))]
async fn create_branch(
    RequireOwner(tenant): RequireOwner,
    State(state): State<AppState>,
    Json(input): Json<BranchInput>,
) -> Result<(StatusCode, Json<Branch>), AppError> {
    let branch = TenancyService::new(state.pool())
        .add_branch(tenant.organization_id, &input, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(branch)))
}

/// PUT /api/branches/{id}
#[instrument(skip(tenant, state, input))]
async fn update_branch(
    RequireOwner(tenant): RequireOwner,
    State(state): State<AppState>,
    Path(id): Path<BranchId>,
    Json(input): Json<BranchInput>,
) -> Result<Json<Branch>, AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Unprocessable("branch name is required".to_string()));
    }
    let branch = OrganizationRepository::new(state.pool())
        .update_branch(tenant.organization_id, id, &input)
        .await?;
    Ok(Json(branch))
}

/// GET /api/users
#[instrument(skip(tenant, state))]
async fn users(
    RequireOwner(tenant): RequireOwner,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = UserRepository::new(state.pool())
        .list(tenant.organization_id)
        .await?;
    Ok(Json(users))
}

/// POST /api/users
#[instrument(skip(tenant, state, input))]
async fn create_user(
    RequireOwner(tenant): RequireOwner,
    State(state): State<AppState>,
    Json(input): Json<UserInput>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = TenancyService::new(state.pool())
        .add_user(tenant.organization_id, &input, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /api/users/{id}
#[instrument(skip(tenant, state, input))]
async fn update_user(
    RequireOwner(tenant): RequireOwner,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(input): Json<UserUpdate>,
) -> Result<Json<User>, AppError> {
    if id == tenant.user.id && (!input.active || input.role != tenant.user.role) {
        return Err(AppError::Forbidden(
            "you cannot deactivate yourself or change your own role".to_string(),
        ));
    }
    let user = TenancyService::new(state.pool())
        .update_user(tenant.organization_id, id, &input, Utc::now())
        .await?;
    Ok(Json(user))
}
