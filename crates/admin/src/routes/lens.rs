//! Lens family, price matrix and pricing handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use tracing::{info, instrument};

use optica_core::LensFamilyId;
use optica_core::lens::{LensFamily, MatrixRow, PairPrice, Solution};

use crate::db::LensRepository;
use crate::error::AppError;
use crate::middleware::{RequireCatalogManager, RequireTenant};
use crate::models::{LensFamilyInput, LensMatrix, LensPriceRequest, SolutionsRequest};
use crate::services::LensService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/lens/families", get(families).post(create_family))
        .route("/api/lens/families/{id}", get(family).put(update_family))
        .route(
            "/api/lens/families/{id}/matrix",
            get(matrix).put(replace_matrix),
        )
        .route("/api/lens/price", post(price))
        .route("/api/lens/solutions", post(solutions))
}

fn clean(mut input: LensFamilyInput) -> Result<LensFamilyInput, AppError> {
    input.name = input.name.trim().to_string();
    if input.name.is_empty() {
        return Err(AppError::Unprocessable("lens family name is required".to_string()));
    }
    input.treatments = input
        .treatments
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    input.treatments.dedup();
    Ok(input)
}

/// GET /api/lens/families
#[instrument(skip(tenant, state))]
async fn families(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
) -> Result<Json<Vec<LensFamily>>, AppError> {
    let families = LensRepository::new(state.pool())
        .families(tenant.organization_id)
        .await?;
    Ok(Json(families))
}

/// GET /api/lens/families/{id}
#[instrument(skip(tenant, state))]
async fn family(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<LensFamilyId>,
) -> Result<Json<LensFamily>, AppError> {
    LensRepository::new(state.pool())
        .family(tenant.organization_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("lens family {id}")))
}

/// POST /api/lens/families
#[instrument(skip(tenant, state, input))]
async fn create_family(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Json(input): Json<LensFamilyInput>,
) -> Result<(StatusCode, Json<LensFamily>), AppError> {
    let input = clean(input)?;
    let family = LensRepository::new(state.pool())
        .create_family(tenant.organization_id, &input)
        .await?;
    info!(family = %family.id, name = %family.name, "Lens family created");
    Ok((StatusCode::CREATED, Json(family)))
}

/// PUT /api/lens/families/{id}
#[instrument(skip(tenant, state, input))]
async fn update_family(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Path(id): Path<LensFamilyId>,
    Json(input): Json<LensFamilyInput>,
) -> Result<Json<LensFamily>, AppError> {
    let input = clean(input)?;
    let family = LensRepository::new(state.pool())
        .update_family(tenant.organization_id, id, &input)
        .await?;
    Ok(Json(family))
}

/// GET /api/lens/families/{id}/matrix
#[instrument(skip(tenant, state))]
async fn matrix(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<LensFamilyId>,
) -> Result<Json<LensMatrix>, AppError> {
    let matrix = LensService::new(state.pool(), state.lens_cache())
        .matrix(tenant.organization_id, id)
        .await?;
    Ok(Json(matrix))
}

/// PUT /api/lens/families/{id}/matrix
#[instrument(skip(tenant, state, rows), fields(rows = rows.len()))]
async fn replace_matrix(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Path(id): Path<LensFamilyId>,
    Json(rows): Json<Vec<MatrixRow>>,
) -> Result<Json<LensMatrix>, AppError> {
    let matrix = LensService::new(state.pool(), state.lens_cache())
        .replace_matrix(tenant.organization_id, id, &rows)
        .await?;
    Ok(Json(matrix))
}

/// POST /api/lens/price
#[instrument(skip(tenant, state, body), fields(family = %body.family_id))]
async fn price(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Json(body): Json<LensPriceRequest>,
) -> Result<Json<PairPrice>, AppError> {
    let price = LensService::new(state.pool(), state.lens_cache())
        .price(tenant.organization_id, body.family_id, &body.prescription)
        .await?;
    Ok(Json(price))
}

/// POST /api/lens/solutions
#[instrument(skip(tenant, state, body))]
async fn solutions(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Json(body): Json<SolutionsRequest>,
) -> Result<Json<Vec<Solution>>, AppError> {
    let solutions = LensService::new(state.pool(), state.lens_cache())
        .solutions(tenant.organization_id, &body.prescription)
        .await?;
    Ok(Json(solutions))
}
