//! Product catalog handlers, including bulk actions.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use optica_core::catalog::{BulkOutcome, CatalogError, PriceAdjustment, normalize_sku, validate_price};
use optica_core::{OrganizationId, ProductCategory, ProductId, ProductStatus};

use crate::db::ProductRepository;
use crate::error::AppError;
use crate::middleware::{RequireCatalogManager, RequireTenant};
use crate::models::{Paginated, Pagination, Product, ProductFilter, ProductInput};
use crate::state::AppState;

/// Most ids accepted by one bulk request.
pub const MAX_BULK_IDS: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/products", get(index).post(create))
        .route("/api/products/{id}", get(show).put(update))
        .route("/api/products/{id}/archive", post(archive))
        .route("/api/products/{id}/restore", post(restore))
        .route("/api/products/{id}/stock", post(adjust_stock))
        .route("/api/products/bulk/archive", post(bulk_archive))
        .route("/api/products/bulk/restore", post(bulk_restore))
        .route("/api/products/bulk/price", post(bulk_price))
        .route("/api/products/bulk/category", post(bulk_category))
}

#[derive(Debug, Deserialize)]
pub struct StockRequest {
    pub delta: i32,
}

#[derive(Debug, Deserialize)]
pub struct BulkIdsRequest {
    pub ids: Vec<ProductId>,
}

#[derive(Debug, Deserialize)]
pub struct BulkPriceRequest {
    pub ids: Vec<ProductId>,
    pub adjustment: PriceAdjustment,
}

#[derive(Debug, Deserialize)]
pub struct BulkCategoryRequest {
    pub ids: Vec<ProductId>,
    pub category: ProductCategory,
}

/// Trim and canonicalize a product before it is stored.
///
/// # Errors
///
/// Returns a catalog error for an empty name or SKU, a price that is
/// negative, fractional or too large, or negative starting stock.
pub fn normalize(mut input: ProductInput) -> Result<ProductInput, CatalogError> {
    input.name = input.name.trim().to_string();
    if input.name.is_empty() {
        return Err(CatalogError::EmptyName);
    }
    input.sku = normalize_sku(&input.sku)?;
    validate_price(input.price)?;
    if input.inventory < 0 {
        return Err(CatalogError::NegativeInventory {
            available: 0,
            delta: input.inventory,
        });
    }
    input.brand = input.brand.map(|b| b.trim().to_string()).filter(|b| !b.is_empty());
    input.description = input.description.filter(|d| !d.trim().is_empty());
    Ok(input)
}

fn check_bulk(ids: &[ProductId]) -> Result<(), AppError> {
    if ids.is_empty() {
        return Err(AppError::BadRequest("no products selected".to_string()));
    }
    if ids.len() > MAX_BULK_IDS {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_BULK_IDS} products per request"
        )));
    }
    Ok(())
}

/// 200 when every item succeeded, 207 otherwise.
fn bulk_response(action: &str, outcome: BulkOutcome) -> Response {
    if outcome.is_complete() {
        info!(action, count = outcome.succeeded.len(), "Bulk product action completed");
        (StatusCode::OK, Json(outcome)).into_response()
    } else {
        warn!(
            action,
            success = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Bulk product action completed with errors"
        );
        (StatusCode::MULTI_STATUS, Json(outcome)).into_response()
    }
}

// =============================================================================
// Single Product
// =============================================================================

/// GET /api/products
#[instrument(skip(tenant, state))]
async fn index(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<Product>>, AppError> {
    let (products, total) = ProductRepository::new(state.pool())
        .search(tenant.organization_id, &filter, page)
        .await?;
    Ok(Json(Paginated::new(products, total, page)))
}

/// GET /api/products/{id}
#[instrument(skip(tenant, state))]
async fn show(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    ProductRepository::new(state.pool())
        .get(tenant.organization_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// POST /api/products
#[instrument(skip(tenant, state, input))]
async fn create(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let input = normalize(input)?;
    let product = ProductRepository::new(state.pool())
        .create(tenant.organization_id, &input)
        .await?;
    info!(product = %product.id, sku = %product.sku, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/{id}
#[instrument(skip(tenant, state, input))]
async fn update(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, AppError> {
    let input = normalize(input)?;
    let product = ProductRepository::new(state.pool())
        .update(tenant.organization_id, id, &input)
        .await?;
    Ok(Json(product))
}

async fn set_status(
    state: &AppState,
    org: OrganizationId,
    id: ProductId,
    status: ProductStatus,
) -> Result<Json<Product>, AppError> {
    let repo = ProductRepository::new(state.pool());
    repo.set_status(org, id, status).await?;
    repo.get(org, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// POST /api/products/{id}/archive
#[instrument(skip(tenant, state))]
async fn archive(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    set_status(&state, tenant.organization_id, id, ProductStatus::Archived).await
}

/// POST /api/products/{id}/restore
#[instrument(skip(tenant, state))]
async fn restore(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>, AppError> {
    set_status(&state, tenant.organization_id, id, ProductStatus::Active).await
}

/// POST /api/products/{id}/stock
#[instrument(skip(tenant, state))]
async fn adjust_stock(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(body): Json<StockRequest>,
) -> Result<Json<Product>, AppError> {
    let repo = ProductRepository::new(state.pool());
    let inventory = repo
        .adjust_stock(tenant.organization_id, id, body.delta)
        .await?;
    info!(product = %id, delta = body.delta, inventory, "Stock adjusted");

    repo.get(tenant.organization_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

// =============================================================================
// Bulk Actions
// =============================================================================

async fn bulk_status(
    state: &AppState,
    org: OrganizationId,
    ids: &[ProductId],
    status: ProductStatus,
) -> Result<BulkOutcome, AppError> {
    check_bulk(ids)?;
    let repo = ProductRepository::new(state.pool());

    let mut outcome = BulkOutcome::default();
    for &id in ids {
        outcome.record(id, repo.set_status(org, id, status).await);
    }
    Ok(outcome)
}

/// POST /api/products/bulk/archive
#[instrument(skip(tenant, state, body), fields(count = body.ids.len()))]
async fn bulk_archive(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Json(body): Json<BulkIdsRequest>,
) -> Result<Response, AppError> {
    let outcome =
        bulk_status(&state, tenant.organization_id, &body.ids, ProductStatus::Archived).await?;
    Ok(bulk_response("archive", outcome))
}

/// POST /api/products/bulk/restore
#[instrument(skip(tenant, state, body), fields(count = body.ids.len()))]
async fn bulk_restore(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Json(body): Json<BulkIdsRequest>,
) -> Result<Response, AppError> {
    let outcome =
        bulk_status(&state, tenant.organization_id, &body.ids, ProductStatus::Active).await?;
    Ok(bulk_response("restore", outcome))
}

/// POST /api/products/bulk/price
#[instrument(skip(tenant, state, body), fields(count = body.ids.len()))]
async fn bulk_price(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Json(body): Json<BulkPriceRequest>,
) -> Result<Response, AppError> {
    check_bulk(&body.ids)?;
    let repo = ProductRepository::new(state.pool());

    let mut outcome = BulkOutcome::default();
    for &id in &body.ids {
        let result = repo
            .adjust_price(tenant.organization_id, id, body.adjustment)
            .await
            .map(|_| ());
        outcome.record(id, result);
    }
    Ok(bulk_response("price", outcome))
}

/// POST /api/products/bulk/category
#[instrument(skip(tenant, state, body), fields(count = body.ids.len()))]
async fn bulk_category(
    RequireCatalogManager(tenant): RequireCatalogManager,
    State(state): State<AppState>,
    Json(body): Json<BulkCategoryRequest>,
) -> Result<Response, AppError> {
    check_bulk(&body.ids)?;
    let repo = ProductRepository::new(state.pool());

    let mut outcome = BulkOutcome::default();
    for &id in &body.ids {
        outcome.record(
            id,
            repo.set_category(tenant.organization_id, id, body.category).await,
        );
    }
    Ok(bulk_response("category", outcome))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn input() -> ProductInput {
        ProductInput {
            name: "  Ray-Ban Aviator ".to_string(),
            sku: " rb 3025 ".to_string(),
            category: ProductCategory::Sunglasses,
            brand: Some(" ".to_string()),
            description: None,
            price: dec!(129990),
            tax_inclusive: true,
            inventory: 4,
            track_inventory: true,
        }
    }

    #[test]
    fn test_normalize_trims_and_canonicalizes() {
        let product = normalize(input()).unwrap();
        assert_eq!(product.name, "Ray-Ban Aviator");
        assert_eq!(product.sku, "RB3025");
        assert_eq!(product.brand, None);
    }

    #[test]
    fn test_normalize_rejects_bad_input() {
        let mut bad = input();
        bad.name = "   ".into();
        assert_eq!(normalize(bad).unwrap_err(), CatalogError::EmptyName);

        let mut bad = input();
        bad.price = dec!(990.5);
        assert_eq!(normalize(bad).unwrap_err(), CatalogError::FractionalPrice);

        let mut bad = input();
        bad.price = dec!(1_000_000_000_000);
        assert_eq!(normalize(bad).unwrap_err(), CatalogError::PriceOutOfRange);

        let mut bad = input();
        bad.inventory = -1;
        assert!(normalize(bad).is_err());
    }

    #[test]
    fn test_bulk_limits() {
        assert!(check_bulk(&[]).is_err());
        assert!(check_bulk(&[ProductId::new(1)]).is_ok());
        let many: Vec<_> = (0..=i32::try_from(MAX_BULK_IDS).unwrap()).map(ProductId::new).collect();
        assert!(check_bulk(&many).is_err());
    }

    #[test]
    fn test_partial_bulk_is_multi_status() {
        let mut outcome = BulkOutcome::default();
        outcome.record::<String>(ProductId::new(1), Ok(()));
        assert_eq!(bulk_response("archive", outcome.clone()).status(), StatusCode::OK);

        outcome.record(ProductId::new(2), Err("not found"));
        assert_eq!(bulk_response("archive", outcome).status(), StatusCode::MULTI_STATUS);
    }
}
