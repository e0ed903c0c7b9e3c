//! Customer and prescription handlers.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use tracing::{info, instrument};

use optica_core::{CustomerId, PrescriptionId};

use crate::db::CustomerRepository;
use crate::error::AppError;
use crate::middleware::RequireTenant;
use crate::models::{
    Customer, CustomerInput, Paginated, Pagination, PrescriptionInput, PrescriptionRecord,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/customers", get(index).post(create))
        .route("/api/customers/{id}", get(show).put(update))
        .route(
            "/api/customers/{id}/prescriptions",
            get(prescriptions).post(add_prescription),
        )
        .route("/api/prescriptions/{id}", get(prescription))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

fn clean(mut input: CustomerInput) -> Result<CustomerInput, AppError> {
    input.name = input.name.trim().to_string();
    if input.name.is_empty() {
        return Err(AppError::Unprocessable("customer name is required".to_string()));
    }
    let blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    input.phone = blank(input.phone);
    input.business_name = blank(input.business_name);
    input.business_activity = blank(input.business_activity);
    input.address = blank(input.address);
    Ok(input)
}

/// GET /api/customers
#[instrument(skip(tenant, state))]
async fn index(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Query(search): Query<SearchQuery>,
    Query(page): Query<Pagination>,
) -> Result<Json<Paginated<Customer>>, AppError> {
    let (customers, total) = CustomerRepository::new(state.pool())
        .search(tenant.organization_id, search.q.as_deref(), page)
        .await?;
    Ok(Json(Paginated::new(customers, total, page)))
}

/// GET /api/customers/{id}
#[instrument(skip(tenant, state))]
async fn show(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<Customer>, AppError> {
    CustomerRepository::new(state.pool())
        .get(tenant.organization_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("customer {id}")))
}

/// POST /api/customers
#[instrument(skip(tenant, state, input))]
async fn create(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Json(input): Json<CustomerInput>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    let input = clean(input)?;
    let customer = CustomerRepository::new(state.pool())
        .create(tenant.organization_id, &input)
        .await?;
    info!(customer = %customer.id, "Customer created");
    Ok((StatusCode::CREATED, Json(customer)))
}

/// PUT /api/customers/{id}
#[instrument(skip(tenant, state, input))]
async fn update(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Json(input): Json<CustomerInput>,
) -> Result<Json<Customer>, AppError> {
    let input = clean(input)?;
    let customer = CustomerRepository::new(state.pool())
        .update(tenant.organization_id, id, &input)
        .await?;
    Ok(Json(customer))
}

/// GET /api/customers/{id}/prescriptions
#[instrument(skip(tenant, state))]
async fn prescriptions(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
) -> Result<Json<Vec<PrescriptionRecord>>, AppError> {
    let repo = CustomerRepository::new(state.pool());
    repo.get(tenant.organization_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("customer {id}")))?;
    Ok(Json(repo.prescriptions(tenant.organization_id, id).await?))
}

/// POST /api/customers/{id}/prescriptions
#[instrument(skip(tenant, state, input))]
async fn add_prescription(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<CustomerId>,
    Json(input): Json<PrescriptionInput>,
) -> Result<(StatusCode, Json<PrescriptionRecord>), AppError> {
    input.rx.validate()?;
    let record = CustomerRepository::new(state.pool())
        .create_prescription(tenant.organization_id, id, &input, tenant.user.id)
        .await?;
    info!(customer = %id, prescription = %record.id, "Prescription recorded");
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/prescriptions/{id}
#[instrument(skip(tenant, state))]
async fn prescription(
    RequireTenant(tenant): RequireTenant,
    State(state): State<AppState>,
    Path(id): Path<PrescriptionId>,
) -> Result<Json<PrescriptionRecord>, AppError> {
    CustomerRepository::new(state.pool())
        .prescription(tenant.organization_id, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("prescription {id}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_drops_blank_optional_fields() {
        let input = CustomerInput {
            name: " Camila Rojas ".into(),
            rut: None,
            email: None,
            phone: Some("  ".into()),
            business_name: Some(" Óptica Norte SpA ".into()),
            business_activity: None,
            address: None,
        };
        let cleaned = clean(input).unwrap();
        assert_eq!(cleaned.name, "Camila Rojas");
        assert_eq!(cleaned.phone, None);
        assert_eq!(cleaned.business_name.as_deref(), Some("Óptica Norte SpA"));
    }

    #[test]
    fn test_clean_requires_name() {
        let input = CustomerInput {
            name: "   ".into(),
            rut: None,
            email: None,
            phone: None,
            business_name: None,
            business_activity: None,
            address: None,
        };
        assert!(matches!(clean(input), Err(AppError::Unprocessable(_))));
    }
}
