//! Shared fixtures for the Optica integration tests.
//!
//! # Running Tests
//!
//! ```bash
//! # Cross-crate domain flows and in-process router tests
//! cargo test -p optica-integration-tests
//!
//! # Live tests against a running server with a seeded owner
//! OPTICA_TEST_EMAIL=dueno@andes.cl OPTICA_TEST_PASSWORD=... \
//!     cargo test -p optica-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `pos_flow` - cart repricing, totals, settlement and stock
//! - `lens_pricing` - matrix lookup, pair prices and presbyopia solutions
//! - `tenancy` - trials, plan limits and organization bootstrap rules
//! - `api` - router behaviour in-process, plus live end-to-end flows

#![allow(clippy::missing_panics_doc)]

use chrono::Utc;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde_json::{Value, json};

use optica_admin::models::Product;
use optica_core::lens::{EyeRx, LensFamily, MatrixRow, Prescription};
use optica_core::{
    LensFamilyId, LensType, OrganizationId, ProductCategory, ProductId, ProductStatus,
};

/// An active, stock-tracked frame priced tax-inclusive.
#[must_use]
pub fn product(id: i32, price: Decimal, inventory: i32) -> Product {
    let now = Utc::now();
    Product {
        id: ProductId::new(id),
        organization_id: OrganizationId::new(1),
        name: format!("Armazón {id}"),
        sku: format!("ARM-{id}"),
        category: ProductCategory::Frame,
        brand: None,
        description: None,
        price,
        tax_inclusive: true,
        inventory,
        track_inventory: true,
        status: ProductStatus::Active,
        created_at: now,
        updated_at: now,
    }
}

#[must_use]
pub fn family(id: i32, name: &str, lens_type: LensType) -> LensFamily {
    LensFamily {
        id: LensFamilyId::new(id),
        name: name.to_owned(),
        brand: None,
        lens_type,
        material: None,
        treatments: Vec::new(),
        active: true,
    }
}

/// A matrix row over `sphere` and cylinder `[-2, 0]`.
#[must_use]
pub fn row(
    sphere: (Decimal, Decimal),
    addition: Option<(Decimal, Decimal)>,
    price: Decimal,
) -> MatrixRow {
    let (addition_min, addition_max) = match addition {
        Some((min, max)) => (Some(min), Some(max)),
        None => (None, None),
    };
    MatrixRow {
        sphere_min: sphere.0,
        sphere_max: sphere.1,
        cylinder_min: Decimal::new(-2, 0),
        cylinder_max: Decimal::ZERO,
        addition_min,
        addition_max,
        price,
        cost: Decimal::ZERO,
    }
}

/// Same sphere and addition on both eyes, no cylinder.
#[must_use]
pub fn rx(sphere: Decimal, addition: Decimal) -> Prescription {
    let eye = EyeRx {
        sphere,
        addition,
        ..EyeRx::default()
    };
    Prescription {
        right: eye,
        left: eye,
    }
}

/// Base URL of a running server (configurable via environment).
#[must_use]
pub fn admin_base_url() -> String {
    std::env::var("OPTICA_TEST_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".to_string())
}

/// A client holding the session cookie of the seeded test owner.
pub async fn logged_in_client() -> Client {
    let client = Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client");

    let email = std::env::var("OPTICA_TEST_EMAIL").expect("OPTICA_TEST_EMAIL not set");
    let password = std::env::var("OPTICA_TEST_PASSWORD").expect("OPTICA_TEST_PASSWORD not set");

    let resp = client
        .post(format!("{}/api/auth/login", admin_base_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK, "login rejected");
    client
}

/// Send a JSON request and return its status and body.
pub async fn send(client: &Client, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let url = format!("{}{path}", admin_base_url());
    let request = match method {
        "GET" => client.get(url),
        "PUT" => client.put(url),
        "DELETE" => client.delete(url),
        _ => client.post(url),
    };
    let request = match body {
        Some(body) => request.json(&body),
        None => request,
    };

    let resp = request.send().await.expect("Request failed");
    let status = resp.status();
    let body = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}

/// Read a decimal field, which the API serializes as a string.
#[must_use]
pub fn amount(value: &Value) -> Decimal {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value.as_i64().map(Decimal::from))
        .expect("not an amount")
}

/// A SKU unique to this test run.
#[must_use]
pub fn unique_sku(prefix: &str) -> String {
    format!("{prefix}-{}", Utc::now().timestamp_micros())
}
