//! API behaviour: the assembled application in-process, and end-to-end
//! flows against a running server.
//!
//! The live tests need a migrated database, the server running
//! (`cargo run -p optica-admin`) and an owner seeded with
//! `optica-cli user create`:
//!
//! ```bash
//! OPTICA_TEST_EMAIL=... OPTICA_TEST_PASSWORD=... cargo test -p optica-integration-tests -- --ignored
//! ```

use axum::body::Body;
use axum::http::{Request, StatusCode as AxumStatus};
use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use optica_admin::config::AdminConfig;
use optica_admin::middleware::create_session_layer;
use optica_admin::state::AppState;
use optica_integration_tests::{admin_base_url, amount, logged_in_client, send, unique_sku};

const DATABASE_URL: &str = "postgres://optica@localhost/optica_test";

fn app() -> axum::Router {
    let config = AdminConfig {
        database_url: SecretString::from(DATABASE_URL),
        host: "127.0.0.1".parse().unwrap(),
        port: 3001,
        base_url: "http://localhost:3001".to_string(),
        session_secret: SecretString::from("k7Q!v9Zr#2mWx8Lp$4Nd6Tb@1Hs0Yf&3"),
        default_tax_rate: optica_core::DEFAULT_TAX_RATE,
        log_json: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    };
    let pool = PgPoolOptions::new().connect_lazy(DATABASE_URL).unwrap();
    let sessions = create_session_layer(&pool, &config).unwrap();
    optica_admin::app(AppState::new(config, pool), sessions)
}

// ============================================================================
// In-process
// ============================================================================

#[tokio::test]
async fn test_health_through_full_stack() {
    let resp = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), AxumStatus::OK);
}

#[tokio::test]
async fn test_requests_without_cookie_are_unauthorized() {
    for uri in [
        "/api/auth/me",
        "/api/sales",
        "/api/quotes",
        "/api/users",
        "/api/platform/organizations",
    ] {
        let resp = app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), AxumStatus::UNAUTHORIZED, "{uri}");
    }
}

// ============================================================================
// Live server
// ============================================================================

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_login_rejects_wrong_password() {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/auth/login", admin_base_url()))
        .json(&json!({ "email": "nadie@optica.cl", "password": "incorrecta-123" }))
        .send()
        .await
        .expect("Failed to send login");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_sale_and_void_round_trip_stock() {
    let client = logged_in_client().await;
    let sku = unique_sku("IT-FRAME");

    let (status, product) = send(
        &client,
        "POST",
        "/api/products",
        Some(json!({
            "name": "Armazón de prueba",
            "sku": sku,
            "category": "frame",
            "price": "11900",
            "inventory": 3
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{product}");
    let product_id = product["id"].as_i64().unwrap();

    let (status, receipt) = send(
        &client,
        "POST",
        "/api/pos/sales",
        Some(json!({
            "lines": [{ "product_id": product_id, "quantity": 2 }],
            "payments": [{ "method": "cash", "amount": "30000" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["sale"]["status"], "paid");
    assert_eq!(amount(&receipt["sale"]["total"]), 23800.into());
    assert_eq!(amount(&receipt["settlement"]["change"]), 6200.into());

    let path = format!("/api/products/{product_id}");
    let (_, product) = send(&client, "GET", &path, None).await;
    assert_eq!(product["inventory"], 1);

    // Only one unit left.
    let (status, _) = send(
        &client,
        "POST",
        "/api/pos/sales",
        Some(json!({
            "lines": [{ "product_id": product_id, "quantity": 2 }],
            "payments": [{ "method": "cash", "amount": "30000" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let sale_id = receipt["sale"]["id"].as_i64().unwrap();
    let (status, sale) = send(
        &client,
        "POST",
        &format!("/api/sales/{sale_id}/void"),
        Some(json!({ "reason": "prueba de integración" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{sale}");
    assert_eq!(sale["status"], "voided");

    let (_, product) = send(&client, "GET", &path, None).await;
    assert_eq!(product["inventory"], 3);

    let (status, _) = send(
        &client,
        "POST",
        &format!("/api/sales/{sale_id}/void"),
        Some(json!({ "reason": "otra vez" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_quote_converts_once() {
    let client = logged_in_client().await;

    let (status, product) = send(
        &client,
        "POST",
        "/api/products",
        Some(json!({
            "name": "Estuche",
            "sku": unique_sku("IT-CASE"),
            "category": "accessory",
            "price": "4990",
            "track_inventory": false
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{product}");

    let (status, quote) = send(
        &client,
        "POST",
        "/api/quotes",
        Some(json!({
            "lines": [{
                "product_id": product["id"],
                "quantity": 2,
                "discount": { "kind": "amount", "value": "980" }
            }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{quote}");
    assert_eq!(quote["status"], "draft");
    assert_eq!(amount(&quote["totals"]["total"]), 9000.into());

    let convert = format!("/api/quotes/{}/convert", quote["id"]);
    let payment = json!({ "payments": [{ "method": "debit", "amount": "9000" }] });

    let (status, receipt) = send(&client, "POST", &convert, Some(payment.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["sale"]["quote_id"], quote["id"]);

    let (status, _) = send(&client, "POST", &convert, Some(payment)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_lens_matrix_prices_prescriptions() {
    let client = logged_in_client().await;

    let (status, family) = send(
        &client,
        "POST",
        "/api/lens/families",
        Some(json!({
            "name": unique_sku("Monofocal IT"),
            "lens_type": "single_vision"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{family}");
    let family_id = family["id"].as_i64().unwrap();

    let (status, matrix) = send(
        &client,
        "PUT",
        &format!("/api/lens/families/{family_id}/matrix"),
        Some(json!([{
            "sphere_min": "-6", "sphere_max": "6",
            "cylinder_min": "-2", "cylinder_max": "0",
            "price": "20000"
        }])),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{matrix}");

    let eye = json!({ "sphere": "-1.25", "cylinder": "-0.5", "axis": 90 });
    let (status, price) = send(
        &client,
        "POST",
        "/api/lens/price",
        Some(json!({
            "family_id": family_id,
            "prescription": { "right": eye, "left": eye }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{price}");
    assert_eq!(amount(&price["total"]), 40000.into());

    let far = json!({ "sphere": "-9" });
    let (status, _) = send(
        &client,
        "POST",
        "/api/lens/price",
        Some(json!({
            "family_id": family_id,
            "prescription": { "right": far, "left": far }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
#[ignore = "Requires running admin server and database"]
async fn test_deactivated_user_loses_session() {
    let owner = logged_in_client().await;
    let email = format!("{}@optica.cl", unique_sku("vendedor").to_lowercase());
    let password = "mostrador-2024";

    let (status, seller) = send(
        &owner,
        "POST",
        "/api/users",
        Some(json!({
            "email": email,
            "name": "Vendedor Temporal",
            "role": "seller",
            "password": password
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{seller}");
    let seller_id = seller["id"].as_i64().unwrap();

    let seller_client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap();
    let resp = seller_client
        .post(format!("{}/api/auth/login", admin_base_url()))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let (status, _) = send(&seller_client, "GET", "/api/products", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &owner,
        "PUT",
        &format!("/api/users/{seller_id}"),
        Some(json!({
            "name": "Vendedor Temporal",
            "role": "seller",
            "active": false
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The old cookie no longer authorizes anything.
    let (status, _) = send(&seller_client, "GET", "/api/products", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&seller_client, "GET", "/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
