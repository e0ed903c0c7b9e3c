//! HTTP route handlers for the back-office API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health, /health/ready           - Liveness and database readiness
//!
//! # Auth (email + password, cookie session)
//! POST /api/auth/login | logout, GET /api/auth/me
//!
//! # Catalog (owner/manager writes, every role reads)
//! /api/products[/{id}[/archive|/restore|/stock]]
//! /api/products/bulk/{archive,restore,price,category}
//!
//! # Customers & prescriptions (every tenant role)
//! /api/customers[/{id}[/prescriptions]], /api/prescriptions/{id}
//!
//! # POS
//! POST /api/pos/preview, POST /api/pos/sales
//! /api/sales[/{id}[/payments|/void]]
//! /api/quotes[/{id}[/status|/convert]]
//!
//! # Lens pricing
//! /api/lens/families[/{id}[/matrix]], POST /api/lens/price | solutions
//!
//! # Own organization (owner)
//! GET /api/organization, /api/branches[/{id}], /api/users[/{id}]
//!
//! # Platform administration
//! /api/platform/organizations[/{id}[/subscription]]
//! ```

pub mod auth;
pub mod customers;
pub mod health;
pub mod lens;
pub mod organization;
pub mod platform;
pub mod pos;
pub mod products;
pub mod quotes;
pub mod sales;

use axum::Router;

use crate::state::AppState;

/// Build the complete router (without session or tracing layers).
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(products::router())
        .merge(customers::router())
        .merge(pos::router())
        .merge(sales::router())
        .merge(quotes::router())
        .merge(lens::router())
        .merge(organization::router())
        .merge(platform::router())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::config::AdminConfig;

    fn app() -> Router {
        let config = AdminConfig {
            database_url: SecretString::from("postgres://optica@localhost/optica"),
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
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://optica@localhost/optica")
            .unwrap();
        router().with_state(AppState::new(config, pool))
    }

    async fn status(method: &str, uri: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        app().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        assert_eq!(status("GET", "/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_tenant_routes_require_login() {
        for (method, uri) in [
            ("GET", "/api/products"),
            ("GET", "/api/customers/4"),
            ("POST", "/api/pos/sales"),
            ("POST", "/api/quotes/9/convert"),
            ("GET", "/api/lens/families"),
            ("GET", "/api/organization"),
        ] {
            assert_eq!(
                status(method, uri).await,
                StatusCode::UNAUTHORIZED,
                "{method} {uri}"
            );
        }
    }

    #[tokio::test]
    async fn test_platform_routes_require_login() {
        assert_eq!(
            status("GET", "/api/platform/organizations").await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        assert_eq!(status("GET", "/api/shipments").await, StatusCode::NOT_FOUND);
    }
}
