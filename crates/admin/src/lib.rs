//! Optica Admin library.
//!
//! The JSON back-office API as a library, so the binary, the CLI and the
//! integration tests share one router, one set of repositories and one
//! error type.
//!
//! # Layers
//!
//! - [`routes`] - axum handlers, one module per resource
//! - [`services`] - multi-step operations (checkout, quotes, tenancy, lens cache)
//! - [`db`] - `PostgreSQL` repositories, always scoped by organization
//! - [`middleware`] - cookie sessions and role extractors

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use axum::http::{Request, Response};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::SessionManagerLayer;
use tower_sessions_sqlx_store::PostgresStore;
use tracing::Span;

use state::AppState;

/// Build the application: routes, sessions, request tracing and Sentry.
pub fn app(state: AppState, session_layer: SessionManagerLayer<PostgresStore>) -> Router {
    routes::router()
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &Response<_>, latency: std::time::Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
