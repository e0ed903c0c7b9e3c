//! HTTP middleware for the back-office API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Session layer (tower-sessions with `PostgreSQL` store)
//!
//! Authorization is done per handler with the extractors in [`auth`].

pub mod auth;
pub mod session;

pub use auth::{
    AuthRejection, RequireAuth, RequireCatalogManager, RequireOwner, RequirePlatformAdmin,
    RequireTenant, Tenant, clear_current_user, set_current_user,
};
pub use session::{SESSION_COOKIE_NAME, SessionStoreError, create_session_layer};
