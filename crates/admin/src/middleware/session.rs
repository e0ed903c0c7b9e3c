//! Session layer configuration.
//!
//! Sessions live in `optica.session` (`PostgreSQL`), with SameSite=Strict
//! cookies and an 8 hour inactivity expiry.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AdminConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "optica_session";

/// A shift on the sales floor.
const SESSION_EXPIRY_SECONDS: i64 = 8 * 60 * 60;

/// The session store rejected its schema or table name.
#[derive(Debug, thiserror::Error)]
#[error("invalid session store configuration: {0}")]
pub struct SessionStoreError(String);

/// Create the session layer with `PostgreSQL` store.
///
/// # Errors
///
/// Returns an error if the store rejects the schema or table name.
pub fn create_session_layer(
    pool: &PgPool,
    config: &AdminConfig,
) -> Result<SessionManagerLayer<PostgresStore>, SessionStoreError> {
    // The table is created by the initial migration.
    let store = PostgresStore::new(pool.clone())
        .with_schema_name("optica")
        .map_err(|e| SessionStoreError(e.to_string()))?
        .with_table_name("session")
        .map_err(|e| SessionStoreError(e.to_string()))?;

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_secure())
        .with_same_site(tower_sessions::cookie::SameSite::Strict)
        .with_http_only(true)
        .with_path("/"))
}
