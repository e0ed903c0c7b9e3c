//! `PostgreSQL` repositories.
//!
//! ## Tables
//!
//! - `organizations`, `subscriptions`, `branches`, `users` - tenancy
//! - `products` - catalog
//! - `customers`, `prescriptions` - clinical records
//! - `lens_families`, `lens_matrix_rows` - lens pricing
//! - `quotes`, `quote_lines` - quotes
//! - `sales`, `sale_lines`, `sale_payments`, `document_sequences` - POS
//! - `optica.session` - session storage
//!
//! Every tenant-scoped query filters on `organization_id`; a record of
//! another organization reads as not found.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! cargo run -p optica-cli -- migrate
//! ```

pub mod customers;
pub mod lens;
pub mod organizations;
pub mod products;
pub mod quotes;
pub mod sales;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use customers::CustomerRepository;
pub use lens::LensRepository;
pub use organizations::OrganizationRepository;
pub use products::ProductRepository;
pub use quotes::QuoteRepository;
pub use sales::SaleRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate SKU).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map unique violations to `Conflict` with `message`, everything else
    /// to `Database`.
    pub(crate) fn unique_or_db(e: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_string());
        }
        Self::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
pub(crate) fn like_pattern(q: &str) -> String {
    let mut escaped = String::with_capacity(q.len() + 2);
    escaped.push('%');
    for c in q.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
