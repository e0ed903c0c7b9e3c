//! Subcommand implementations.
//!
//! Every command reads `OPTICA_DATABASE_URL` (from the environment or a
//! `.env` file) and talks to the database directly, reusing the admin
//! crate's repositories and services so the same rules apply as over HTTP.

pub mod lens;
pub mod migrate;
pub mod org;
pub mod quotes;
pub mod user;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use optica_admin::db::{self, RepositoryError};
use optica_admin::services::{AuthError, ServiceError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Input rejected before reaching the database.
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Connect using `OPTICA_DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let url = std::env::var("OPTICA_DATABASE_URL")
        .map_err(|_| CliError::MissingEnvVar("OPTICA_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&SecretString::from(url)).await?)
}
