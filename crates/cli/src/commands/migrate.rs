//! Database migrations.
//!
//! Migrations live in `crates/admin/migrations/` and are embedded at
//! compile time, so the binary can migrate a fresh database on its own.

use super::{CliError, connect};

/// Apply every pending migration.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../admin/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
