//! Quote maintenance.

use chrono::Utc;

use optica_admin::services::QuoteService;

use super::{CliError, connect};

/// Expire every open quote past its validity date. Meant for a daily cron.
pub async fn expire() -> Result<(), CliError> {
    let pool = connect().await?;
    let expired = QuoteService::new(&pool)
        .expire_overdue(Utc::now().date_naive())
        .await?;

    tracing::info!("{expired} quote(s) expired");
    Ok(())
}
