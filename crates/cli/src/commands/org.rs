//! Organization bootstrap.

use chrono::Utc;
use rust_decimal::Decimal;

use optica_admin::config::parse_tax_rate;
use optica_admin::models::OrganizationInput;
use optica_admin::services::TenancyService;
use optica_core::{DEFAULT_TAX_RATE, Rut, SubscriptionPlan};

use super::{CliError, connect};

/// Arguments of `org create`.
pub struct NewOrganization {
    pub name: String,
    pub rut: Rut,
    pub slug: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub plan: Option<SubscriptionPlan>,
}

/// IVA for organizations created without an explicit rate.
fn default_tax_rate() -> Result<Decimal, CliError> {
    match std::env::var("OPTICA_DEFAULT_TAX_RATE") {
        Ok(raw) => parse_tax_rate(&raw).map_err(CliError::Invalid),
        Err(_) => Ok(DEFAULT_TAX_RATE),
    }
}

/// Create an organization on a trial of the requested plan.
pub async fn create(args: NewOrganization) -> Result<(), CliError> {
    let pool = connect().await?;
    let default_rate = default_tax_rate()?;

    let input = OrganizationInput {
        name: args.name,
        rut: args.rut,
        slug: args.slug,
        tax_rate: args.tax_rate,
        plan: args.plan,
    };
    let created = TenancyService::new(&pool)
        .create_organization(&input, default_rate, Utc::now())
        .await?;

    let org = &created.organization;
    tracing::info!(
        "Organization created! ID: {}, Slug: {}, RUT: {}, IVA: {}",
        org.id,
        org.slug,
        org.rut,
        org.tax_rate
    );
    if let Some(subscription) = &created.subscription {
        tracing::info!(
            "Plan {} ({}) until {}",
            subscription.plan,
            subscription.status,
            subscription.current_period_end.date_naive()
        );
    }
    Ok(())
}
