//! Tenant organization, branch and subscription types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use optica_core::tenancy::{PlanLimits, Subscription};
use optica_core::{BranchId, OrganizationId, Rut, SubscriptionPlan};

/// An optical retail company (tenant).
#[derive(Debug, Clone, Serialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: String,
    pub rut: Rut,
    pub slug: String,
    /// IVA applied to this organization's sales.
    pub tax_rate: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A physical store of an organization.
#[derive(Debug, Clone, Serialize)]
pub struct Branch {
    pub id: BranchId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Organization with its subscription and current usage, as shown to owners
/// and platform administrators.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationOverview {
    #[serde(flatten)]
    pub organization: Organization,
    pub subscription: Option<Subscription>,
    pub limits: Option<PlanLimits>,
    pub usable: bool,
    pub branch_count: i64,
    pub user_count: i64,
}

/// `POST /api/platform/organizations` body.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationInput {
    pub name: String,
    pub rut: Rut,
    /// Derived from the name when absent.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub tax_rate: Option<Decimal>,
    #[serde(default)]
    pub plan: Option<SubscriptionPlan>,
}

/// `PUT /api/platform/organizations/{id}` body.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationUpdate {
    pub name: String,
    pub tax_rate: Decimal,
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchInput {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

/// Rows removed by an organization cascade delete, per table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeReport {
    pub organization_id: Option<OrganizationId>,
    pub deleted: Vec<(String, u64)>,
}

impl CascadeReport {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.deleted.iter().map(|(_, n)| n).sum()
    }
}
