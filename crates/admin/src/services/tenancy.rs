//! Organization lifecycle, plan limits and subscription gating.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

use optica_core::tenancy::{PlanLimits, Subscription, TenancyError, slugify};
use optica_core::{BranchId, OrganizationId, SubscriptionPlan, SubscriptionStatus, UserId, UserRole};

use super::ServiceError;
use super::auth::hash_password;
use crate::db::organizations::{NewOrganization, delete_cascade};
use crate::db::users::{NewUser, UserChanges};
use crate::db::{OrganizationRepository, UserRepository};
use crate::models::{
    Branch, BranchInput, CascadeReport, Organization, OrganizationInput, OrganizationOverview,
    User, UserInput, UserUpdate,
};

/// Length of the trial every new organization starts with.
pub const TRIAL_DAYS: i64 = 30;

/// Load an organization and check that it may transact at `now`.
///
/// # Errors
///
/// Returns `TenancyError::SubscriptionInactive` if the organization is
/// deactivated or its subscription is not usable.
pub async fn ensure_usable(
    pool: &PgPool,
    org: OrganizationId,
    now: DateTime<Utc>,
) -> Result<Organization, ServiceError> {
    let repo = OrganizationRepository::new(pool);
    let organization = repo
        .get(org)
        .await?
        .ok_or_else(|| ServiceError::NotFound("organization".to_string()))?;

    let usable = organization.active
        && repo
            .subscription(org)
            .await?
            .is_some_and(|s| s.is_usable(now));
    if !usable {
        warn!(org = %org, "Rejected operation on unusable organization");
        return Err(TenancyError::SubscriptionInactive.into());
    }
    Ok(organization)
}

fn count(n: i64) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Check a new organization's name, slug and tax rate, returning the slug.
///
/// # Errors
///
/// Returns a rule error for a blank name, an empty slug or a tax rate
/// outside `[0, 1)`.
pub fn prepare_organization(
    input: &OrganizationInput,
    tax_rate: Decimal,
) -> Result<String, ServiceError> {
    if input.name.trim().is_empty() {
        return Err(ServiceError::Rule("organization name is required".to_string()));
    }

    let slug = slugify(input.slug.as_deref().unwrap_or(&input.name));
    if slug.is_empty() {
        return Err(ServiceError::Rule(
            "the slug must contain letters or digits".to_string(),
        ));
    }

    check_tax_rate(tax_rate)?;
    Ok(slug)
}

/// # Errors
///
/// Returns a rule error for a rate outside `[0, 1)`.
pub fn check_tax_rate(rate: Decimal) -> Result<(), ServiceError> {
    if rate < Decimal::ZERO || rate >= Decimal::ONE {
        return Err(ServiceError::Rule(format!(
            "tax rate {rate} must be between 0 and 1"
        )));
    }
    Ok(())
}

/// Subscription for a new organization: a trial of `plan` from `now`.
#[must_use]
pub fn trial(plan: SubscriptionPlan, now: DateTime<Utc>) -> Subscription {
    Subscription {
        plan,
        status: SubscriptionStatus::Trial,
        current_period_end: now + Duration::days(TRIAL_DAYS),
    }
}

pub struct TenancyService<'a> {
    pool: &'a PgPool,
    organizations: OrganizationRepository<'a>,
    users: UserRepository<'a>,
}

impl<'a> TenancyService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            organizations: OrganizationRepository::new(pool),
            users: UserRepository::new(pool),
        }
    }

    /// Organization with its subscription, limits and usage.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the organization does not exist.
    pub async fn overview(
        &self,
        org: OrganizationId,
        now: DateTime<Utc>,
    ) -> Result<OrganizationOverview, ServiceError> {
        let organization = self
            .organizations
            .get(org)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("organization {org}")))?;
        self.describe(organization, now).await
    }

    async fn describe(
        &self,
        organization: Organization,
        now: DateTime<Utc>,
    ) -> Result<OrganizationOverview, ServiceError> {
        let subscription = self.organizations.subscription(organization.id).await?;
        let (branch_count, user_count) = self.organizations.usage(organization.id).await?;

        Ok(OrganizationOverview {
            usable: organization.active && subscription.is_some_and(|s| s.is_usable(now)),
            limits: subscription.as_ref().map(Subscription::limits),
            subscription,
            branch_count,
            user_count,
            organization,
        })
    }

    /// Create an organization on a trial subscription.
    ///
    /// # Errors
    ///
    /// Returns a rule error for invalid input and a conflict if the RUT or
    /// slug is already registered.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_organization(
        &self,
        input: &OrganizationInput,
        default_tax_rate: Decimal,
        now: DateTime<Utc>,
    ) -> Result<OrganizationOverview, ServiceError> {
        let tax_rate = input.tax_rate.unwrap_or(default_tax_rate);
        let slug = prepare_organization(input, tax_rate)?;
        let subscription = trial(input.plan.unwrap_or(SubscriptionPlan::Basic), now);

        let organization = self
            .organizations
            .create(
                &NewOrganization {
                    name: input.name.trim(),
                    rut: &input.rut,
                    slug: &slug,
                    tax_rate,
                },
                &subscription,
            )
            .await?;

        info!(org = %organization.id, slug = %organization.slug, plan = %subscription.plan, "Organization created");
        self.describe(organization, now).await
    }

    /// Change an organization's plan, status or period end.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the organization does not exist.
    #[instrument(skip(self))]
    pub async fn set_subscription(
        &self,
        org: OrganizationId,
        subscription: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<OrganizationOverview, ServiceError> {
        self.organizations.set_subscription(org, subscription).await?;
        info!(org = %org, plan = %subscription.plan, status = %subscription.status, "Subscription updated");
        self.overview(org, now).await
    }

    /// Delete an organization and every record it owns.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the organization does not exist.
    /// Nothing is deleted on error.
    #[instrument(skip(self))]
    pub async fn delete_organization(
        &self,
        org: OrganizationId,
    ) -> Result<CascadeReport, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let deleted = delete_cascade(&mut tx, org).await?;
        tx.commit().await?;

        let report = CascadeReport {
            organization_id: Some(org),
            deleted,
        };
        warn!(org = %org, rows = report.total(), "Organization deleted");
        Ok(report)
    }

    // =========================================================================
    // Branches & Users
    // =========================================================================

    async fn limits(&self, org: OrganizationId, now: DateTime<Utc>) -> Result<PlanLimits, ServiceError> {
        let subscription = self
            .organizations
            .subscription(org)
            .await?
            .filter(|s| s.is_usable(now))
            .ok_or(TenancyError::SubscriptionInactive)?;
        Ok(subscription.limits())
    }

    /// Open a branch if the plan allows one more.
    ///
    /// # Errors
    ///
    /// Returns `TenancyError::LimitReached` when the plan is full.
    #[instrument(skip(self, input), fields(org = %org))]
    pub async fn add_branch(
        &self,
        org: OrganizationId,
        input: &BranchInput,
        now: DateTime<Utc>,
    ) -> Result<Branch, ServiceError> {
        if input.name.trim().is_empty() {
            return Err(ServiceError::Rule("branch name is required".to_string()));
        }

        let limits = self.limits(org, now).await?;
        let (branches, _) = self.organizations.usage(org).await?;
        limits.check_branch(count(branches))?;

        let branch = self.organizations.create_branch(org, input).await?;
        info!(branch = %branch.id, name = %branch.name, "Branch created");
        Ok(branch)
    }

    /// Add a user to an organization if the plan allows one more.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Forbidden` for the platform administrator role,
    /// `TenancyError::LimitReached` when the plan is full and a conflict if
    /// the email is taken.
    #[instrument(skip(self, input), fields(org = %org, email = %input.email))]
    pub async fn add_user(
        &self,
        org: OrganizationId,
        input: &UserInput,
        now: DateTime<Utc>,
    ) -> Result<User, ServiceError> {
        self.check_assignment(org, input.role, input.branch_id).await?;

        let limits = self.limits(org, now).await?;
        limits.check_user(count(self.users.count_active(org).await?))?;

        let password_hash = hash_password(&input.password)?;

        let user = self
            .users
            .create(&NewUser {
                organization_id: Some(org),
                branch_id: input.branch_id,
                email: &input.email,
                name: input.name.trim(),
                role: input.role,
                password_hash: &password_hash,
            })
            .await?;
        info!(user = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    /// Edit a user. Re-activating a user counts against the plan again.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the user is not in `org` and
    /// `TenancyError::LimitReached` if re-activation does not fit.
    #[instrument(skip(self, input), fields(org = %org))]
    pub async fn update_user(
        &self,
        org: OrganizationId,
        id: UserId,
        input: &UserUpdate,
        now: DateTime<Utc>,
    ) -> Result<User, ServiceError> {
        let current = self
            .users
            .get(org, id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {id}")))?;
        self.check_assignment(org, input.role, input.branch_id).await?;

        if input.active && !current.active {
            let limits = self.limits(org, now).await?;
            limits.check_user(count(self.users.count_active(org).await?))?;
        }

        let password_hash = input
            .password
            .as_deref()
            .map(hash_password)
            .transpose()?;

        let user = self
            .users
            .update(
                org,
                id,
                &UserChanges {
                    branch_id: input.branch_id,
                    name: input.name.trim(),
                    role: input.role,
                    active: input.active,
                    password_hash: password_hash.as_deref(),
                },
            )
            .await?;
        info!(user = %user.id, active = user.active, "User updated");
        Ok(user)
    }

    async fn check_assignment(
        &self,
        org: OrganizationId,
        role: UserRole,
        branch: Option<BranchId>,
    ) -> Result<(), ServiceError> {
        if role == UserRole::PlatformAdmin {
            return Err(ServiceError::Forbidden(
                "platform administrators cannot belong to an organization".to_string(),
            ));
        }
        if let Some(branch) = branch {
            self.organizations
                .get_branch(org, branch)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("branch {branch}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use optica_core::Rut;
    use rust_decimal_macros::dec;

    fn input(name: &str, slug: Option<&str>) -> OrganizationInput {
        OrganizationInput {
            name: name.to_string(),
            rut: Rut::parse("76.086.428-5").unwrap(),
            slug: slug.map(str::to_string),
            tax_rate: None,
            plan: None,
        }
    }

    #[test]
    fn test_slug_derived_from_name() {
        let slug = prepare_organization(&input("Óptica Los Andes", None), dec!(0.19)).unwrap();
        assert_eq!(slug, "optica-los-andes");

        let slug = prepare_organization(&input("Óptica Los Andes", Some("Andes Centro")), dec!(0.19))
            .unwrap();
        assert_eq!(slug, "andes-centro");
    }

    #[test]
    fn test_invalid_organizations_rejected() {
        assert!(matches!(
            prepare_organization(&input("  ", None), dec!(0.19)),
            Err(ServiceError::Rule(_))
        ));
        assert!(matches!(
            prepare_organization(&input("Óptica", Some("---")), dec!(0.19)),
            Err(ServiceError::Rule(_))
        ));
        assert!(prepare_organization(&input("Óptica", None), dec!(1)).is_err());
        assert!(prepare_organization(&input("Óptica", None), dec!(-0.01)).is_err());
        assert!(prepare_organization(&input("Óptica", None), dec!(0)).is_ok());
    }

    #[test]
    fn test_trial_subscription() {
        let now = Utc::now();
        let sub = trial(SubscriptionPlan::Pro, now);

        assert_eq!(sub.status, SubscriptionStatus::Trial);
        assert!(sub.is_usable(now + Duration::days(TRIAL_DAYS)));
        assert!(!sub.is_usable(now + Duration::days(TRIAL_DAYS + 1)));
    }
}
