//! SaaS tenancy rules: plan limits, subscription usability and the order in
//! which an organization's data is removed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{SubscriptionPlan, SubscriptionStatus};

/// Days a `past_due` organization keeps working after its period ends.
pub const PAST_DUE_GRACE_DAYS: i64 = 7;

/// Tenant tables in delete order, children before parents.
///
/// `organizations` is last; deleting it alone would fail on foreign keys.
pub const CASCADE_ORDER: &[&str] = &[
    "sale_payments",
    "sale_lines",
    "sales",
    "quote_lines",
    "quotes",
    "prescriptions",
    "customers",
    "lens_matrix_rows",
    "lens_families",
    "products",
    "document_sequences",
    "users",
    "branches",
    "subscriptions",
    "organizations",
];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TenancyError {
    #[error("the {plan} plan allows at most {max} {resource}")]
    LimitReached {
        plan: SubscriptionPlan,
        resource: &'static str,
        max: u32,
    },

    #[error("the organization's subscription is not active")]
    SubscriptionInactive,
}

/// Resource caps for a plan. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub plan: SubscriptionPlan,
    pub max_branches: Option<u32>,
    pub max_users: Option<u32>,
}

impl PlanLimits {
    #[must_use]
    pub const fn for_plan(plan: SubscriptionPlan) -> Self {
        let (max_branches, max_users) = match plan {
            SubscriptionPlan::Basic => (Some(1), Some(3)),
            SubscriptionPlan::Pro => (Some(5), Some(20)),
            SubscriptionPlan::Enterprise => (None, None),
        };
        Self {
            plan,
            max_branches,
            max_users,
        }
    }

    /// Whether one more branch fits, given `current` existing branches.
    ///
    /// # Errors
    ///
    /// Returns [`TenancyError::LimitReached`] if the plan is full.
    pub fn check_branch(&self, current: u32) -> Result<(), TenancyError> {
        self.check("branches", self.max_branches, current)
    }

    /// Whether one more user fits, given `current` active users.
    ///
    /// # Errors
    ///
    /// Returns [`TenancyError::LimitReached`] if the plan is full.
    pub fn check_user(&self, current: u32) -> Result<(), TenancyError> {
        self.check("users", self.max_users, current)
    }

    fn check(&self, resource: &'static str, max: Option<u32>, current: u32) -> Result<(), TenancyError> {
        match max {
            Some(max) if current >= max => Err(TenancyError::LimitReached {
                plan: self.plan,
                resource,
                max,
            }),
            _ => Ok(()),
        }
    }
}

/// An organization's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan: SubscriptionPlan,
    pub status: SubscriptionStatus,
    pub current_period_end: DateTime<Utc>,
}

impl Subscription {
    #[must_use]
    pub const fn limits(&self) -> PlanLimits {
        PlanLimits::for_plan(self.plan)
    }

    /// Whether the organization may use the back office at `now`.
    ///
    /// Trial and active subscriptions work until the period ends; past-due
    /// ones get [`PAST_DUE_GRACE_DAYS`] more. Cancelled never works.
    #[must_use]
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SubscriptionStatus::Trial | SubscriptionStatus::Active => now <= self.current_period_end,
            SubscriptionStatus::PastDue => {
                now <= self.current_period_end + Duration::days(PAST_DUE_GRACE_DAYS)
            }
            SubscriptionStatus::Cancelled => false,
        }
    }
}

/// URL-safe organization slug: lowercase ASCII, words joined with `-`.
///
/// ```
/// use optica_core::tenancy::slugify;
///
/// assert_eq!(slugify("Óptica Visión Ñuñoa"), "optica-vision-nunoa");
/// ```
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        let c = match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            other => other,
        };
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    fn sub(status: SubscriptionStatus) -> Subscription {
        Subscription {
            plan: SubscriptionPlan::Basic,
            status,
            current_period_end: at(10),
        }
    }

    #[test]
    fn test_plan_limits() {
        let basic = PlanLimits::for_plan(SubscriptionPlan::Basic);
        assert!(basic.check_branch(0).is_ok());
        assert_eq!(
            basic.check_branch(1),
            Err(TenancyError::LimitReached {
                plan: SubscriptionPlan::Basic,
                resource: "branches",
                max: 1
            })
        );
        assert!(basic.check_user(2).is_ok());
        assert!(basic.check_user(3).is_err());

        let pro = PlanLimits::for_plan(SubscriptionPlan::Pro);
        assert!(pro.check_branch(4).is_ok());
        assert!(pro.check_user(20).is_err());

        let enterprise = PlanLimits::for_plan(SubscriptionPlan::Enterprise);
        assert!(enterprise.check_branch(500).is_ok());
        assert!(enterprise.check_user(u32::MAX).is_ok());
    }

    #[test]
    fn test_usable_within_period() {
        assert!(sub(SubscriptionStatus::Active).is_usable(at(10)));
        assert!(sub(SubscriptionStatus::Trial).is_usable(at(1)));
        assert!(!sub(SubscriptionStatus::Active).is_usable(at(11)));
    }

    #[test]
    fn test_past_due_grace() {
        let s = sub(SubscriptionStatus::PastDue);
        assert!(s.is_usable(at(17)));
        assert!(!s.is_usable(at(18)));
    }

    #[test]
    fn test_cancelled_never_usable() {
        assert!(!sub(SubscriptionStatus::Cancelled).is_usable(at(1)));
    }

    #[test]
    fn test_cascade_order_ends_with_organizations() {
        assert_eq!(CASCADE_ORDER.last(), Some(&"organizations"));
        let pos = |t: &str| CASCADE_ORDER.iter().position(|x| *x == t);
        assert!(pos("sale_lines") < pos("sales"));
        assert!(pos("sales") < pos("products"));
        assert!(pos("prescriptions") < pos("customers"));
        assert!(pos("users") < pos("branches"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("  Óptica  Los Andes!! "), "optica-los-andes");
        assert_eq!(slugify("---"), "");
        assert_eq!(slugify("Visión 2000"), "vision-2000");
    }
}
