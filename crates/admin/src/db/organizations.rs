//! Organization, subscription and branch repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use optica_core::tenancy::{CASCADE_ORDER, Subscription};
use optica_core::{
    BranchId, OrganizationId, Rut, SubscriptionPlan, SubscriptionStatus,
};

use super::{RepositoryError, like_pattern};
use crate::models::{Branch, BranchInput, Organization, OrganizationUpdate, Pagination};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrganizationRow {
    id: i32,
    name: String,
    rut: String,
    slug: String,
    tax_rate: Decimal,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = RepositoryError;

    fn try_from(row: OrganizationRow) -> Result<Self, Self::Error> {
        let rut = Rut::parse(&row.rut).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid RUT in database: {e}"))
        })?;

        Ok(Self {
            id: OrganizationId::new(row.id),
            name: row.name,
            rut,
            slug: row.slug,
            tax_rate: row.tax_rate,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    plan: SubscriptionPlan,
    status: SubscriptionStatus,
    current_period_end: DateTime<Utc>,
}

impl From<SubscriptionRow> for Subscription {
    fn from(row: SubscriptionRow) -> Self {
        Self {
            plan: row.plan,
            status: row.status,
            current_period_end: row.current_period_end,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BranchRow {
    id: i32,
    organization_id: i32,
    name: String,
    address: Option<String>,
    phone: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
}

impl From<BranchRow> for Branch {
    fn from(row: BranchRow) -> Self {
        Self {
            id: BranchId::new(row.id),
            organization_id: OrganizationId::new(row.organization_id),
            name: row.name,
            address: row.address,
            phone: row.phone,
            active: row.active,
            created_at: row.created_at,
        }
    }
}

const ORGANIZATION_COLUMNS: &str =
    "id, name, rut, slug, tax_rate, active, created_at, updated_at";

const BRANCH_COLUMNS: &str = "id, organization_id, name, address, phone, active, created_at";

/// A new organization as it is written.
pub struct NewOrganization<'a> {
    pub name: &'a str,
    pub rut: &'a Rut,
    pub slug: &'a str,
    pub tax_rate: Decimal,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for tenant-level records.
pub struct OrganizationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrganizationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List organizations, optionally filtered by name, slug or RUT.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        q: Option<&str>,
        page: Pagination,
    ) -> Result<(Vec<Organization>, i64), RepositoryError> {
        let pattern = q.filter(|s| !s.trim().is_empty()).map(like_pattern);

        let rows = sqlx::query_as::<_, OrganizationRow>(&format!(
            r"
            SELECT {ORGANIZATION_COLUMNS}
            FROM organizations
            WHERE ($1::text IS NULL OR name ILIKE $1 OR slug ILIKE $1 OR rut ILIKE $1)
            ORDER BY name
            OFFSET $2 LIMIT $3
            "
        ))
        .bind(pattern.as_deref())
        .bind(page.skip())
        .bind(page.limit())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM organizations
            WHERE ($1::text IS NULL OR name ILIKE $1 OR slug ILIKE $1 OR rut ILIKE $1)
            ",
        )
        .bind(pattern.as_deref())
        .fetch_one(self.pool)
        .await?;

        let organizations = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((organizations, total))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrganizationId) -> Result<Option<Organization>, RepositoryError> {
        let row = sqlx::query_as::<_, OrganizationRow>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create an organization together with its subscription.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the RUT or slug is taken.
    pub async fn create(
        &self,
        org: &NewOrganization<'_>,
        subscription: &Subscription,
    ) -> Result<Organization, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrganizationRow>(&format!(
            r"
            INSERT INTO organizations (name, rut, slug, tax_rate)
            VALUES ($1, $2, $3, $4)
            RETURNING {ORGANIZATION_COLUMNS}
            "
        ))
        .bind(org.name)
        .bind(org.rut.as_str())
        .bind(org.slug)
        .bind(org.tax_rate)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, "RUT or slug already registered"))?;

        upsert_subscription(&mut tx, OrganizationId::new(row.id), subscription).await?;
        tx.commit().await?;

        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the organization does not exist.
    pub async fn update(
        &self,
        id: OrganizationId,
        update: &OrganizationUpdate,
    ) -> Result<Organization, RepositoryError> {
        let row = sqlx::query_as::<_, OrganizationRow>(&format!(
            r"
            UPDATE organizations
            SET name = $2, tax_rate = $3, active = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORGANIZATION_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.trim())
        .bind(update.tax_rate)
        .bind(update.active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn subscription(
        &self,
        id: OrganizationId,
    ) -> Result<Option<Subscription>, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r"
            SELECT plan, status, current_period_end
            FROM subscriptions
            WHERE organization_id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the organization does not exist.
    pub async fn set_subscription(
        &self,
        id: OrganizationId,
        subscription: &Subscription,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert_subscription(&mut conn, id, subscription).await
    }

    /// Number of branches and active users, for plan limit checks.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn usage(&self, id: OrganizationId) -> Result<(i64, i64), RepositoryError> {
        let usage: (i64, i64) = sqlx::query_as(
            r"
            SELECT
                (SELECT COUNT(*) FROM branches WHERE organization_id = $1),
                (SELECT COUNT(*) FROM users WHERE organization_id = $1 AND active)
            ",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(usage)
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_branches(&self, org: OrganizationId) -> Result<Vec<Branch>, RepositoryError> {
        let rows = sqlx::query_as::<_, BranchRow>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE organization_id = $1 ORDER BY name"
        ))
        .bind(org)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_branch(
        &self,
        org: OrganizationId,
        id: BranchId,
    ) -> Result<Option<Branch>, RepositoryError> {
        let row = sqlx::query_as::<_, BranchRow>(&format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE organization_id = $1 AND id = $2"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the branch name is taken.
    pub async fn create_branch(
        &self,
        org: OrganizationId,
        input: &BranchInput,
    ) -> Result<Branch, RepositoryError> {
        let row = sqlx::query_as::<_, BranchRow>(&format!(
            r"
            INSERT INTO branches (organization_id, name, address, phone, active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {BRANCH_COLUMNS}
            "
        ))
        .bind(org)
        .bind(input.name.trim())
        .bind(input.address.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, "a branch with that name already exists"))?;

        Ok(row.into())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the branch is not in `org`.
    pub async fn update_branch(
        &self,
        org: OrganizationId,
        id: BranchId,
        input: &BranchInput,
    ) -> Result<Branch, RepositoryError> {
        let row = sqlx::query_as::<_, BranchRow>(&format!(
            r"
            UPDATE branches
            SET name = $3, address = $4, phone = $5, active = $6
            WHERE organization_id = $1 AND id = $2
            RETURNING {BRANCH_COLUMNS}
            "
        ))
        .bind(org)
        .bind(id)
        .bind(input.name.trim())
        .bind(input.address.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, "a branch with that name already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn upsert_subscription(
    conn: &mut PgConnection,
    id: OrganizationId,
    subscription: &Subscription,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO subscriptions (organization_id, plan, status, current_period_end)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (organization_id) DO UPDATE
        SET plan = EXCLUDED.plan,
            status = EXCLUDED.status,
            current_period_end = EXCLUDED.current_period_end,
            updated_at = NOW()
        ",
    )
    .bind(id)
    .bind(subscription.plan)
    .bind(subscription.status)
    .bind(subscription.current_period_end)
    .execute(conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return RepositoryError::NotFound;
        }
        RepositoryError::Database(e)
    })?;
    Ok(())
}

/// Delete every row of organization `id`, children first, inside the
/// caller's transaction. Returns the number of rows removed per table.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the organization row itself was
/// not there.
pub async fn delete_cascade(
    conn: &mut PgConnection,
    id: OrganizationId,
) -> Result<Vec<(String, u64)>, RepositoryError> {
    let mut deleted = Vec::with_capacity(CASCADE_ORDER.len());

    for table in CASCADE_ORDER {
        let key = if *table == "organizations" {
            "id"
        } else {
            "organization_id"
        };
        // Table names come from a fixed list, never from input.
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE {key} = $1"))
            .bind(id)
            .execute(&mut *conn)
            .await?;
        deleted.push(((*table).to_string(), result.rows_affected()));
    }

    if deleted.last().is_some_and(|(_, n)| *n == 0) {
        return Err(RepositoryError::NotFound);
    }
    Ok(deleted)
}
