//! Back-office user repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use optica_core::{BranchId, Email, OrganizationId, UserId, UserRole};

use super::RepositoryError;
use crate::models::User;

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    organization_id: Option<i32>,
    branch_id: Option<i32>,
    email: String,
    name: String,
    role: UserRole,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            organization_id: row.organization_id.map(OrganizationId::new),
            branch_id: row.branch_id.map(BranchId::new),
            email,
            name: row.name,
            role: row.role,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

const USER_COLUMNS: &str =
    "id, organization_id, branch_id, email, name, role, active, created_at, updated_at";

/// A user as written on creation.
pub struct NewUser<'a> {
    pub organization_id: Option<OrganizationId>,
    pub branch_id: Option<BranchId>,
    pub email: &'a Email,
    pub name: &'a str,
    pub role: UserRole,
    pub password_hash: &'a str,
}

/// Editable user fields.
pub struct UserChanges<'a> {
    pub branch_id: Option<BranchId>,
    pub name: &'a str,
    pub role: UserRole,
    pub active: bool,
    /// Replaces the stored hash when present.
    pub password_hash: Option<&'a str>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Users of one organization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, org: OrganizationId) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE organization_id = $1 ORDER BY name"
        ))
        .bind(org)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        org: OrganizationId,
        id: UserId,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE organization_id = $1 AND id = $2"
        ))
        .bind(org)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// The user behind a session, if they and their organization are still
    /// active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_session_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT u.id, u.organization_id, u.branch_id, u.email, u.name, u.role, u.active,
                   u.created_at, u.updated_at
            FROM users u
            LEFT JOIN organizations o ON o.id = u.organization_id
            WHERE u.id = $1 AND u.active AND (u.organization_id IS NULL OR o.active)
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Look up a user by email with the stored password hash, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user = User::try_from(row.user)?;
        Ok(Some((user, row.password_hash)))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email is already registered.
    pub async fn create(&self, user: &NewUser<'_>) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO users (organization_id, branch_id, email, name, role, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.organization_id)
        .bind(user.branch_id)
        .bind(user.email.as_str())
        .bind(user.name.trim())
        .bind(user.role)
        .bind(user.password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or_db(e, "email already registered"))?;

        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user is not in `org`.
    pub async fn update(
        &self,
        org: OrganizationId,
        id: UserId,
        changes: &UserChanges<'_>,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users
            SET branch_id = $3,
                name = $4,
                role = $5,
                active = $6,
                password_hash = COALESCE($7, password_hash),
                updated_at = NOW()
            WHERE organization_id = $1 AND id = $2
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(org)
        .bind(id)
        .bind(changes.branch_id)
        .bind(changes.name.trim())
        .bind(changes.role)
        .bind(changes.active)
        .bind(changes.password_hash)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Active users of an organization.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_active(&self, org: OrganizationId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE organization_id = $1 AND active",
        )
        .bind(org)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}
