//! Back-office user types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use optica_core::{BranchId, Email, OrganizationId, UserId, UserRole};

/// A back-office user (domain type). The password hash never leaves the
/// repository except through `UserRepository::get_credentials`.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    /// `None` for platform administrators.
    pub organization_id: Option<OrganizationId>,
    pub branch_id: Option<BranchId>,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session-stored identity of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub organization_id: Option<OrganizationId>,
    pub branch_id: Option<BranchId>,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            organization_id: user.organization_id,
            branch_id: user.branch_id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Session keys for authentication data.
pub mod session_keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}

/// `POST /api/auth/login` body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/users` body.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInput {
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    #[serde(default)]
    pub branch_id: Option<BranchId>,
    pub password: String,
}

/// `PUT /api/users/{id}` body. A missing password keeps the current one.
#[derive(Debug, Clone, Deserialize)]
pub struct UserUpdate {
    pub name: String,
    pub role: UserRole,
    #[serde(default)]
    pub branch_id: Option<BranchId>,
    pub active: bool,
    #[serde(default)]
    pub password: Option<String>,
}
