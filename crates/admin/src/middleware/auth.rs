//! Authentication extractors.
//!
//! Every extractor reads the [`CurrentUser`] stored in the session at login
//! and re-checks it against the database, so deactivating a user or their
//! organization takes effect on the next request. Tenant extractors
//! additionally require an organization, so a platform administrator can
//! never reach tenant data through them.

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;
use tracing::{error, info};

use optica_core::{OrganizationId, UserRole};

use crate::db::UserRepository;
use crate::models::{CurrentUser, User, session_keys};
use crate::state::AppState;

/// A logged-in user acting inside their organization.
#[derive(Debug, Clone)]
pub struct Tenant {
    pub user: CurrentUser,
    pub organization_id: OrganizationId,
}

/// Error returned when authentication or a role is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No session or not logged in.
    Unauthorized,
    /// Logged in without the required role.
    Forbidden(&'static str),
    /// The session could not be checked.
    Internal,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Not logged in" })),
            )
                .into_response(),
            Self::Forbidden(message) => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": message }))).into_response()
            }
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response(),
        }
    }
}

async fn current_user(parts: &Parts, state: &AppState) -> Result<CurrentUser, AuthRejection> {
    // Set by SessionManagerLayer
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AuthRejection::Unauthorized)?;

    let stored = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
        .ok_or(AuthRejection::Unauthorized)?;

    let row = UserRepository::new(state.pool())
        .get_session_user(stored.id)
        .await
        .map_err(|e| {
            error!(user = %stored.id, error = %e, "Failed to load session user");
            AuthRejection::Internal
        })?;

    match refresh(&stored, row.as_ref()) {
        Ok(current) => {
            if current != stored
                && let Err(e) = session.insert(session_keys::CURRENT_USER, &current).await
            {
                error!(user = %current.id, error = %e, "Failed to refresh session user");
            }
            Ok(current)
        }
        Err(rejection) => {
            info!(user = %stored.id, "Session user is no longer active");
            // Best effort; the request is rejected either way.
            let _ = session.flush().await;
            Err(rejection)
        }
    }
}

/// The identity a session may act as, given the user's current database row
/// (`None` when the user or their organization is gone or inactive).
fn refresh(stored: &CurrentUser, row: Option<&User>) -> Result<CurrentUser, AuthRejection> {
    match row {
        Some(user) if user.id == stored.id && user.active => Ok(CurrentUser::from(user)),
        _ => Err(AuthRejection::Unauthorized),
    }
}

async fn tenant(parts: &Parts, state: &AppState) -> Result<Tenant, AuthRejection> {
    let user = current_user(parts, state).await?;
    let organization_id = user
        .organization_id
        .ok_or(AuthRejection::Forbidden("This resource belongs to an organization"))?;
    Ok(Tenant {
        user,
        organization_id,
    })
}

/// Any logged-in user.
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts, &AppState::from_ref(state)).await?))
    }
}

/// Any member of an organization: POS, customers, quotes.
pub struct RequireTenant(pub Tenant);

impl<S> FromRequestParts<S> for RequireTenant
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(tenant(parts, &AppState::from_ref(state)).await?))
    }
}

/// Owner or manager: products, lens pricing, voids.
pub struct RequireCatalogManager(pub Tenant);

impl<S> FromRequestParts<S> for RequireCatalogManager
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tenant = tenant(parts, &AppState::from_ref(state)).await?;
        if !tenant.user.role.can_manage_catalog() {
            return Err(AuthRejection::Forbidden("Only owners and managers can do this"));
        }
        Ok(Self(tenant))
    }
}

/// Organization owner: users and branches.
pub struct RequireOwner(pub Tenant);

impl<S> FromRequestParts<S> for RequireOwner
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tenant = tenant(parts, &AppState::from_ref(state)).await?;
        if !tenant.user.role.can_manage_organization() {
            return Err(AuthRejection::Forbidden("Only the owner can do this"));
        }
        Ok(Self(tenant))
    }
}

/// Platform administrator: `/api/platform/*`.
pub struct RequirePlatformAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequirePlatformAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = current_user(parts, &AppState::from_ref(state)).await?;
        if user.role != UserRole::PlatformAdmin {
            return Err(AuthRejection::Forbidden(
                "Only platform administrators can access this resource",
            ));
        }
        Ok(Self(user))
    }
}

/// Store the logged-in user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Drop the whole session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use chrono::Utc;
    use optica_core::{BranchId, Email, UserId};

    fn user(role: UserRole, active: bool) -> User {
        User {
            id: UserId::new(7),
            organization_id: Some(OrganizationId::new(3)),
            branch_id: Some(BranchId::new(1)),
            email: Email::parse("vendedora@optica.cl").unwrap(),
            name: "Camila Soto".to_string(),
            role,
            active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_refresh_picks_up_role_change() {
        let stored = CurrentUser::from(&user(UserRole::Manager, true));
        let current = refresh(&stored, Some(&user(UserRole::Seller, true))).unwrap();
        assert_eq!(current.role, UserRole::Seller);
        assert!(!current.role.can_manage_catalog());
    }

    #[test]
    fn test_refresh_rejects_removed_or_inactive_user() {
        let stored = CurrentUser::from(&user(UserRole::Owner, true));
        assert_eq!(refresh(&stored, None), Err(AuthRejection::Unauthorized));
        assert_eq!(
            refresh(&stored, Some(&user(UserRole::Owner, false))),
            Err(AuthRejection::Unauthorized)
        );
    }

    #[test]
    fn test_refresh_rejects_other_user() {
        let stored = CurrentUser::from(&user(UserRole::Owner, true));
        let mut other = user(UserRole::Owner, true);
        other.id = UserId::new(8);
        assert_eq!(
            refresh(&stored, Some(&other)),
            Err(AuthRejection::Unauthorized)
        );
    }
}
