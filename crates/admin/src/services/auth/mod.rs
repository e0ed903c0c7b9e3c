//! Authentication service.
//!
//! Email and password login with Argon2id hashes. A tenant user can only log
//! in while their organization is active and its subscription is usable.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use optica_core::Email;

use crate::db::{OrganizationRepository, UserRepository};
use crate::models::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    organizations: OrganizationRepository<'a>,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            organizations: OrganizationRepository::new(pool),
        }
    }

    /// Login with email and password at `now`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong,
    /// `AuthError::AccountDisabled` for inactive users or organizations and
    /// `AuthError::SubscriptionInactive` when the subscription has lapsed.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;

        let (user, password_hash) = self
            .users
            .get_credentials(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.active {
            return Err(AuthError::AccountDisabled);
        }

        // Platform administrators have no organization to check.
        if let Some(org_id) = user.organization_id {
            let organization = self
                .organizations
                .get(org_id)
                .await?
                .ok_or(AuthError::AccountDisabled)?;
            if !organization.active {
                return Err(AuthError::AccountDisabled);
            }

            let usable = self
                .organizations
                .subscription(org_id)
                .await?
                .is_some_and(|s| s.is_usable(now));
            if !usable {
                return Err(AuthError::SubscriptionInactive);
            }
        }

        Ok(user)
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate and hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` for short passwords and
/// `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    validate_password(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("lentes-2026").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("lentes-2026", &hash).is_ok());
        assert!(matches!(
            verify_password("lentes-2027", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(
            hash_password("corta"),
            Err(AuthError::WeakPassword(_))
        ));
        // Counted in characters, not bytes.
        assert!(validate_password("ñññññññ").is_err());
        assert!(validate_password("ñññññññ1").is_ok());
    }

    #[test]
    fn test_garbage_hash_is_invalid_credentials() {
        assert!(matches!(
            verify_password("whatever1", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
