//! User bootstrap.
//!
//! Platform administrators can only be created here; organization users
//! go through the same plan-limit checks as `POST /api/users`.

use chrono::Utc;

use optica_admin::db::UserRepository;
use optica_admin::db::users::NewUser;
use optica_admin::models::UserInput;
use optica_admin::services::TenancyService;
use optica_admin::services::auth::hash_password;
use optica_core::{BranchId, Email, OrganizationId, UserRole};

use super::{CliError, connect};

/// Arguments of `user create`.
pub struct NewAccount {
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub organization: Option<i32>,
    pub branch: Option<i32>,
    pub password: String,
}

/// Organization a new account belongs to, checked against its role.
///
/// # Errors
///
/// Platform administrators must not name an organization; every other
/// role must.
fn scope(role: UserRole, organization: Option<i32>) -> Result<Option<OrganizationId>, CliError> {
    match (role, organization) {
        (UserRole::PlatformAdmin, None) => Ok(None),
        (UserRole::PlatformAdmin, Some(_)) => Err(CliError::Invalid(
            "platform administrators do not belong to an organization".to_string(),
        )),
        (_, Some(id)) => Ok(Some(OrganizationId::new(id))),
        (role, None) => Err(CliError::Invalid(format!("role {role} needs --org"))),
    }
}

/// Create a user and log its id.
pub async fn create(account: NewAccount) -> Result<(), CliError> {
    let organization = scope(account.role, account.organization)?;
    let name = account.name.trim();
    if name.is_empty() {
        return Err(CliError::Invalid("name is required".to_string()));
    }

    let pool = connect().await?;
    tracing::info!("Creating user: {} ({})", account.email, account.role);

    let user = match organization {
        None => {
            let password_hash = hash_password(&account.password)?;
            UserRepository::new(&pool)
                .create(&NewUser {
                    organization_id: None,
                    branch_id: None,
                    email: &account.email,
                    name,
                    role: UserRole::PlatformAdmin,
                    password_hash: &password_hash,
                })
                .await?
        }
        Some(org) => {
            let input = UserInput {
                email: account.email.clone(),
                name: name.to_string(),
                role: account.role,
                branch_id: account.branch.map(BranchId::new),
                password: account.password,
            };
            TenancyService::new(&pool)
                .add_user(org, &input, Utc::now())
                .await?
        }
    };

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_matches_role() {
        assert_eq!(scope(UserRole::PlatformAdmin, None).unwrap(), None);
        assert_eq!(
            scope(UserRole::Seller, Some(3)).unwrap(),
            Some(OrganizationId::new(3))
        );
        assert!(matches!(
            scope(UserRole::PlatformAdmin, Some(3)),
            Err(CliError::Invalid(_))
        ));

        let err = scope(UserRole::Owner, None).unwrap_err();
        assert_eq!(err.to_string(), "role owner needs --org");
    }
}
