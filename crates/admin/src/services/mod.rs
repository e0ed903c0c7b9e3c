//! Business logic services for the back office.
//!
//! # Services
//!
//! - `auth` - Password login (Argon2id) and subscription gate
//! - `checkout` - Cart pricing, checkout, balance payments and voids
//! - `lens` - Cached lens matrices, pair pricing and presbyopia solutions
//! - `quotes` - Quote creation, status changes and conversion into sales
//! - `tenancy` - Organizations, plan limits and cascade delete

pub mod auth;
pub mod checkout;
pub mod lens;
pub mod quotes;
pub mod tenancy;

pub use auth::{AuthError, AuthService};
pub use checkout::{CheckoutService, SaleContext};
pub use lens::LensService;
pub use quotes::QuoteService;
pub use tenancy::TenancyService;

use thiserror::Error;

use optica_core::catalog::CatalogError;
use optica_core::lens::LensError;
use optica_core::pos::PosError;
use optica_core::tenancy::TenancyError;

use crate::db::RepositoryError;

/// Errors raised by multi-step operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Pos(#[from] PosError),

    #[error(transparent)]
    Lens(#[from] LensError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Tenancy(#[from] TenancyError),

    /// A referenced record does not exist in the caller's organization.
    #[error("{0} not found")]
    NotFound(String),

    /// The record is in a state that does not allow the operation.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    /// Any other business rule.
    #[error("{0}")]
    Rule(String),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(err))
    }
}
