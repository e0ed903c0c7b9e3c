//! Unified error handling for the back-office API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use optica_core::catalog::CatalogError;
use optica_core::lens::LensError;
use optica_core::pos::PosError;
use optica_core::tenancy::TenancyError;

use crate::db::RepositoryError;
use crate::services::{AuthError, ServiceError};

/// Application-level error type for API handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(RepositoryError),

    /// A business rule rejected the request.
    #[error("{0}")]
    Unprocessable(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Unique constraint or state conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("record not found".to_string()),
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Database(other),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Repository(e) => e.into(),
            ServiceError::NotFound(what) => Self::NotFound(what),
            ServiceError::Conflict(msg) => Self::Conflict(msg),
            ServiceError::Forbidden(msg) => Self::Forbidden(msg),
            ServiceError::Auth(e) => e.into(),
            ServiceError::Tenancy(e) => e.into(),
            e @ (ServiceError::Pos(_)
            | ServiceError::Lens(_)
            | ServiceError::Catalog(_)
            | ServiceError::Rule(_)) => Self::Unprocessable(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidEmail(_) | AuthError::InvalidCredentials => {
                Self::Unauthorized("invalid email or password".to_string())
            }
            e @ (AuthError::AccountDisabled | AuthError::SubscriptionInactive) => {
                Self::Forbidden(e.to_string())
            }
            e @ AuthError::WeakPassword(_) => Self::Unprocessable(e.to_string()),
            AuthError::PasswordHash => Self::Internal("password hashing failed".to_string()),
            AuthError::Repository(e) => e.into(),
        }
    }
}

impl From<PosError> for AppError {
    fn from(err: PosError) -> Self {
        Self::Unprocessable(err.to_string())
    }
}

impl From<LensError> for AppError {
    fn from(err: LensError) -> Self {
        Self::Unprocessable(err.to_string())
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        Self::Unprocessable(err.to_string())
    }
}

impl From<TenancyError> for AppError {
    fn from(err: TenancyError) -> Self {
        match err {
            TenancyError::SubscriptionInactive => Self::Forbidden(err.to_string()),
            TenancyError::LimitReached { .. } => Self::Unprocessable(err.to_string()),
        }
    }
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if matches!(self, Self::Database(_) | Self::Internal(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "API request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

/// Set the Sentry user context for the logged-in user.
pub fn set_sentry_user(user_id: i32, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("sale 12".to_string());
        assert_eq!(err.to_string(), "Not found: sale 12");

        let err = AppError::Unprocessable("cart is empty".to_string());
        assert_eq!(err.to_string(), "cart is empty");
    }

    #[test]
    fn test_repository_errors_map_by_kind() {
        assert_eq!(AppError::from(RepositoryError::NotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(RepositoryError::Conflict("SKU taken".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(RepositoryError::DataCorruption("bad".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_errors_are_unprocessable() {
        assert_eq!(AppError::from(PosError::NoPayment).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            AppError::from(CatalogError::EmptySku).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_auth_errors_do_not_reveal_which_part_failed() {
        let err = AppError::from(AuthError::InvalidCredentials);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Unauthorized: invalid email or password");

        assert_eq!(
            AppError::from(AuthError::SubscriptionInactive).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(ServiceError::Auth(AuthError::WeakPassword("short".into()))).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_lapsed_subscription_is_forbidden() {
        assert_eq!(
            AppError::from(ServiceError::Tenancy(TenancyError::SubscriptionInactive)).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let (status, body) = body_json(AppError::BadRequest("missing lines".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Bad request: missing lines");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (status, body) = body_json(AppError::Internal("pool exhausted".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }
}
