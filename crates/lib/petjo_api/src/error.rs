//! Application error types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use petjo_core::auth::AuthError;
use thiserror::Error;
use tracing::{error, warn};

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized ({code}): {message}")]
    Unauthorized { code: &'static str, message: String },

    #[error("Forbidden ({code}): {message}")]
    Forbidden { code: &'static str, message: String },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            code,
            message: message.into(),
        }
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Forbidden {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "conflict", m.as_str()),
            AppError::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, *code, message.as_str())
            }
            AppError::Forbidden { code, message } => (StatusCode::FORBIDDEN, *code, message.as_str()),
            AppError::StoreUnavailable(detail) => {
                warn!("store unavailable: {detail}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "Service temporarily unavailable, please retry",
                )
            }
            AppError::Internal(detail) => {
                error!("internal error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => {
                AppError::unauthorized("invalid_credentials", "Incorrect email or password")
            }
            AuthError::InvalidToken(_) => {
                AppError::unauthorized("invalid_token", "Could not validate credentials")
            }
            AuthError::TokenExpired => AppError::unauthorized("token_expired", "Token has expired"),
            AuthError::TokenRevoked => {
                AppError::unauthorized("token_revoked", "Token has been revoked")
            }
            AuthError::InactiveAccount => {
                AppError::forbidden("account_inactive", "Account is inactive")
            }
            AuthError::StoreUnavailable(msg) => AppError::StoreUnavailable(msg),
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::Conflict(msg) => AppError::Conflict(msg),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_and_code(e: AuthError) -> (StatusCode, String) {
        let app: AppError = e.into();
        let code = match &app {
            AppError::Unauthorized { code, .. } | AppError::Forbidden { code, .. } => {
                code.to_string()
            }
            other => other.to_string(),
        };
        (app.into_response().status(), code)
    }

    #[test]
    fn token_failures_are_401_with_distinct_codes() {
        assert_eq!(
            status_and_code(AuthError::TokenRevoked),
            (StatusCode::UNAUTHORIZED, "token_revoked".into())
        );
        assert_eq!(
            status_and_code(AuthError::TokenExpired),
            (StatusCode::UNAUTHORIZED, "token_expired".into())
        );
        assert_eq!(
            status_and_code(AuthError::InvalidToken("bad sig".into())),
            (StatusCode::UNAUTHORIZED, "invalid_token".into())
        );
        assert_eq!(
            status_and_code(AuthError::InvalidCredentials),
            (StatusCode::UNAUTHORIZED, "invalid_credentials".into())
        );
    }

    #[test]
    fn inactive_is_403_and_store_outage_is_503() {
        assert_eq!(
            status_and_code(AuthError::InactiveAccount).0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_and_code(AuthError::StoreUnavailable("down".into())).0,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_and_code(AuthError::Conflict("dup".into())).0,
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn unauthorized_sets_bearer_challenge() {
        let resp = AppError::from(AuthError::TokenExpired).into_response();
        assert_eq!(resp.headers()[WWW_AUTHENTICATE], "Bearer");
    }
}
