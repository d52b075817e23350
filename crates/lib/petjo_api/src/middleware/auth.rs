//! Authentication middleware: bearer token extraction, session verification and
//! the superuser guard.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use petjo_core::auth::AuthError;
use petjo_core::models::auth::Identity;

use crate::AppState;
use crate::error::AppError;
use crate::services::identity::load_identity;

/// The caller resolved from a verified bearer token, stored in request
/// extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: Identity,
    /// The raw bearer token, kept so logout can revoke it.
    pub access_token: String,
}

fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("invalid_token", "Missing authorization header"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("invalid_token", "Invalid authorization scheme"))?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AppError::unauthorized(
            "invalid_token",
            "Invalid authorization scheme",
        ));
    }
    Ok(token.trim())
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies it
/// with the session manager, loads the active identity and injects
/// [`AuthenticatedUser`] into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)?.to_string();
    let subject_id = state.sessions.verify_access(&token).await?;

    let identity = match load_identity(&state, subject_id).await {
        Ok(identity) => identity,
        // A token for a subject that no longer exists is just an invalid token.
        Err(AuthError::NotFound(_)) => {
            return Err(AuthError::InvalidToken("unknown subject".into()).into());
        }
        Err(e) => return Err(e.into()),
    };
    if !identity.is_active {
        return Err(AuthError::InactiveAccount.into());
    }

    request.extensions_mut().insert(AuthenticatedUser {
        identity,
        access_token: token,
    });
    Ok(next.run(request).await)
}

/// Axum middleware: requires [`require_auth`] to have run and the caller to be
/// a superuser.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let is_superuser = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.identity.is_superuser)
        .ok_or_else(|| AppError::unauthorized("invalid_token", "Not authenticated"))?;
    if !is_superuser {
        return Err(AppError::forbidden(
            "forbidden",
            "Superuser privileges required",
        ));
    }
    Ok(next.run(request).await)
}
