//! Authentication request handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    LoginRequest, LogoutRequest, RefreshRequest, RegisterRequest, SuccessResponse, TokenResponse,
    UserResponse,
};

/// `POST /auth/register`: create a password account.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let identity = state
        .sessions
        .register(&body.email, &body.password, body.full_name)
        .await?;
    Ok((StatusCode::CREATED, Json(identity.into())))
}

/// `POST /auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state.sessions.login(&body.email, &body.password).await?;
    Ok(Json(pair.into()))
}

/// `POST /auth/refresh`: exchange a refresh token for a new pair. The
/// presented token is consumed.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = state.sessions.refresh(&body.refresh_token).await?;
    Ok(Json(pair.into()))
}

/// `POST /auth/logout`: revoke the refresh token and the bearer access token.
/// Idempotent.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<LogoutRequest>,
) -> AppResult<Json<SuccessResponse>> {
    state.sessions.logout(&body.refresh_token).await?;
    state.sessions.revoke_access(&user.access_token).await?;
    Ok(Json(SuccessResponse { success: true }))
}
