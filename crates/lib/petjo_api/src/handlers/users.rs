//! Current-user handlers.

use axum::extract::State;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{ChangePasswordRequest, ChangePasswordResponse, UserResponse};
use crate::services::identity::forget_identity;

/// `GET /users/me`
pub async fn me_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<UserResponse> {
    Json(user.identity.into())
}

/// `POST /users/me/change-password`: replace the password and revoke every
/// session of the caller.
pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> AppResult<Json<ChangePasswordResponse>> {
    let user_id = user.identity.id;
    let sessions_revoked = state
        .sessions
        .change_password(user_id, &body.old_password, &body.new_password)
        .await?;
    forget_identity(&state, user_id);
    Ok(Json(ChangePasswordResponse {
        success: true,
        sessions_revoked,
    }))
}
