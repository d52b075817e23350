//! Superuser account moderation.

use axum::extract::{Path, State};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::UserResponse;
use crate::services::identity::forget_identity;

/// `POST /admin/users/{id}/activate`
pub async fn activate_user_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    let identity = state.sessions.set_active(id, true).await?;
    forget_identity(&state, id);
    Ok(Json(identity.into()))
}

/// `POST /admin/users/{id}/deactivate`: also revokes every session of the
/// target account.
pub async fn deactivate_user_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserResponse>> {
    if admin.identity.id == id {
        return Err(AppError::Validation(
            "Cannot deactivate your own account".into(),
        ));
    }
    let identity = state.sessions.set_active(id, false).await?;
    forget_identity(&state, id);
    Ok(Json(identity.into()))
}
