//! Identity lookups through the cache-aside identity cache.

use chrono::Duration;
use petjo_core::auth::AuthError;
use petjo_core::models::auth::Identity;
use uuid::Uuid;

use crate::AppState;

/// Load an identity, serving from the cache while the entry is fresh.
///
/// A missing identity is [`AuthError::NotFound`] and is not cached.
pub async fn load_identity(state: &AppState, id: Uuid) -> Result<Identity, AuthError> {
    let ttl = Duration::seconds(state.config.identity_cache_ttl_secs);
    let credentials = state.sessions.credentials().clone();
    state
        .identity_cache
        .get_or_fetch(id, ttl, || async move {
            let found = credentials.find_by_id(id).await.map_err(AuthError::from)?;
            found.ok_or_else(|| AuthError::NotFound(format!("user {id}")))
        })
        .await
}

/// Drop a cached identity after it changed.
pub fn forget_identity(state: &AppState, id: Uuid) {
    state.identity_cache.invalidate(&id);
}
