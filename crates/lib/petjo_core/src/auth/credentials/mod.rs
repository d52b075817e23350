//! Credential store: where identities and their password hashes live.
//!
//! # Backends
//!
//! - [`postgres::PgCredentialStore`]: the `users` table
//! - [`memory::MemoryCredentialStore`]: in-process, for tests and local runs

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::auth::password::hash_password_blocking;
use crate::auth::revocation::RevocationStore;
use crate::auth::{AuthError, normalize_email, validate_email, validate_password_strength};
use crate::models::auth::{Identity, NewIdentity};

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// Errors raised by a credential backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Credential store unavailable: {0}")]
    Unavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound("row not found".into()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Persistence interface for identities.
///
/// Emails passed in are expected to be normalized already
/// (see [`super::normalize_email`]).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up an identity by login email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    /// Look up an identity by its external identity subject.
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Identity>, StoreError>;

    /// Look up an identity by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    /// Create an identity. Fails with [`StoreError::Conflict`] on a duplicate
    /// email or external id.
    async fn create(&self, new: NewIdentity) -> Result<Identity, StoreError>;

    /// Replace the password hash.
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    /// Attach an external identity to an existing account.
    async fn link_external_id(&self, id: Uuid, external_id: &str) -> Result<Identity, StoreError>;

    /// Set the active flag, returning the updated identity if it exists.
    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<Identity>, StoreError>;

    /// Set the superuser flag, returning the updated identity if it exists.
    async fn set_superuser(&self, id: Uuid, superuser: bool) -> Result<Option<Identity>, StoreError>;

    /// Whether an email is already registered.
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError>;

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Create a superuser, or promote and re-password an existing account.
///
/// Re-passwording an existing account denies every session it holds, after the
/// new hash is stored. Returns the identity and whether it was newly created.
pub async fn ensure_superuser(
    store: &dyn CredentialStore,
    revocation: &dyn RevocationStore,
    email: &str,
    password: &str,
    full_name: Option<String>,
) -> Result<(Identity, bool), AuthError> {
    let email = normalize_email(email);
    validate_email(&email)?;
    validate_password_strength(password)?;
    let password_hash = hash_password_blocking(password.to_string()).await?;

    if let Some(existing) = store.find_by_email(&email).await? {
        store.update_password_hash(existing.id, &password_hash).await?;
        let revoked = revocation.deny_all_for_subject(existing.id).await?;
        info!(user_id = %existing.id, revoked, "password replaced, sessions invalidated");
        store.set_active(existing.id, true).await?;
        let promoted = store
            .set_superuser(existing.id, true)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {}", existing.id)))?;
        info!(user_id = %promoted.id, "promoted existing account to superuser");
        return Ok((promoted, false));
    }

    let created = store
        .create(NewIdentity {
            email,
            password_hash: Some(password_hash),
            full_name,
            is_superuser: true,
            ..Default::default()
        })
        .await?;
    info!(user_id = %created.id, "created superuser");
    Ok((created, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::auth::revocation::MemoryRevocationStore;

    #[tokio::test]
    async fn ensure_superuser_creates_then_promotes() {
        let store = MemoryCredentialStore::new();
        let revocation = MemoryRevocationStore::new();

        let (created, is_new) =
            ensure_superuser(&store, &revocation, "Root@Petjo.test", "Adm1nPassword", None)
                .await
                .unwrap();
        assert!(is_new);
        assert!(created.is_superuser);
        assert_eq!(created.email, "root@petjo.test");

        let plain = store
            .create(NewIdentity {
                email: "plain@petjo.test".into(),
                password_hash: Some("x".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let (promoted, is_new) =
            ensure_superuser(&store, &revocation, "plain@petjo.test", "N3wAdminPass", None)
                .await
                .unwrap();
        assert!(!is_new);
        assert_eq!(promoted.id, plain.id);
        assert!(promoted.is_superuser);
        assert!(verify_password(
            "N3wAdminPass",
            promoted.password_hash.as_deref().unwrap()
        ));
    }

    #[tokio::test]
    async fn ensure_superuser_denies_sessions_of_repassworded_account() {
        let store = MemoryCredentialStore::new();
        let revocation = MemoryRevocationStore::new();
        let existing = store
            .create(NewIdentity {
                email: "u1@petjo.test".into(),
                password_hash: Some("x".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        revocation
            .track_for_subject(existing.id, "old-refresh-token", 3600)
            .await
            .unwrap();

        ensure_superuser(&store, &revocation, "u1@petjo.test", "N3wPassword", None)
            .await
            .unwrap();
        assert!(revocation.is_denied("old-refresh-token").await.unwrap());
    }

    #[tokio::test]
    async fn ensure_superuser_enforces_password_policy() {
        let store = MemoryCredentialStore::new();
        let revocation = MemoryRevocationStore::new();
        let err = ensure_superuser(&store, &revocation, "root@petjo.test", "weak", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }
}
