//! PostgreSQL credential store over the `users` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CredentialStore, StoreError};
use crate::models::auth::{Identity, NewIdentity};

const IDENTITY_COLUMNS: &str =
    "id, email, password_hash, external_id, full_name, is_active, is_superuser, created_at";

type IdentityRow = (
    Uuid,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
    bool,
    DateTime<Utc>,
);

fn into_identity(row: IdentityRow) -> Identity {
    let (id, email, password_hash, external_id, full_name, is_active, is_superuser, created_at) =
        row;
    Identity {
        id,
        email,
        password_hash,
        external_id,
        full_name,
        is_active,
        is_superuser,
        created_at,
    }
}

/// Credential store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for callers that share it.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(into_identity))
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Identity>, StoreError> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE external_id = $1");
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(into_identity))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, StoreError> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(into_identity))
    }

    async fn create(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let sql = format!(
            "INSERT INTO users (id, email, password_hash, external_id, full_name, is_superuser) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {IDENTITY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.external_id)
            .bind(&new.full_name)
            .bind(new.is_superuser)
            .fetch_one(&self.pool)
            .await?;
        Ok(into_identity(row))
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn link_external_id(&self, id: Uuid, external_id: &str) -> Result<Identity, StoreError> {
        let sql = format!(
            "UPDATE users SET external_id = $2, updated_at = now() WHERE id = $1 \
             RETURNING {IDENTITY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id)
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(into_identity)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<Identity>, StoreError> {
        let sql = format!(
            "UPDATE users SET is_active = $2, updated_at = now() WHERE id = $1 \
             RETURNING {IDENTITY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id)
            .bind(active)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(into_identity))
    }

    async fn set_superuser(&self, id: Uuid, superuser: bool) -> Result<Option<Identity>, StoreError> {
        let sql = format!(
            "UPDATE users SET is_superuser = $2, updated_at = now() WHERE id = $1 \
             RETURNING {IDENTITY_COLUMNS}"
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id)
            .bind(superuser)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(into_identity))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
