//! PostgreSQL-backed revocation store.
//!
//! Shared by every process that points at the same database. Postgres has no
//! native key expiry, so each row carries `expires_at`, reads ignore expired
//! rows and [`PgRevocationStore::purge_expired`] garbage-collects them.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{RevocationError, RevocationStore, revocation_key};

/// Revocation store over the `revoked_tokens` and `subject_tokens` tables.
#[derive(Debug, Clone)]
pub struct PgRevocationStore {
    pool: PgPool,
}

impl PgRevocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Close the underlying connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RevocationStore for PgRevocationStore {
    async fn deny(&self, token: &str, ttl_secs: i64) -> Result<bool, RevocationError> {
        if ttl_secs <= 0 {
            return Ok(false);
        }
        let expires_at = Utc::now() + Duration::seconds(ttl_secs);
        // The unique index serializes racing inserts; only one of them gets a row.
        let result = sqlx::query(
            "INSERT INTO revoked_tokens (token_key, expires_at) VALUES ($1, $2) \
             ON CONFLICT (token_key) DO UPDATE \
                SET expires_at = EXCLUDED.expires_at, revoked_at = now() \
                WHERE revoked_tokens.expires_at <= now()",
        )
        .bind(revocation_key(token))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn is_denied(&self, token: &str) -> Result<bool, RevocationError> {
        let denied = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM revoked_tokens \
             WHERE token_key = $1 AND expires_at > now())",
        )
        .bind(revocation_key(token))
        .fetch_one(&self.pool)
        .await?;
        Ok(denied)
    }

    async fn track_for_subject(
        &self,
        subject_id: Uuid,
        token: &str,
        ttl_secs: i64,
    ) -> Result<(), RevocationError> {
        if ttl_secs <= 0 {
            return Ok(());
        }
        let expires_at = Utc::now() + Duration::seconds(ttl_secs);
        sqlx::query(
            "INSERT INTO subject_tokens (subject_id, token_key, expires_at) VALUES ($1, $2, $3) \
             ON CONFLICT (subject_id, token_key) DO UPDATE \
                SET expires_at = GREATEST(subject_tokens.expires_at, EXCLUDED.expires_at)",
        )
        .bind(subject_id)
        .bind(revocation_key(token))
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deny_all_for_subject(&self, subject_id: Uuid) -> Result<u64, RevocationError> {
        // One statement: the index is drained and its live entries denied atomically.
        let result = sqlx::query(
            "WITH drained AS ( \
                DELETE FROM subject_tokens WHERE subject_id = $1 \
                RETURNING token_key, expires_at \
             ) \
             INSERT INTO revoked_tokens (token_key, expires_at) \
             SELECT token_key, expires_at FROM drained WHERE expires_at > now() \
             ON CONFLICT (token_key) DO UPDATE \
                SET expires_at = EXCLUDED.expires_at, revoked_at = now() \
                WHERE revoked_tokens.expires_at <= now()",
        )
        .bind(subject_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired(&self) -> Result<u64, RevocationError> {
        let denied = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        let tracked = sqlx::query("DELETE FROM subject_tokens WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;
        Ok(denied.rows_affected() + tracked.rows_affected())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
