//! Token revocation store.
//!
//! A shared denylist of tokens that must no longer be honoured, plus a
//! per-subject index of issued refresh tokens so that every session of one
//! identity can be killed at once. Every record lives exactly as long as the
//! token it shadows: once the token has expired on its own the record is moot.
//!
//! Records are keyed by [`revocation_key`] (SHA-256 of the raw token) so raw
//! bearer credentials never sit in the store.
//!
//! # Backends
//!
//! - [`postgres::PgRevocationStore`]: shared across process instances
//! - [`memory::MemoryRevocationStore`]: single process, tests

pub mod memory;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

pub use memory::MemoryRevocationStore;
pub use postgres::PgRevocationStore;

/// Errors raised by a revocation backend.
#[derive(Debug, Error)]
pub enum RevocationError {
    #[error("Revocation store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for RevocationError {
    fn from(e: sqlx::Error) -> Self {
        RevocationError::Unavailable(e.to_string())
    }
}

/// Storage interface for denied tokens.
///
/// Each operation is individually atomic. Sequences of operations are not;
/// callers that need at-most-once semantics must rely on the result of
/// [`RevocationStore::deny`].
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Deny `token` for `ttl_secs` seconds.
    ///
    /// Returns `true` when this call created the denial and `false` when the
    /// token was already denied. Of several concurrent callers denying the same
    /// token, exactly one observes `true`. A non-positive TTL writes nothing.
    async fn deny(&self, token: &str, ttl_secs: i64) -> Result<bool, RevocationError>;

    /// Whether `token` is currently denied.
    async fn is_denied(&self, token: &str) -> Result<bool, RevocationError>;

    /// Remember `token` as one of `subject_id`'s live refresh tokens.
    async fn track_for_subject(
        &self,
        subject_id: Uuid,
        token: &str,
        ttl_secs: i64,
    ) -> Result<(), RevocationError>;

    /// Deny every live tracked token of `subject_id` and clear its index.
    ///
    /// Returns the number of tokens newly denied by this call.
    async fn deny_all_for_subject(&self, subject_id: Uuid) -> Result<u64, RevocationError>;

    /// Drop records whose token has expired. Returns the number removed.
    async fn purge_expired(&self) -> Result<u64, RevocationError>;

    /// Backend name for logging.
    fn backend(&self) -> &'static str;
}

/// Derive the storage key for a raw token string.
pub fn revocation_key(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Spawn a periodic purge of expired records until `ct` is cancelled.
pub fn spawn_purge_task(
    store: Arc<dyn RevocationStore>,
    every: Duration,
    ct: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = ct.cancelled() => break,
                _ = interval.tick() => {
                    match store.purge_expired().await {
                        Ok(0) => {}
                        Ok(n) => debug!(removed = n, backend = store.backend(), "purged expired revocation records"),
                        Err(e) => warn!(backend = store.backend(), "revocation purge failed: {e}"),
                    }
                }
            }
        }
    })
}
