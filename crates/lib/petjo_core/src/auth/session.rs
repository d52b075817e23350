//! Session manager: combines identity verification, token issuance and
//! revocation into stateful session semantics.
//!
//! A refresh token moves through ISSUED → CONSUMED | EXPIRED | REVOKED. The
//! state is never stored as such; it is derived from the token's signed expiry
//! and the revocation store.
//!
//! Revocation reads fail open: if the store cannot be reached a token is treated
//! as not denied and a warning is logged. Revocation writes never fail open; a
//! failed denial aborts with [`AuthError::StoreUnavailable`].

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::credentials::CredentialStore;
use crate::auth::jwt::TokenCodec;
use crate::auth::password::{
    hash_password_blocking, verify_dummy_blocking, verify_password_blocking,
};
use crate::auth::revocation::RevocationStore;
use crate::auth::{AuthError, normalize_email, validate_email, validate_password_strength};
use crate::models::auth::{Identity, NewIdentity, TokenClaims, TokenKind, TokenPair};

/// Default access token lifetime: 30 minutes.
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 30 * 60;

/// Default refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Token lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
        }
    }
}

/// Orchestrates login, refresh rotation, logout and bulk invalidation.
///
/// Holds no mutable state of its own; all shared state lives in the injected
/// stores, so one instance can be cloned into every request task.
#[derive(Clone)]
pub struct SessionManager {
    credentials: Arc<dyn CredentialStore>,
    revocation: Arc<dyn RevocationStore>,
    codec: TokenCodec,
    config: SessionConfig,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("revocation", &self.revocation.backend())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        revocation: Arc<dyn RevocationStore>,
        codec: TokenCodec,
        config: SessionConfig,
    ) -> Self {
        Self {
            credentials,
            revocation,
            codec,
            config,
        }
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    pub fn revocation(&self) -> &Arc<dyn RevocationStore> {
        &self.revocation
    }

    // -----------------------------------------------------------------------
    // Token lifecycle
    // -----------------------------------------------------------------------

    /// Authenticate with identifier + password and issue a token pair.
    ///
    /// Unknown identifier, missing password hash and wrong password all yield
    /// the same [`AuthError::InvalidCredentials`] after the same bcrypt work.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<TokenPair, AuthError> {
        let email = normalize_email(identifier);
        let found = self.credentials.find_by_email(&email).await?;

        let Some((identity, hash)) =
            found.and_then(|i| i.password_hash.clone().map(|hash| (i, hash)))
        else {
            verify_dummy_blocking(password.to_string()).await;
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password_blocking(password.to_string(), hash).await {
            return Err(AuthError::InvalidCredentials);
        }
        if !identity.is_active {
            return Err(AuthError::InactiveAccount);
        }

        info!(user_id = %identity.id, "login succeeded");
        self.issue_pair(identity.id).await
    }

    /// Exchange a refresh token for a fresh pair. Each refresh token can be
    /// exchanged at most once, even under concurrent presentation.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.codec.decode(refresh_token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::InvalidToken("not a refresh token".into()));
        }
        let now = Utc::now().timestamp();
        if claims.is_expired_at(now) {
            return Err(AuthError::TokenExpired);
        }
        if self.is_denied(refresh_token).await {
            return Err(AuthError::TokenRevoked);
        }

        let subject_id = subject_of(&claims)?;
        let identity = self
            .credentials
            .find_by_id(subject_id)
            .await?
            .ok_or_else(|| AuthError::InvalidToken("unknown subject".into()))?;
        if !identity.is_active {
            return Err(AuthError::InactiveAccount);
        }

        // The claim: only the caller whose deny creates the record may proceed.
        let ttl = claims.remaining_secs(now);
        if !self.revocation.deny(refresh_token, ttl).await? {
            debug!(user_id = %subject_id, "refresh token replayed");
            return Err(AuthError::TokenRevoked);
        }

        self.issue_pair(subject_id).await
    }

    /// Deny a refresh token. Idempotent: tokens that do not decode, are
    /// already expired or already denied are a successful no-op.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.deny_presented(refresh_token, TokenKind::Refresh).await
    }

    /// Deny an access token for the rest of its lifetime. Same idempotency as
    /// [`Self::logout`].
    pub async fn revoke_access(&self, access_token: &str) -> Result<(), AuthError> {
        self.deny_presented(access_token, TokenKind::Access).await
    }

    /// Deny every tracked refresh token of a subject. Returns how many tokens
    /// were newly denied.
    pub async fn invalidate_all_sessions(&self, subject_id: Uuid) -> Result<u64, AuthError> {
        let count = self.revocation.deny_all_for_subject(subject_id).await?;
        info!(user_id = %subject_id, revoked = count, "invalidated all sessions");
        Ok(count)
    }

    /// Resolve the subject of a bearer access token.
    pub async fn verify_access(&self, access_token: &str) -> Result<Uuid, AuthError> {
        let claims = self.codec.decode(access_token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::InvalidToken("not an access token".into()));
        }
        if claims.is_expired_at(Utc::now().timestamp()) {
            return Err(AuthError::TokenExpired);
        }
        if self.is_denied(access_token).await {
            return Err(AuthError::TokenRevoked);
        }
        subject_of(&claims)
    }

    // -----------------------------------------------------------------------
    // Account flows
    // -----------------------------------------------------------------------

    /// Create a password account.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        full_name: Option<String>,
    ) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password_strength(password)?;

        if self.credentials.email_exists(&email).await? {
            return Err(AuthError::Conflict("Email already registered".into()));
        }

        let password_hash = hash_password_blocking(password.to_string()).await?;
        let identity = self
            .credentials
            .create(NewIdentity {
                email,
                password_hash: Some(password_hash),
                full_name,
                ..Default::default()
            })
            .await?;
        info!(user_id = %identity.id, "registered user");
        Ok(identity)
    }

    /// Log in with an identity asserted by an external provider.
    ///
    /// The assertion must already be verified by the caller. An existing
    /// account with the same email and no external link is linked; otherwise
    /// an external-only account is created.
    pub async fn login_external(
        &self,
        external_id: &str,
        email: &str,
        full_name: Option<String>,
    ) -> Result<TokenPair, AuthError> {
        let email = normalize_email(email);
        let identity = match self.credentials.find_by_external_id(external_id).await? {
            Some(identity) => identity,
            None => match self.credentials.find_by_email(&email).await? {
                Some(existing) if existing.external_id.is_none() => {
                    info!(user_id = %existing.id, "linking external identity");
                    self.credentials
                        .link_external_id(existing.id, external_id)
                        .await?
                }
                Some(_) => {
                    return Err(AuthError::Conflict(
                        "Email is linked to another external identity".into(),
                    ));
                }
                None => {
                    validate_email(&email)?;
                    let created = self
                        .credentials
                        .create(NewIdentity {
                            email,
                            external_id: Some(external_id.to_string()),
                            full_name,
                            ..Default::default()
                        })
                        .await?;
                    info!(user_id = %created.id, "created external identity account");
                    created
                }
            },
        };

        if !identity.is_active {
            return Err(AuthError::InactiveAccount);
        }
        self.issue_pair(identity.id).await
    }

    /// Replace a password and invalidate every session of the subject.
    ///
    /// The hash update commits before the invalidation runs. Returns the number
    /// of sessions revoked.
    pub async fn change_password(
        &self,
        subject_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<u64, AuthError> {
        let identity = self
            .credentials
            .find_by_id(subject_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {subject_id}")))?;

        let Some(hash) = identity.password_hash else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password_blocking(old_password.to_string(), hash).await {
            return Err(AuthError::InvalidCredentials);
        }
        validate_password_strength(new_password)?;
        if old_password == new_password {
            return Err(AuthError::Validation(
                "New password must differ from the current one".into(),
            ));
        }

        let new_hash = hash_password_blocking(new_password.to_string()).await?;
        self.credentials
            .update_password_hash(subject_id, &new_hash)
            .await?;
        self.invalidate_all_sessions(subject_id).await
    }

    /// Activate or deactivate an account. Deactivation also revokes every
    /// session of the account.
    pub async fn set_active(&self, subject_id: Uuid, active: bool) -> Result<Identity, AuthError> {
        let identity = self
            .credentials
            .set_active(subject_id, active)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("user {subject_id}")))?;
        if !active {
            self.invalidate_all_sessions(subject_id).await?;
        }
        info!(user_id = %subject_id, active, "account activation changed");
        Ok(identity)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    async fn issue_pair(&self, subject_id: Uuid) -> Result<TokenPair, AuthError> {
        let access_token =
            self.codec
                .issue(subject_id, TokenKind::Access, self.config.access_ttl_secs)?;
        let refresh_token =
            self.codec
                .issue(subject_id, TokenKind::Refresh, self.config.refresh_ttl_secs)?;

        if let Err(e) = self
            .revocation
            .track_for_subject(subject_id, &refresh_token, self.config.refresh_ttl_secs)
            .await
        {
            warn!(user_id = %subject_id, "failed to track refresh token: {e}");
        }

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.config.access_ttl_secs,
        })
    }

    async fn deny_presented(&self, token: &str, kind: TokenKind) -> Result<(), AuthError> {
        let claims = match self.codec.decode(token) {
            Ok(claims) if claims.kind == kind => claims,
            _ => {
                debug!(%kind, "ignoring undecodable token on revoke");
                return Ok(());
            }
        };
        let remaining = claims.remaining_secs(Utc::now().timestamp());
        if remaining == 0 {
            return Ok(());
        }
        self.revocation.deny(token, remaining).await?;
        Ok(())
    }

    /// Fail-open denial check.
    async fn is_denied(&self, token: &str) -> bool {
        match self.revocation.is_denied(token).await {
            Ok(denied) => denied,
            Err(e) => {
                warn!(
                    backend = self.revocation.backend(),
                    "revocation check failed, treating token as not denied: {e}"
                );
                false
            }
        }
    }
}

fn subject_of(claims: &TokenClaims) -> Result<Uuid, AuthError> {
    claims
        .subject_id()
        .ok_or_else(|| AuthError::InvalidToken("invalid subject".into()))
}
