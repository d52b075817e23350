//! Signed bearer tokens (HS256 JWT).
//!
//! [`TokenCodec`] only proves that a token was minted by this process's secret
//! and is structurally sound. Expiry and revocation are judged by the caller
//! (see [`super::session::SessionManager`]), which keeps `decode` pure.

use std::fmt;
use std::path::PathBuf;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::info;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{TokenClaims, TokenKind};

/// Signs and verifies access and refresh tokens with a static secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from the process-wide signing secret.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is the session manager's call, not the codec's.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token for `subject_id` that expires `ttl_secs` from now.
    pub fn issue(&self, subject_id: Uuid, kind: TokenKind, ttl_secs: i64) -> Result<String, AuthError> {
        self.issue_at(subject_id, kind, ttl_secs, Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `now` (unix seconds).
    pub fn issue_at(
        &self,
        subject_id: Uuid,
        kind: TokenKind,
        ttl_secs: i64,
        now: i64,
    ) -> Result<String, AuthError> {
        let claims = TokenClaims {
            sub: subject_id.to_string(),
            kind,
            iat: now,
            exp: now + ttl_secs,
            jti: Uuid::new_v4().simple().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify signature and structure, returning the claims.
    ///
    /// Fails with [`AuthError::InvalidToken`] on a bad signature, a malformed
    /// payload or a missing/ill-formed claim. Never looks at the clock.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| AuthError::InvalidToken(format!("{e}")))?;
        let claims = data.claims;
        if claims.subject_id().is_none() {
            return Err(AuthError::InvalidToken("malformed subject".into()));
        }
        if claims.exp < claims.iat {
            return Err(AuthError::InvalidToken("expiry precedes issue time".into()));
        }
        Ok(claims)
    }
}

/// Resolve the signing secret: env var `SECRET_KEY` → `JWT_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    for var in ["SECRET_KEY", "JWT_SECRET"] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    // Generate and persist
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("petjo")
        .join("jwt-secret")
}
