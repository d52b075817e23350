//! Authentication domain models.
//!
//! These are internal domain models, distinct from the request/response types
//! in `petjo_api::models`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A principal capable of authenticating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    /// Login identifier, stored trimmed and lower-cased.
    pub email: String,
    /// bcrypt digest. `None` for external-identity-only accounts.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// External identity subject (e.g. a Google account id).
    pub external_id: Option<String>,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create an identity.
#[derive(Debug, Clone, Default)]
pub struct NewIdentity {
    pub email: String,
    pub password_hash: Option<String>,
    pub external_id: Option<String>,
    pub full_name: Option<String>,
    pub is_superuser: bool,
}

/// Token discriminator embedded in every signed token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(TokenKind::Access),
            "refresh" => Ok(TokenKind::Refresh),
            other => Err(format!("unknown token kind: {other}")),
        }
    }
}

/// JWT claims embedded in access and refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    /// Subject: identity id (standard JWT `sub` claim).
    pub sub: String,
    /// Token kind.
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Issued at (unix timestamp, seconds).
    pub iat: i64,
    /// Expiry (unix timestamp, seconds).
    pub exp: i64,
    /// Unique token id; keeps two tokens minted in the same second distinct.
    pub jti: String,
}

impl TokenClaims {
    /// Subject as a UUID. Only fails for tokens not minted by this codec.
    pub fn subject_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    /// A token is expired when `now >= exp`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }

    /// Seconds left before expiry, clamped at zero.
    pub fn remaining_secs(&self, now: i64) -> i64 {
        (self.exp - now).max(0)
    }
}

/// A freshly issued access + refresh token pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}
