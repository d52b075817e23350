//! Authentication and session management.
//!
//! Provides password hashing, token signing, the revocation store, the
//! credential store and the [`session::SessionManager`] that ties them together.

pub mod api_key;
pub mod credentials;
pub mod jwt;
pub mod password;
pub mod revocation;
pub mod session;

use thiserror::Error;

use crate::auth::credentials::StoreError;
use crate::auth::revocation::RevocationError;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum accepted password length.
pub const MAX_PASSWORD_LEN: usize = 100;

/// Authentication errors.
///
/// Every expected outcome of the session flows has its own variant so the
/// HTTP boundary can map them without inspecting messages.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is inactive")]
    InactiveAccount,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => AuthError::StoreUnavailable(msg),
            StoreError::Conflict(msg) => AuthError::Conflict(msg),
            StoreError::NotFound(msg) => AuthError::NotFound(msg),
        }
    }
}

impl From<RevocationError> for AuthError {
    fn from(e: RevocationError) -> Self {
        AuthError::StoreUnavailable(e.to_string())
    }
}

/// Trim and lower-case a login identifier.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Reject emails that are obviously malformed.
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err(AuthError::Validation("Invalid email address".into()));
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || email.contains(' ') {
        return Err(AuthError::Validation("Invalid email address".into()));
    }
    Ok(())
}

/// Enforce the password policy: length bounds plus at least one upper-case
/// letter, one lower-case letter and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(AuthError::Validation(
            "Password must contain at least one uppercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(AuthError::Validation(
            "Password must contain at least one lowercase letter".into(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::Validation(
            "Password must contain at least one digit".into(),
        ));
    }
    Ok(())
}
