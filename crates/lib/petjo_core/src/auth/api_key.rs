//! API keys and HMAC request signing.
//!
//! A client holds a public key (`pk_…`) and a secret (`sk_…`). Each request is
//! signed with HMAC-SHA256 over `METHOD|path|timestamp|body`, hex encoded.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::{RngCore, rng};
use sha2::Sha256;

use super::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Public key prefix.
pub const API_KEY_PREFIX: &str = "pk_";

/// Secret prefix.
pub const API_SECRET_PREFIX: &str = "sk_";

/// Maximum accepted clock skew for a signed request, in seconds.
pub const DEFAULT_MAX_AGE_SECS: i64 = 300;

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a new `(api_key, api_secret)` pair.
pub fn generate_api_key() -> (String, String) {
    (
        format!("{API_KEY_PREFIX}{}", random_token(32)),
        format!("{API_SECRET_PREFIX}{}", random_token(48)),
    )
}

fn signing_mac(
    api_secret: &str,
    method: &str,
    path: &str,
    timestamp: &str,
    body: &str,
) -> Result<HmacSha256, AuthError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(api_secret.as_bytes())
        .map_err(|e| AuthError::Internal(format!("hmac key: {e}")))?;
    mac.update(format!("{method}|{path}|{timestamp}|{body}").as_bytes());
    Ok(mac)
}

/// Hex HMAC-SHA256 signature of a request.
pub fn compute_signature(
    method: &str,
    path: &str,
    timestamp: &str,
    body: &str,
    api_secret: &str,
) -> Result<String, AuthError> {
    let digest = signing_mac(api_secret, method, path, timestamp, body)?
        .finalize()
        .into_bytes();
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if !s.len().is_multiple_of(2) {
        return None;
    }
    s.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some(((hi << 4) | lo) as u8)
        })
        .collect()
}

/// A request presented for signature verification.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub timestamp: &'a str,
    pub body: &'a str,
    pub api_key: &'a str,
    pub signature: &'a str,
}

/// Verify a signed request against the stored secret for its API key.
///
/// Rejects malformed keys, timestamps outside `max_age_secs` of now and
/// signatures that do not match. The comparison is constant time.
pub fn verify_signature(request: &SignedRequest<'_>, api_secret: &str, max_age_secs: i64) -> bool {
    verify_signature_at(request, api_secret, max_age_secs, Utc::now().timestamp())
}

/// [`verify_signature`] with an explicit current time (unix seconds).
pub fn verify_signature_at(
    request: &SignedRequest<'_>,
    api_secret: &str,
    max_age_secs: i64,
    now: i64,
) -> bool {
    if !request.api_key.starts_with(API_KEY_PREFIX) {
        return false;
    }
    let Ok(sent_at) = request.timestamp.parse::<i64>() else {
        return false;
    };
    if now.abs_diff(sent_at) > max_age_secs.unsigned_abs() {
        return false;
    }
    let Some(provided) = decode_hex(request.signature) else {
        return false;
    };
    signing_mac(
        api_secret,
        request.method,
        request.path,
        request.timestamp,
        request.body,
    )
    .is_ok_and(|mac| mac.verify_slice(&provided).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn signed<'a>(api_key: &'a str, timestamp: &'a str, signature: &'a str) -> SignedRequest<'a> {
        SignedRequest {
            method: "POST",
            path: "/api/v1/pets",
            timestamp,
            body: r#"{"name":"Rex"}"#,
            api_key,
            signature,
        }
    }

    #[test]
    fn generated_keys_carry_prefixes() {
        let (key, secret) = generate_api_key();
        assert!(key.starts_with("pk_"));
        assert!(secret.starts_with("sk_"));
        assert_ne!(generate_api_key().0, key);
    }

    #[test]
    fn signature_is_lowercase_hex() {
        let sig = compute_signature("GET", "/", "0", "", "sk_x").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn valid_signature_verifies() {
        let (key, secret) = generate_api_key();
        let ts = NOW.to_string();
        let sig = compute_signature("POST", "/api/v1/pets", &ts, r#"{"name":"Rex"}"#, &secret).unwrap();
        assert!(verify_signature_at(&signed(&key, &ts, &sig), &secret, 300, NOW + 10));
    }

    #[test]
    fn wrong_secret_or_tampered_body_fails() {
        let (key, secret) = generate_api_key();
        let ts = NOW.to_string();
        let sig = compute_signature("POST", "/api/v1/pets", &ts, r#"{"name":"Rex"}"#, &secret).unwrap();

        assert!(!verify_signature_at(&signed(&key, &ts, &sig), "sk_other", 300, NOW));

        let mut tampered = signed(&key, &ts, &sig);
        tampered.body = r#"{"name":"Max"}"#;
        assert!(!verify_signature_at(&tampered, &secret, 300, NOW));
    }

    #[test]
    fn stale_timestamp_fails() {
        let (key, secret) = generate_api_key();
        let ts = NOW.to_string();
        let sig = compute_signature("POST", "/api/v1/pets", &ts, r#"{"name":"Rex"}"#, &secret).unwrap();
        assert!(!verify_signature_at(&signed(&key, &ts, &sig), &secret, 300, NOW + 301));
        assert!(!verify_signature_at(&signed(&key, &ts, &sig), &secret, 300, NOW - 301));
    }

    #[test]
    fn malformed_inputs_fail() {
        let (key, secret) = generate_api_key();
        let ts = NOW.to_string();
        let sig = compute_signature("POST", "/api/v1/pets", &ts, r#"{"name":"Rex"}"#, &secret).unwrap();

        assert!(!verify_signature_at(&signed("key_without_prefix", &ts, &sig), &secret, 300, NOW));
        assert!(!verify_signature_at(&signed(&key, "yesterday", &sig), &secret, 300, NOW));
        let min = i64::MIN.to_string();
        let max = i64::MAX.to_string();
        assert!(!verify_signature_at(&signed(&key, &min, &sig), &secret, 300, NOW));
        assert!(!verify_signature_at(&signed(&key, &max, &sig), &secret, 300, NOW));
        assert!(!verify_signature_at(&signed(&key, &ts, "zz"), &secret, 300, NOW));
        assert!(!verify_signature_at(&signed(&key, &ts, &sig[..63]), &secret, 300, NOW));
    }
}
