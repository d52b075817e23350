//! API server configuration.

use std::str::FromStr;

use petjo_core::auth::session::{DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS, SessionConfig};

/// Where revocation records live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationBackend {
    /// Shared `revoked_tokens` / `subject_tokens` tables.
    Postgres,
    /// In-process maps; single instance only.
    Memory,
}

impl FromStr for RevocationBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown revocation backend: {other}")),
        }
    }
}

/// Configuration for the API server. The server binary fills it from flags
/// and their environment fallbacks.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8000").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// JWT signing secret. Static for the process lifetime.
    pub jwt_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub revocation_backend: RevocationBackend,
    /// Interval between purges of expired revocation records.
    pub purge_interval_secs: u64,
    /// Lifetime of cached identities used by the auth guards.
    pub identity_cache_ttl_secs: i64,
    /// CORS origins. Empty or `*` allows any origin.
    pub allowed_origins: Vec<String>,
}

/// Split a comma-separated origin list.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl ApiConfig {
    /// A configuration for in-process use: memory revocation, fixed secret.
    pub fn for_testing(jwt_secret: &str) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            database_url: String::new(),
            jwt_secret: jwt_secret.into(),
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            revocation_backend: RevocationBackend::Memory,
            purge_interval_secs: 300,
            identity_cache_ttl_secs: 30,
            allowed_origins: Vec::new(),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            access_ttl_secs: self.access_ttl_secs,
            refresh_ttl_secs: self.refresh_ttl_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("Postgres".parse(), Ok(RevocationBackend::Postgres));
        assert_eq!(" memory ".parse(), Ok(RevocationBackend::Memory));
        assert!("redis".parse::<RevocationBackend>().is_err());
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        assert_eq!(
            parse_origins("https://a.petjo.app, https://b.petjo.app,,"),
            vec!["https://a.petjo.app", "https://b.petjo.app"]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn session_config_follows_ttls() {
        let config = ApiConfig::for_testing("s");
        assert_eq!(config.session_config(), SessionConfig::default());
    }
}
