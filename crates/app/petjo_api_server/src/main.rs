//! PetJo API server binary.
//!
//! Serves the authentication API over HTTP, backed by PostgreSQL.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use petjo_api::config::{ApiConfig, RevocationBackend, parse_origins};
use petjo_core::auth::credentials::PgCredentialStore;
use petjo_core::auth::jwt::{TokenCodec, resolve_jwt_secret};
use petjo_core::auth::revocation::{
    MemoryRevocationStore, PgRevocationStore, RevocationStore, spawn_purge_task,
};
use petjo_core::auth::session::SessionManager;
use petjo_core::cache::spawn_eviction_task;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Longest accepted access token lifetime: one year.
const MAX_ACCESS_MINUTES: i64 = 365 * 24 * 60;

/// Longest accepted refresh token lifetime: ten years.
const MAX_REFRESH_DAYS: i64 = 3650;

/// CLI arguments for the API server. Every flag can also come from the
/// environment.
#[derive(Parser, Debug)]
#[command(name = "petjo_api_server", about = "PetJo API server", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8000")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/petjo"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,

    /// Access token lifetime in minutes.
    #[arg(
        long,
        env = "ACCESS_TOKEN_EXPIRE_MINUTES",
        default_value_t = 30,
        value_parser = clap::value_parser!(i64).range(1..=MAX_ACCESS_MINUTES)
    )]
    access_token_expire_minutes: i64,

    /// Refresh token lifetime in days.
    #[arg(
        long,
        env = "REFRESH_TOKEN_EXPIRE_DAYS",
        default_value_t = 7,
        value_parser = clap::value_parser!(i64).range(1..=MAX_REFRESH_DAYS)
    )]
    refresh_token_expire_days: i64,

    /// Where revocation records live: `postgres` (shared) or `memory`
    /// (single instance).
    #[arg(long, env = "REVOCATION_BACKEND", default_value = "postgres")]
    revocation_backend: RevocationBackend,

    /// Seconds between purges of expired revocation records and cache entries.
    #[arg(
        long,
        env = "REVOCATION_PURGE_SECS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    revocation_purge_secs: u64,

    /// Seconds a resolved identity stays cached for the auth guards.
    #[arg(
        long,
        env = "IDENTITY_CACHE_TTL_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(i64).range(0..=86_400)
    )]
    identity_cache_ttl_secs: i64,

    /// Comma-separated CORS origins; empty allows any.
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "")]
    allowed_origins: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,petjo_api=debug,petjo_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    let config = ApiConfig {
        bind_addr: args.bind_addr,
        database_url: args.database_url,
        jwt_secret: resolve_jwt_secret(),
        access_ttl_secs: args.access_token_expire_minutes * 60,
        refresh_ttl_secs: args.refresh_token_expire_days * 86_400,
        revocation_backend: args.revocation_backend,
        purge_interval_secs: args.revocation_purge_secs,
        identity_cache_ttl_secs: args.identity_cache_ttl_secs,
        allowed_origins: parse_origins(&args.allowed_origins),
    };

    info!(
        bind_addr = %config.bind_addr,
        max_connections = args.max_connections,
        revocation_backend = ?config.revocation_backend,
        "starting petjo_api_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    info!("running database migrations");
    petjo_core::migrate::migrate(&pool).await?;

    let revocation: Arc<dyn RevocationStore> = match config.revocation_backend {
        RevocationBackend::Postgres => Arc::new(PgRevocationStore::new(pool.clone())),
        RevocationBackend::Memory => {
            warn!("in-memory revocation store: revocations are not shared between instances");
            Arc::new(MemoryRevocationStore::new())
        }
    };

    let sessions = SessionManager::new(
        Arc::new(PgCredentialStore::new(pool.clone())),
        revocation.clone(),
        TokenCodec::new(config.jwt_secret.as_bytes()),
        config.session_config(),
    );

    let sweep_every = Duration::from_secs(config.purge_interval_secs);
    let ct = CancellationToken::new();
    let purge_handle = spawn_purge_task(revocation, sweep_every, ct.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    let state = petjo_api::AppState::new(config, sessions);
    let eviction_handle =
        spawn_eviction_task(state.identity_cache.clone(), sweep_every, ct.clone());
    let app = petjo_api::router(state);

    info!(addr = %local_addr, "REST API listening");

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(ct.clone()))
        .await;

    // Stop background work, then release the pool.
    ct.cancel();
    let _ = purge_handle.await;
    let _ = eviction_handle.await;
    pool.close().await;
    info!("shutdown complete");

    serve_result?;
    Ok(())
}

/// Resolves on ctrl-c (or SIGTERM on unix), cancelling `ct`.
async fn shutdown_signal(ct: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = ct.cancelled() => {},
    }
    info!("shutdown signal received");
    ct.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let args = Args::try_parse_from(["petjo_api_server"]).unwrap();
        assert_eq!(args.access_token_expire_minutes, 30);
        assert_eq!(args.refresh_token_expire_days, 7);
    }

    #[test]
    fn non_positive_lifetimes_are_rejected() {
        for flag in [
            "--access-token-expire-minutes=0",
            "--access-token-expire-minutes=-5",
            "--refresh-token-expire-days=0",
            "--refresh-token-expire-days=-1",
            "--revocation-purge-secs=0",
        ] {
            assert!(
                Args::try_parse_from(["petjo_api_server", flag]).is_err(),
                "{flag} should be rejected"
            );
        }
    }

    #[test]
    fn lifetimes_beyond_the_cap_are_rejected() {
        let too_long = format!("--refresh-token-expire-days={}", MAX_REFRESH_DAYS + 1);
        assert!(Args::try_parse_from(["petjo_api_server", too_long.as_str()]).is_err());
    }
}
