//! # petjo_api
//!
//! HTTP API library for PetJo authentication.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use petjo_core::auth::session::SessionManager;
use petjo_core::cache::TtlCache;
use petjo_core::models::auth::Identity;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, health, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// Session manager over the injected credential and revocation stores.
    pub sessions: SessionManager,
    /// Identities resolved by the auth guards.
    pub identity_cache: Arc<TtlCache<Uuid, Identity>>,
}

impl AppState {
    pub fn new(config: ApiConfig, sessions: SessionManager) -> Self {
        let identity_cache = Arc::new(TtlCache::new(config.identity_cache_ttl_secs));
        Self {
            config,
            sessions,
            identity_cache,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    // Public routes (no auth required)
    let public = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler));

    // Protected routes (require a valid access token)
    let protected = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/users/me", get(users::me_handler))
        .route(
            "/users/me/change-password",
            post(users::change_password_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    // Superuser routes; layers run bottom-up, so auth runs before the admin check.
    let admin = Router::new()
        .route(
            "/admin/users/{id}/activate",
            post(admin::activate_user_handler),
        )
        .route(
            "/admin/users/{id}/deactivate",
            post(admin::deactivate_user_handler),
        )
        .route_layer(axum::middleware::from_fn(middleware::auth::require_admin))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    let api = Router::new().merge(public).merge(protected).merge(admin);

    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
