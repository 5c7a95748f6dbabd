//! # Escape Room HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /game-sessions` - List sessions, newest first
//! - `POST /game-sessions` - Create a session
//! - `GET /game-sessions/{id}` - Fetch a session with timer and stages
//! - `PUT /game-sessions/{id}` - Partially update a session
//! - `DELETE /game-sessions/{id}` - Delete a session and its records
//! - `POST /stages` - Upsert a stage completion
//! - `GET /game-stats` - Recompute and return aggregate statistics
//! - `POST /game-stats` - Overwrite statistics fields
//!
//! ## Security Configuration
//!
//! See [`crate::config::SecurityConfig`]: CORS origins, global rate limit and
//! an optional bearer API key.

mod auth;
mod handlers;
mod middleware;
pub mod types;

pub use auth::keys_match;
pub use middleware::create_rate_limiter;

use crate::config::{CorsOrigins, SecurityConfig};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use escape_core::{EscapeError, StoreBackend};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body (puzzle submissions are the biggest).
const MAX_BODY_BYTES: usize = 256 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the session store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<StoreBackend>>,
}

impl AppState {
    /// Create new app state around a store.
    #[must_use]
    pub fn new(store: StoreBackend) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build the CORS layer for the configured origins.
///
/// Invalid origins are skipped; if none remain the layer falls back to
/// localhost only.
fn build_cors_layer(origins: &CorsOrigins) -> CorsLayer {
    match origins {
        CorsOrigins::Any => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        CorsOrigins::Localhost => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
        CorsOrigins::List(list) => {
            let allowed_origins: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: Allowing origin: {}", origin);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(CORS_METHODS)
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:5000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:5000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting - global quota (if enabled)
/// 5. Authentication - validates API key (if configured)
pub fn create_router(state: AppState, security: &SecurityConfig) -> Router {
    let cors = build_cors_layer(&security.cors_origins);

    let rate_limiter = if security.rate_limit > 0 {
        tracing::info!(
            "Rate limiting enabled: {} requests/second",
            security.rate_limit
        );
        Some(create_rate_limiter(security.rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let api_key: Option<auth::ApiKey> = security
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(Arc::from);
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set ESCAPE_API_KEY to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/game-sessions",
            get(handlers::list_sessions_handler).post(handlers::create_session_handler),
        )
        .route(
            "/game-sessions/{id}",
            get(handlers::get_session_handler)
                .put(handlers::update_session_handler)
                .delete(handlers::delete_session_handler),
        )
        .route("/stages", post(handlers::stage_handler))
        .route(
            "/game-stats",
            get(handlers::get_stats_handler).post(handlers::update_stats_handler),
        );

    // Innermost: runs last on the request path.
    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            key,
            auth::api_key_auth_middleware,
        ));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Bind `addr` and serve the API until the process exits.
pub async fn run_server(
    addr: &str,
    store: StoreBackend,
    security: &SecurityConfig,
) -> Result<(), EscapeError> {
    let persistent = store.is_persistent();
    let router = create_router(AppState::new(store), security);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EscapeError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!(persistent, "Escape room HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| EscapeError::IoError(format!("Server error: {}", e)))
}
