//! Router setup with all API routes and middleware.
//!
//! Configures the axum Router with CORS, tracing, compression,
//! and all endpoint handlers.

use std::convert::Infallible;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use actionlog_core::config::ActionLogConfig;
use actionlog_core::error::ActionLogError;

use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

/// Ingest batches carry a host catalog and may be large.
const INGEST_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Ingest batches share the host mirror, so one request lifetime runs at a
/// time.
const INGEST_CONCURRENCY: usize = 1;

fn cors_layer(port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ]
    .iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
}

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    create_router_with_limiter(state, RateLimiter::per_second())
}

/// `create_router` with an explicit ingest rate limiter.
pub fn create_router_with_limiter(state: AppState, limiter: RateLimiter) -> Router {
    let cors = cors_layer(state.config.general.port);

    // Reads stay public; a bearer token widens what they return.
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/actions", get(handlers::list_actions))
        .route("/actions/{id}", get(handlers::get_action));

    let ingest_routes = Router::new()
        .route(
            "/events",
            post(handlers::ingest_events)
                .layer::<_, Infallible>(ConcurrencyLimitLayer::new(INGEST_CONCURRENCY))
                .layer(DefaultBodyLimit::max(INGEST_BODY_LIMIT)),
        )
        .layer(axum::middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(limiter));

    let protected_routes = ingest_routes
        .route("/actions/gc", post(handlers::run_gc))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on the configured address.
///
/// Binds to 127.0.0.1 (localhost only) on the port from config.
pub async fn start_server(config: &ActionLogConfig, state: AppState) -> Result<(), ActionLogError> {
    let addr = format!("127.0.0.1:{}", config.general.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ActionLogError::Api(format!("Failed to bind: {}", e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| ActionLogError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
