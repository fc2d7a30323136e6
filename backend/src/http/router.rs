//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        .route("/validations/polygons", post(handlers::validate_polygons))
        .route(
            "/validations/polygons/{polygon_uuid}",
            get(handlers::get_polygon_validation),
        )
        .route(
            "/validations/polygons/{polygon_uuid}/history",
            get(handlers::get_validation_history),
        )
        .route(
            "/validations/sites/{site_uuid}",
            get(handlers::get_site_validations),
        )
        .route(
            "/validations/sites/{site_uuid}/jobs",
            post(handlers::enqueue_site_validation),
        )
        .route("/jobs/{job_uuid}", get(handlers::get_job))
        .route("/jobs/{job_uuid}/events", get(handlers::stream_job_events));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
