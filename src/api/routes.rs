//! API Routes
//!
//! Configures the Axum router with all bridge endpoints.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    count_handler, fields_handler, health_handler, record_handler, search_handler, stats_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/models/:model/fields", get(fields_handler))
        .route("/models/:model/records/:id", get(record_handler))
        .route("/models/:model/search", get(search_handler))
        .route("/models/:model/count", get(count_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
