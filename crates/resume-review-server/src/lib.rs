pub mod config;
pub mod document;
pub mod handlers;
pub mod index;
pub mod models;
pub mod services;
pub mod session;
pub mod state;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

pub use state::AppState;

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::health::health_check))
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route("/upload", post(handlers::upload::upload_handler))
        .route("/query", post(handlers::query::query_handler))
        .route("/delete", delete(handlers::storage::delete_handler))
        .with_state(state)
        // Permissive CORS also exposes X-Session-ID to browsers
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
}
