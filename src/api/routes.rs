use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    let request_timeout = state.request_timeout;
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Search
        .route("/v1/search", post(handlers::search))
        // Document writes
        .route(
            "/v1/works/:id",
            put(handlers::index_work).delete(handlers::delete_work),
        )
        .route("/v1/works/bulk", post(handlers::bulk_index))
        .route("/v1/works/analyze", post(handlers::analyze_work))
        // Background indexing
        .route("/v1/indexing/jobs", post(handlers::submit_job))
        .route("/v1/indexing/status", get(handlers::indexing_status))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
}
