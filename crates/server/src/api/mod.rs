//! REST API layer built on Axum.
//!
//! Routes for library/document/chunk CRUD, vector query, and admin
//! operations, wrapped in middleware for tracing, CORS, body-size limits,
//! request timeouts, concurrency limits, request-id headers, and metrics.

/// API error types mapped to HTTP status codes.
pub mod errors;
/// HTTP request handlers and application state.
pub mod handlers;
/// Prometheus metrics recording.
pub mod metrics;
/// Request and response data transfer objects.
pub mod models;

use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Router};
use handlers::AppState;
use shelfdb_core::config;
use std::time::{Duration, Instant};
use tower::buffer::BufferLayer;
use tower::limit::ConcurrencyLimitLayer;
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

async fn request_id_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", request_id = %request_id);
    async move {
        let mut response = next.run(req).await;
        response.headers_mut().insert(
            axum::http::HeaderName::from_static("x-request-id"),
            axum::http::HeaderValue::from_str(&request_id)
                .expect("UUID v4 is always valid ASCII for header values"),
        );
        response
    }
    .instrument(span)
    .await
}

async fn metrics_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    metrics::record_request(&method, &path, response.status().as_u16(), start.elapsed());
    response
}

/// Builds the Axum router with all routes and middleware layers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/libraries",
            get(handlers::list_libraries).post(handlers::create_library),
        )
        .route(
            "/libraries/:id",
            get(handlers::get_library)
                .put(handlers::update_library)
                .delete(handlers::delete_library),
        )
        .route(
            "/documents",
            get(handlers::list_documents).post(handlers::create_document),
        )
        .route(
            "/documents/:id",
            get(handlers::get_document)
                .put(handlers::update_document)
                .delete(handlers::delete_document),
        )
        .route(
            "/chunks",
            get(handlers::list_chunks).post(handlers::create_chunk),
        )
        .route(
            "/chunks/:id",
            get(handlers::get_chunk)
                .put(handlers::update_chunk)
                .delete(handlers::delete_chunk),
        )
        .route("/query", post(handlers::query))
        .route("/admin/rebuild/:collection", post(handlers::rebuild_collection))
        .route("/collections/:name/stats", get(handlers::collection_stats))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(config::MAX_REQUEST_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|err: tower::BoxError| async move {
                    if err.is::<tower::timeout::error::Elapsed>() {
                        StatusCode::REQUEST_TIMEOUT
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                }))
                .layer(BufferLayer::new(1024))
                .layer(ConcurrencyLimitLayer::new(config::MAX_CONCURRENT_REQUESTS))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config::REQUEST_TIMEOUT_SECS,
                ))),
        )
        .with_state(state)
}
