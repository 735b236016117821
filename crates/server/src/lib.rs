//! shelfdb-server: HTTP surface for shelfdb.
//!
//! Provides the REST API (Axum), the embedding-provider client, and
//! Prometheus metrics. Storage and index logic live in `shelfdb-core`.

/// REST API layer: router, handlers, request/response models, errors, metrics.
pub mod api;
/// Embedding provider client: text → vector over HTTP.
pub mod embedding;
