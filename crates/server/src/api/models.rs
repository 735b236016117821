//! Request and response data transfer objects for the REST API.
//!
//! Record responses serialize the core record types directly; metadata maps
//! deserialize straight into `MetadataValue` (scalars only; anything else
//! is a 400 at the JSON layer).

use serde::{Deserialize, Serialize};
use shelfdb_core::{IndexKind, MetadataValue};
use std::collections::HashMap;
use uuid::Uuid;

pub use shelfdb_core::filter::{FilterClause, FilterCondition, FilterOperator};

/// Request body for `POST /libraries`.
#[derive(Debug, Deserialize)]
pub struct CreateLibraryRequest {
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,
}

/// Request body for `PUT /libraries/{id}`; absent fields keep their value.
#[derive(Debug, Deserialize)]
pub struct UpdateLibraryRequest {
    pub name: Option<String>,
    pub metadata: Option<HashMap<String, MetadataValue>>,
}

/// Request body for `POST /documents`.
#[derive(Debug, Deserialize)]
pub struct CreateDocumentRequest {
    pub id: Option<Uuid>,
    pub name: String,
    pub library_id: Uuid,
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,
}

/// Request body for `PUT /documents/{id}`; absent fields keep their value.
#[derive(Debug, Deserialize)]
pub struct UpdateDocumentRequest {
    pub name: Option<String>,
    pub library_id: Option<Uuid>,
    pub metadata: Option<HashMap<String, MetadataValue>>,
}

/// Request body for `POST /chunks`.
///
/// `embedding` is optional: when absent the server embeds `content` via the
/// configured provider.
#[derive(Debug, Deserialize)]
pub struct CreateChunkRequest {
    pub id: Option<Uuid>,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub document_id: Uuid,
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,
}

/// Request body for `PUT /chunks/{id}`; absent fields keep their value.
///
/// Updating `content` without an explicit `embedding` re-embeds the new
/// content through the provider.
#[derive(Debug, Deserialize)]
pub struct UpdateChunkRequest {
    pub content: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub document_id: Option<Uuid>,
    pub metadata: Option<HashMap<String, MetadataValue>>,
}

/// Request body for `POST /query`.
///
/// One of `text` or `embedding` must be set; an explicit `embedding`
/// bypasses the provider.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub collection: String,
    pub index_type: IndexKind,
    pub text: Option<String>,
    pub embedding: Option<Vec<f32>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub filter: Option<FilterClause>,
}

fn default_limit() -> usize {
    5
}

/// One query hit.
#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub id: Uuid,
    pub content: String,
    pub score: f32,
    pub metadata: HashMap<String, MetadataValue>,
}

/// Response body for `POST /query`, ordered by descending score.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub results: Vec<QueryResult>,
}

/// Generic success message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub libraries: usize,
    pub documents: usize,
    pub chunks: usize,
}

/// Response body for `POST /admin/rebuild/{collection}`.
#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub message: String,
    pub record_count: usize,
    pub elapsed_ms: u128,
}

/// Response body for `GET /collections/{name}/stats`.
#[derive(Debug, Serialize)]
pub struct CollectionStatsResponse {
    pub name: String,
    pub record_count: usize,
    pub dimension: Option<usize>,
    pub indexes: HashMap<String, usize>,
}
