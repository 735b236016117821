//! HTTP request handlers and shared application state.

use crate::api::errors::ApiError;
use crate::api::models::*;
use crate::embedding::EmbeddingClient;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use shelfdb_core::record::{Chunk, Document, Library, MetadataValue, Record};
use shelfdb_core::{config, Database, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Shared application state passed to every handler via Axum's `State`
/// extractor.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Absent in air-gapped deployments; text-only writes then return 503.
    pub embedder: Option<Arc<EmbeddingClient>>,
    pub prometheus_handle: PrometheusHandle,
    pub start_time: Instant,
}

fn validate_embedding(embedding: &[f32]) -> Result<(), ApiError> {
    if embedding.is_empty() {
        return Err(ApiError::BadRequest("Embedding must not be empty".into()));
    }
    if embedding.len() > config::MAX_DIMENSION {
        return Err(ApiError::BadRequest(format!(
            "Embedding dimension exceeds maximum of {}",
            config::MAX_DIMENSION
        )));
    }
    if embedding.iter().any(|v| v.is_nan() || v.is_infinite()) {
        return Err(ApiError::BadRequest("Embedding contains NaN or Inf".into()));
    }
    Ok(())
}

fn validate_metadata(metadata: &HashMap<String, MetadataValue>) -> Result<(), ApiError> {
    if metadata.len() > config::MAX_METADATA_KEYS {
        return Err(ApiError::BadRequest(format!(
            "Metadata exceeds maximum of {} keys",
            config::MAX_METADATA_KEYS
        )));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("Content must not be empty".into()));
    }
    if content.len() > config::MAX_CONTENT_LEN {
        return Err(ApiError::BadRequest(format!(
            "Content exceeds maximum of {} bytes",
            config::MAX_CONTENT_LEN
        )));
    }
    Ok(())
}

/// Turn `text` into a vector via the configured provider.
async fn embed_text(state: &AppState, text: &str) -> Result<Vec<f32>, ApiError> {
    let Some(embedder) = &state.embedder else {
        return Err(ApiError::ServiceUnavailable(
            "No embedding provider configured".into(),
        ));
    };
    Ok(embedder.embed_one(text).await?)
}

/// `GET /`
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Welcome to shelfdb".into(),
    })
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        libraries: state.db.libraries.len()?,
        documents: state.db.documents.len()?,
        chunks: state.db.chunks.len()?,
    }))
}

/// `GET /metrics`
pub async fn metrics_endpoint(State(state): State<AppState>) -> String {
    state.prometheus_handle.render()
}

// ── Libraries ─────────────────────────────────────────────────────────

/// `POST /libraries`
pub async fn create_library(
    State(state): State<AppState>,
    Json(req): Json<CreateLibraryRequest>,
) -> Result<(StatusCode, Json<Library>), ApiError> {
    validate_metadata(&req.metadata)?;
    let mut library = Library::new(req.name, req.metadata);
    if let Some(id) = req.id {
        library.id = id;
    }
    if state.db.libraries.exists(&library.id) {
        return Err(ApiError::Conflict(
            "Library with this ID already exists".into(),
        ));
    }
    let created = state.db.libraries.create(library)?;
    tracing::info!(library = %created.id, "library created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /libraries`
pub async fn list_libraries(
    State(state): State<AppState>,
) -> Result<Json<Vec<Library>>, ApiError> {
    Ok(Json(state.db.libraries.list()?))
}

/// `GET /libraries/{id}`
pub async fn get_library(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Library>, ApiError> {
    Ok(Json(state.db.libraries.get(&id)?))
}

/// `PUT /libraries/{id}`
pub async fn update_library(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLibraryRequest>,
) -> Result<Json<Library>, ApiError> {
    let mut library = state.db.libraries.get(&id)?;
    if let Some(name) = req.name {
        library.name = name;
    }
    if let Some(metadata) = req.metadata {
        validate_metadata(&metadata)?;
        library.metadata = metadata;
    }
    Ok(Json(state.db.libraries.update(&id, library)?))
}

/// `DELETE /libraries/{id}`. Cascades to documents and chunks.
pub async fn delete_library(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let (documents, chunks) = state.db.delete_library(&id)?;
    tracing::info!(library = %id, documents, chunks, "library deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Documents ─────────────────────────────────────────────────────────

/// `POST /documents`
pub async fn create_document(
    State(state): State<AppState>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    validate_metadata(&req.metadata)?;
    if !state.db.libraries.exists(&req.library_id) {
        return Err(ApiError::NotFound("Parent library not found".into()));
    }
    let mut document = Document::new(req.name, req.library_id, req.metadata);
    if let Some(id) = req.id {
        document.id = id;
    }
    if state.db.documents.exists(&document.id) {
        return Err(ApiError::Conflict(
            "Document with this ID already exists".into(),
        ));
    }
    let created = state.db.documents.create(document)?;
    tracing::info!(document = %created.id, library = %created.library_id, "document created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /documents`
pub async fn list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, ApiError> {
    Ok(Json(state.db.documents.list()?))
}

/// `GET /documents/{id}`
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Document>, ApiError> {
    Ok(Json(state.db.documents.get(&id)?))
}

/// `PUT /documents/{id}`
pub async fn update_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<Json<Document>, ApiError> {
    let mut document = state.db.documents.get(&id)?;
    if let Some(library_id) = req.library_id {
        if !state.db.libraries.exists(&library_id) {
            return Err(ApiError::NotFound("Parent library not found".into()));
        }
        document.library_id = library_id;
    }
    if let Some(name) = req.name {
        document.name = name;
    }
    if let Some(metadata) = req.metadata {
        validate_metadata(&metadata)?;
        document.metadata = metadata;
    }
    Ok(Json(state.db.documents.update(&id, document)?))
}

/// `DELETE /documents/{id}`. Cascades to the document's chunks.
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let chunks = state.db.delete_document(&id)?;
    tracing::info!(document = %id, chunks, "document deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Chunks ────────────────────────────────────────────────────────────

/// Validate that a document and its own parent library both exist.
fn check_chunk_parents(state: &AppState, document_id: &Uuid) -> Result<Document, ApiError> {
    let document = state.db.documents.get(document_id).map_err(|e| match e {
        StoreError::NotFound(_) => ApiError::NotFound("Parent document not found".into()),
        other => other.into(),
    })?;
    if !state.db.libraries.exists(&document.library_id) {
        return Err(ApiError::NotFound(
            "Parent library not found for this document".into(),
        ));
    }
    Ok(document)
}

/// `POST /chunks`
pub async fn create_chunk(
    State(state): State<AppState>,
    Json(req): Json<CreateChunkRequest>,
) -> Result<(StatusCode, Json<Chunk>), ApiError> {
    validate_content(&req.content)?;
    validate_metadata(&req.metadata)?;
    let document = check_chunk_parents(&state, &req.document_id)?;

    // Embed before touching the collection; the lock is never held across
    // provider I/O.
    let embedding = match req.embedding {
        Some(embedding) => embedding,
        None => embed_text(&state, &req.content).await?,
    };
    validate_embedding(&embedding)?;

    let mut chunk = Chunk::new(
        req.content,
        embedding,
        req.document_id,
        document.library_id,
        req.metadata,
    );
    if let Some(id) = req.id {
        chunk.id = id;
    }
    if state.db.chunks.exists(&chunk.id) {
        return Err(ApiError::Conflict(
            "Chunk with this ID already exists".into(),
        ));
    }
    let created = state.db.chunks.create(chunk)?;
    tracing::info!(chunk = %created.id, document = %created.document_id, "chunk created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /chunks`
pub async fn list_chunks(State(state): State<AppState>) -> Result<Json<Vec<Chunk>>, ApiError> {
    Ok(Json(state.db.chunks.list()?))
}

/// `GET /chunks/{id}`
pub async fn get_chunk(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Chunk>, ApiError> {
    Ok(Json(state.db.chunks.get(&id)?))
}

/// `PUT /chunks/{id}`
pub async fn update_chunk(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateChunkRequest>,
) -> Result<Json<Chunk>, ApiError> {
    let mut chunk = state.db.chunks.get(&id)?;

    if let Some(document_id) = req.document_id {
        let document = check_chunk_parents(&state, &document_id)?;
        chunk.document_id = document_id;
        chunk.library_id = document.library_id;
    }

    let content_changed = match req.content {
        Some(content) => {
            validate_content(&content)?;
            chunk.content = content;
            true
        }
        None => false,
    };

    // New content without an explicit embedding means the old vector is
    // stale; re-embed through the provider.
    match req.embedding {
        Some(embedding) => chunk.embedding = embedding,
        None if content_changed => {
            chunk.embedding = embed_text(&state, &chunk.content).await?;
        }
        None => {}
    }
    validate_embedding(&chunk.embedding)?;

    if let Some(metadata) = req.metadata {
        validate_metadata(&metadata)?;
        chunk.metadata = metadata;
    }
    Ok(Json(state.db.chunks.update(&id, chunk)?))
}

/// `DELETE /chunks/{id}`
pub async fn delete_chunk(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.chunks.delete(&id)?;
    tracing::info!(chunk = %id, "chunk deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ── Query ─────────────────────────────────────────────────────────────

/// `POST /query`
pub async fn query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    if req.limit == 0 {
        return Err(ApiError::BadRequest("limit must be positive".into()));
    }
    if req.limit > config::MAX_K {
        return Err(ApiError::BadRequest(format!(
            "limit exceeds maximum of {}",
            config::MAX_K
        )));
    }

    let vector = match (req.embedding, req.text.as_deref()) {
        (Some(embedding), _) => {
            validate_embedding(&embedding)?;
            embedding
        }
        (None, Some(text)) if !text.trim().is_empty() => embed_text(&state, text).await?,
        _ => {
            return Err(ApiError::BadRequest(
                "Either a non-empty 'text' or an 'embedding' is required".into(),
            ));
        }
    };

    let filter = req.filter.as_ref();
    let results = match req.collection.as_str() {
        "chunks" => state
            .db
            .chunks
            .search(req.index_type, &vector, req.limit, filter)?
            .into_iter()
            .map(|hit| to_query_result(hit.record.id, hit.record.content.clone(), hit.score, &hit.record))
            .collect(),
        "documents" => state
            .db
            .documents
            .search(req.index_type, &vector, req.limit, filter)?
            .into_iter()
            .map(|hit| to_query_result(hit.record.id, hit.record.name.clone(), hit.score, &hit.record))
            .collect(),
        "libraries" => state
            .db
            .libraries
            .search(req.index_type, &vector, req.limit, filter)?
            .into_iter()
            .map(|hit| to_query_result(hit.record.id, hit.record.name.clone(), hit.score, &hit.record))
            .collect(),
        other => {
            return Err(ApiError::NotFound(format!(
                "Collection '{other}' not found"
            )));
        }
    };

    Ok(Json(QueryResponse { results }))
}

fn to_query_result<R: Record>(id: Uuid, content: String, score: f32, record: &R) -> QueryResult {
    QueryResult {
        id,
        content,
        score,
        metadata: record.metadata().clone(),
    }
}

// ── Admin ─────────────────────────────────────────────────────────────

/// `POST /admin/rebuild/{collection}`: explicit full index rebuild; the
/// documented recovery from IVF centroid drift.
pub async fn rebuild_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<RebuildResponse>, ApiError> {
    let start = Instant::now();
    let record_count = match collection.as_str() {
        "chunks" => state.db.chunks.startup_rebuild()?,
        "documents" => state.db.documents.startup_rebuild()?,
        "libraries" => state.db.libraries.startup_rebuild()?,
        other => {
            return Err(ApiError::NotFound(format!(
                "Collection '{other}' not found"
            )));
        }
    };
    Ok(Json(RebuildResponse {
        message: format!("Collection '{collection}' rebuilt"),
        record_count,
        elapsed_ms: start.elapsed().as_millis(),
    }))
}

/// `GET /collections/{name}/stats`
pub async fn collection_stats(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CollectionStatsResponse>, ApiError> {
    let (record_count, dimension, sizes) = match name.as_str() {
        "chunks" => (
            state.db.chunks.len()?,
            state.db.chunks.dimension(),
            state.db.chunks.index_sizes(),
        ),
        "documents" => (
            state.db.documents.len()?,
            state.db.documents.dimension(),
            state.db.documents.index_sizes(),
        ),
        "libraries" => (
            state.db.libraries.len()?,
            state.db.libraries.dimension(),
            state.db.libraries.index_sizes(),
        ),
        other => {
            return Err(ApiError::NotFound(format!(
                "Collection '{other}' not found"
            )));
        }
    };
    Ok(Json(CollectionStatsResponse {
        name,
        record_count,
        dimension,
        indexes: sizes
            .into_iter()
            .map(|(kind, len)| (kind.to_string(), len))
            .collect(),
    }))
}
