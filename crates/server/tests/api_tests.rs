//! End-to-end tests over the HTTP surface.
//!
//! Each test spawns the full router on an ephemeral port with a scratch
//! data directory and drives it with reqwest. Chunks are created with
//! explicit embeddings so no embedding provider is needed.

use reqwest::Client;
use serde_json::{json, Value};
use shelfdb_core::index::{ExactCosineIndex, IvfIndex, NswIndex};
use shelfdb_core::{Database, IndexKind};
use shelfdb_server::api::create_router;
use shelfdb_server::api::handlers::AppState;
use tempfile::TempDir;

async fn spawn_app() -> (String, TempDir) {
    let tmp_dir = TempDir::new().expect("Failed to create temp dir");
    let base_url = spawn_app_at(tmp_dir.path().to_str().unwrap()).await;
    (base_url, tmp_dir)
}

/// Spawn a server over an existing data directory (restart simulation).
async fn spawn_app_at(data_dir: &str) -> String {
    let db = Database::open(data_dir).expect("Failed to open database");
    db.chunks
        .add_index(IndexKind::Cosine, Box::new(ExactCosineIndex::new()))
        .unwrap();
    db.chunks
        .add_index(IndexKind::Ivf, Box::<IvfIndex>::default())
        .unwrap();
    db.chunks
        .add_index(IndexKind::Nsw, Box::<NswIndex>::default())
        .unwrap();
    db.startup_rebuild().unwrap();

    let prometheus_handle =
        match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(_) => metrics_exporter_prometheus::PrometheusBuilder::new()
                .build_recorder()
                .handle(),
        };

    let state = AppState {
        db,
        embedder: None,
        prometheus_handle,
        start_time: std::time::Instant::now(),
    };

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client() -> Client {
    Client::new()
}

async fn create_library(base_url: &str, name: &str) -> Value {
    let resp = client()
        .post(format!("{base_url}/libraries"))
        .json(&json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

async fn create_document(base_url: &str, library_id: &str, name: &str) -> Value {
    let resp = client()
        .post(format!("{base_url}/documents"))
        .json(&json!({ "name": name, "library_id": library_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

async fn create_chunk(
    base_url: &str,
    document_id: &str,
    content: &str,
    embedding: Vec<f32>,
) -> Value {
    let resp = client()
        .post(format!("{base_url}/chunks"))
        .json(&json!({
            "content": content,
            "embedding": embedding,
            "document_id": document_id,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn health_reports_counts() {
    let (base_url, _tmp) = spawn_app().await;
    let resp = client()
        .get(format!("{base_url}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chunks"], 0);
}

#[tokio::test]
async fn library_crud_roundtrip() {
    let (base_url, _tmp) = spawn_app().await;
    let lib = create_library(&base_url, "my-library").await;
    let id = lib["id"].as_str().unwrap();

    let fetched: Value = client()
        .get(format!("{base_url}/libraries/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["name"], "my-library");
    assert_eq!(fetched["created_at"], lib["created_at"]);

    // Partial update: only the name changes.
    let updated: Value = client()
        .put(format!("{base_url}/libraries/{id}"))
        .json(&json!({ "name": "renamed" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["name"], "renamed");
    assert_eq!(updated["created_at"], lib["created_at"]);

    let listed: Vec<Value> = client()
        .get(format!("{base_url}/libraries"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let del = client()
        .delete(format!("{base_url}/libraries/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(del.status(), 204);

    let gone = client()
        .get(format!("{base_url}/libraries/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), 404);

    let gone_again = client()
        .delete(format!("{base_url}/libraries/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(gone_again.status(), 404);
}

#[tokio::test]
async fn duplicate_library_id_conflicts() {
    let (base_url, _tmp) = spawn_app().await;
    let lib = create_library(&base_url, "lib").await;
    let resp = client()
        .post(format!("{base_url}/libraries"))
        .json(&json!({ "id": lib["id"], "name": "other" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn document_requires_existing_library() {
    let (base_url, _tmp) = spawn_app().await;
    let resp = client()
        .post(format!("{base_url}/documents"))
        .json(&json!({
            "name": "doc",
            "library_id": "00000000-0000-0000-0000-000000000001"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn chunk_requires_parent_and_provider_or_embedding() {
    let (base_url, _tmp) = spawn_app().await;
    let lib = create_library(&base_url, "lib").await;
    let doc = create_document(&base_url, lib["id"].as_str().unwrap(), "doc").await;

    // Unknown parent document.
    let resp = client()
        .post(format!("{base_url}/chunks"))
        .json(&json!({
            "content": "text",
            "embedding": [1.0, 0.0],
            "document_id": "00000000-0000-0000-0000-000000000001"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Text-only chunk with no provider configured.
    let resp = client()
        .post(format!("{base_url}/chunks"))
        .json(&json!({
            "content": "text",
            "document_id": doc["id"]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 503);

    // With an explicit embedding the chunk lands.
    let chunk = create_chunk(&base_url, doc["id"].as_str().unwrap(), "text", vec![1.0, 0.0]).await;
    assert_eq!(chunk["library_id"], lib["id"]);
}

#[tokio::test]
async fn dimension_mismatch_is_conflict() {
    let (base_url, _tmp) = spawn_app().await;
    let lib = create_library(&base_url, "lib").await;
    let doc = create_document(&base_url, lib["id"].as_str().unwrap(), "doc").await;
    let doc_id = doc["id"].as_str().unwrap();
    create_chunk(&base_url, doc_id, "first", vec![1.0, 0.0, 0.0]).await;

    let resp = client()
        .post(format!("{base_url}/chunks"))
        .json(&json!({
            "content": "second",
            "embedding": [1.0, 0.0],
            "document_id": doc_id
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn query_basis_vectors_with_cosine() {
    let (base_url, _tmp) = spawn_app().await;
    let lib = create_library(&base_url, "lib").await;
    let doc = create_document(&base_url, lib["id"].as_str().unwrap(), "doc").await;
    let doc_id = doc["id"].as_str().unwrap();

    let a = create_chunk(&base_url, doc_id, "x axis", vec![1.0, 0.0, 0.0]).await;
    create_chunk(&base_url, doc_id, "y axis", vec![0.0, 1.0, 0.0]).await;
    create_chunk(&base_url, doc_id, "z axis", vec![0.0, 0.0, 1.0]).await;

    let resp = client()
        .post(format!("{base_url}/query"))
        .json(&json!({
            "collection": "chunks",
            "index_type": "cosine",
            "embedding": [1.0, 0.0, 0.0],
            "limit": 2
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["id"], a["id"]);
    assert_eq!(results[0]["content"], "x axis");
    assert!((results[0]["score"].as_f64().unwrap() - 1.0).abs() < 1e-5);
    assert!(results[0]["score"].as_f64().unwrap() >= results[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn query_all_index_types_return_results() {
    let (base_url, _tmp) = spawn_app().await;
    let lib = create_library(&base_url, "lib").await;
    let doc = create_document(&base_url, lib["id"].as_str().unwrap(), "doc").await;
    let doc_id = doc["id"].as_str().unwrap();
    for i in 0..20 {
        let t = i as f32 * 0.3;
        create_chunk(&base_url, doc_id, &format!("chunk {i}"), vec![t.cos(), t.sin()]).await;
    }

    for index_type in ["cosine", "ivf", "nsw"] {
        let resp = client()
            .post(format!("{base_url}/query"))
            .json(&json!({
                "collection": "chunks",
                "index_type": index_type,
                "embedding": [1.0, 0.0],
                "limit": 5
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "index {index_type}");
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["results"].as_array().unwrap().len(), 5);
    }
}

#[tokio::test]
async fn query_validation_errors() {
    let (base_url, _tmp) = spawn_app().await;

    // Unknown collection name.
    let resp = client()
        .post(format!("{base_url}/query"))
        .json(&json!({
            "collection": "nonexistent",
            "index_type": "cosine",
            "embedding": [1.0],
            "limit": 5
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    // Documents have no indexes attached.
    let resp = client()
        .post(format!("{base_url}/query"))
        .json(&json!({
            "collection": "documents",
            "index_type": "cosine",
            "embedding": [1.0],
            "limit": 5
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Non-positive limit.
    let resp = client()
        .post(format!("{base_url}/query"))
        .json(&json!({
            "collection": "chunks",
            "index_type": "cosine",
            "embedding": [1.0],
            "limit": 0
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Neither text nor embedding.
    let resp = client()
        .post(format!("{base_url}/query"))
        .json(&json!({
            "collection": "chunks",
            "index_type": "cosine",
            "limit": 5
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn query_filters_on_metadata() {
    let (base_url, _tmp) = spawn_app().await;
    let lib = create_library(&base_url, "lib").await;
    let doc = create_document(&base_url, lib["id"].as_str().unwrap(), "doc").await;
    let doc_id = doc["id"].as_str().unwrap();

    for (lang, v) in [("en", vec![1.0, 0.0]), ("it", vec![0.9, 0.1])] {
        let resp = client()
            .post(format!("{base_url}/chunks"))
            .json(&json!({
                "content": format!("{lang} text"),
                "embedding": v,
                "document_id": doc_id,
                "metadata": { "lang": lang }
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let resp = client()
        .post(format!("{base_url}/query"))
        .json(&json!({
            "collection": "chunks",
            "index_type": "cosine",
            "embedding": [1.0, 0.0],
            "limit": 5,
            "filter": { "must": [{ "field": "lang", "op": "eq", "value": "it" }] }
        }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["metadata"]["lang"], "it");
}

#[tokio::test]
async fn update_chunk_moves_it_in_the_index() {
    let (base_url, _tmp) = spawn_app().await;
    let lib = create_library(&base_url, "lib").await;
    let doc = create_document(&base_url, lib["id"].as_str().unwrap(), "doc").await;
    let doc_id = doc["id"].as_str().unwrap();

    let a = create_chunk(&base_url, doc_id, "a", vec![1.0, 0.0]).await;
    create_chunk(&base_url, doc_id, "b", vec![0.0, 1.0]).await;
    let a_id = a["id"].as_str().unwrap();

    let resp = client()
        .put(format!("{base_url}/chunks/{a_id}"))
        .json(&json!({ "embedding": [0.0, 1.0] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = client()
        .post(format!("{base_url}/query"))
        .json(&json!({
            "collection": "chunks",
            "index_type": "cosine",
            "embedding": [0.0, 1.0],
            "limit": 2
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let results = body["results"].as_array().unwrap();
    assert!((results[0]["score"].as_f64().unwrap() - 1.0).abs() < 1e-5);
    assert!((results[1]["score"].as_f64().unwrap() - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn library_cascade_empties_all_collections() {
    let (base_url, _tmp) = spawn_app().await;
    let lib = create_library(&base_url, "lib").await;
    let lib_id = lib["id"].as_str().unwrap();
    for d in 0..3 {
        let doc = create_document(&base_url, lib_id, &format!("doc-{d}")).await;
        let doc_id = doc["id"].as_str().unwrap();
        for c in 0..4 {
            create_chunk(
                &base_url,
                doc_id,
                &format!("chunk-{d}-{c}"),
                vec![d as f32 + 1.0, c as f32],
            )
            .await;
        }
    }

    let del = client()
        .delete(format!("{base_url}/libraries/{lib_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(del.status(), 204);

    for kind in ["libraries", "documents", "chunks"] {
        let listed: Vec<Value> = client()
            .get(format!("{base_url}/{kind}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(listed.is_empty(), "{kind} not empty after cascade");
    }

    let stats: Value = client()
        .get(format!("{base_url}/collections/chunks/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["record_count"], 0);
    for size in stats["indexes"].as_object().unwrap().values() {
        assert_eq!(size.as_u64(), Some(0));
    }
}

#[tokio::test]
async fn restart_preserves_query_results() {
    let tmp_dir = TempDir::new().unwrap();
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let base_url = spawn_app_at(&data_dir).await;
    let lib = create_library(&base_url, "lib").await;
    let doc = create_document(&base_url, lib["id"].as_str().unwrap(), "doc").await;
    let doc_id = doc["id"].as_str().unwrap();
    for i in 0..50 {
        let t = i as f32 * 0.13;
        create_chunk(
            &base_url,
            doc_id,
            &format!("chunk {i}"),
            vec![t.cos(), t.sin(), 0.5],
        )
        .await;
    }

    let query = json!({
        "collection": "chunks",
        "index_type": "cosine",
        "embedding": [0.3, 0.7, 0.2],
        "limit": 10
    });
    let before: Value = client()
        .post(format!("{base_url}/query"))
        .json(&query)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // "Restart": a second server over the same data directory rebuilds its
    // indexes from disk.
    let restarted_url = spawn_app_at(&data_dir).await;
    let after: Value = client()
        .post(format!("{restarted_url}/query"))
        .json(&query)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let ids = |v: &Value| -> Vec<String> {
        v["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(ids(&before), ids(&after));
}

#[tokio::test]
async fn admin_rebuild_reports_counts() {
    let (base_url, _tmp) = spawn_app().await;
    let lib = create_library(&base_url, "lib").await;
    let doc = create_document(&base_url, lib["id"].as_str().unwrap(), "doc").await;
    let doc_id = doc["id"].as_str().unwrap();
    for i in 0..5 {
        create_chunk(&base_url, doc_id, &format!("c{i}"), vec![i as f32, 1.0]).await;
    }

    let resp = client()
        .post(format!("{base_url}/admin/rebuild/chunks"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["record_count"], 5);
}
