//! Embedding provider client.
//!
//! The core only ever sees vectors; turning text into a vector is an HTTP
//! call to an external provider. The wire contract is minimal: POST
//! `{ "model": ..., "texts": [...] }` with a bearer token, expect
//! `{ "embeddings": [[f32, ...], ...] }` with one vector per input text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures talking to the embedding provider. No database state is
/// mutated when one of these surfaces.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("embedding response malformed: {0}")]
    Malformed(String),
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    texts: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// HTTP client for the configured embedding provider.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    http: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl EmbeddingClient {
    pub fn new(url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            model,
            api_key,
        }
    }

    /// Embed a batch of texts; one vector per input, in order.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut request = self.http.post(&self.url).json(&EmbedRequest {
            model: &self.model,
            texts,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
        if parsed.embeddings.len() != texts.len() {
            return Err(EmbeddingError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed.embeddings)
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let texts = [text.to_string()];
        let mut vectors = self.embed(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Malformed("empty embeddings array".into()))
    }
}
