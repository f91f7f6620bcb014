//! Embedding provider boundary.

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
/// Converts text into a fixed-length vector via an external service.
///
/// Transient failure is data, not an exception: implementations return
/// `None` so callers can degrade gracefully (store an interaction as
/// unsearchable rather than lose it).
pub trait Embedder: Send + Sync {
    /// Embed a single text, or `None` when the service failed.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequestBody<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponseBody {
    embedding: Vec<f32>,
}

/// HTTP client for an embedding endpoint.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpEmbedder {
    /// Create an embedder against the given base URL and model.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, reqwest::Error> {
        let body = EmbeddingRequestBody {
            model: &self.model,
            prompt: text,
        };
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let parsed: EmbeddingResponseBody = response.json().await?;
        Ok(parsed.embedding)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        match self.request(text).await {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => {
                warn!("embedding service returned an empty vector (model={})", self.model);
                None
            }
            Err(err) => {
                warn!("embedding request failed (model={}): {err}", self.model);
                None
            }
        }
    }
}
