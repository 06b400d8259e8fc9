//! Embedding backends.
//!
//! [`EmbeddingBackend`] is the seam between the pipeline and the outside
//! world: an OpenAI-compatible HTTP implementation for production and a
//! deterministic mock for tests. Provider failures surface as
//! [`Error::Provider`] and are never cached.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, instrument};

use vellum_core::{defaults, Error, Result};

/// A provider that turns text into embedding vectors.
///
/// `provider_id()` and `model()` together with the content hash form the
/// embedding cache key, so implementations must report them stably.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts, preserving input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Stable provider identifier, e.g. `"openai"`.
    fn provider_id(&self) -> &str;

    /// Model identifier, e.g. `"text-embedding-3-small"`.
    fn model(&self) -> &str;
}

// ============================================================================
// OpenAI-compatible HTTP backend
// ============================================================================

/// OpenAI-compatible embeddings client. Works against OpenAI itself and
/// against compatible endpoints (Voyage, local servers) via `base_url`.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiBackend {
    /// Create a backend against the given endpoint.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::EMBED_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            batch_size: defaults::EMBED_BATCH_SIZE,
        }
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `VELLUM_EMBED_BASE_URL` | `https://api.openai.com/v1` |
    /// | `VELLUM_EMBED_MODEL` | `text-embedding-3-small` |
    /// | `OPENAI_API_KEY` | required |
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("VELLUM_EMBED_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var("VELLUM_EMBED_MODEL")
            .unwrap_or_else(|_| defaults::EMBED_MODEL.to_string());
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Config("OPENAI_API_KEY is not set".to_string()))?;
        Ok(Self::new(base_url, api_key, model))
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: batch,
            })
            .send()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider(format!(
                "embedding request failed: {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Provider(e.to_string()))?;

        if parsed.data.len() != batch.len() {
            return Err(Error::Provider(format!(
                "embedding count mismatch: sent {}, got {}",
                batch.len(),
                parsed.data.len()
            )));
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiBackend {
    #[instrument(skip(self, texts), fields(input_count = texts.len(), model = %self.model))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embeddings = self.embed_batch(batch).await?;
            all.extend(embeddings);
            debug!(embedded = all.len(), total = texts.len(), "Embedded batch");
        }
        Ok(all)
    }

    fn provider_id(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Mock backend
// ============================================================================

/// Deterministic mock embedding backend for tests.
///
/// Vectors are derived from the SHA-256 of the input text, so identical
/// text always embeds identically and different texts land far apart.
/// Calls are counted for cache-idempotence assertions.
#[derive(Clone)]
pub struct MockBackend {
    dimension: usize,
    call_count: Arc<Mutex<usize>>,
    fail: Arc<Mutex<bool>>,
}

impl MockBackend {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            call_count: Arc::new(Mutex::new(0)),
            fail: Arc::new(Mutex::new(false)),
        }
    }

    /// Total number of texts embedded so far (cache misses only, when
    /// fronted by the embedding cache).
    pub fn texts_embedded(&self) -> usize {
        *self.call_count.lock().expect("mock counter poisoned")
    }

    /// Make subsequent calls fail with a provider error.
    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().expect("mock flag poisoned") = fail;
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(text.as_bytes());
        (0..self.dimension)
            .map(|i| {
                let byte = digest[i % digest.len()];
                // Spread deterministically into [-1, 1].
                (f32::from(byte) - 127.5) / 127.5 * ((i / digest.len() + 1) as f32).recip()
            })
            .collect()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(32)
    }
}

#[async_trait]
impl EmbeddingBackend for MockBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if *self.fail.lock().expect("mock flag poisoned") {
            return Err(Error::Provider("mock backend failing".to_string()));
        }
        *self.call_count.lock().expect("mock counter poisoned") += texts.len();
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn provider_id(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-32"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let backend = MockBackend::new(16);
        let a = backend.embed_texts(&["hello".to_string()]).await.unwrap();
        let b = backend.embed_texts(&["hello".to_string()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 16);
    }

    #[tokio::test]
    async fn test_mock_distinguishes_texts() {
        let backend = MockBackend::new(16);
        let out = backend
            .embed_texts(&["one".to_string(), "two".to_string()])
            .await
            .unwrap();
        assert_ne!(out[0], out[1]);
    }

    #[tokio::test]
    async fn test_mock_counts_calls() {
        let backend = MockBackend::new(8);
        backend
            .embed_texts(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(backend.texts_embedded(), 2);
    }

    #[tokio::test]
    async fn test_mock_failure_mode() {
        let backend = MockBackend::new(8);
        backend.set_failing(true);
        let err = backend.embed_texts(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
        assert_eq!(backend.texts_embedded(), 0);
    }
}
