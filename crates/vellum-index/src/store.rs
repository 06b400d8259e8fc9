//! Vector store abstraction and in-memory reference implementation.
//!
//! Chunk keys are `path::idx`, so everything belonging to one note
//! shares the `path::` prefix — replace-by-path and delete-by-path are
//! prefix operations, no transaction needed.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use vellum_core::{ChunkMetadata, Result};

/// A nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Chunk key (`path::idx`).
    pub key: String,
    /// Cosine similarity in `[-1, 1]` (effectively `[0, 1]` for
    /// normalized embeddings).
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// Storage for chunk vectors and metadata.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a chunk vector.
    async fn upsert(&self, key: &str, vector: Vec<f32>, metadata: ChunkMetadata) -> Result<()>;

    /// Remove every entry whose key starts with `prefix`. Returns the
    /// number removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize>;

    /// Nearest neighbours of `vector`, best first. Chunks whose note
    /// path equals `exclude_note_path` are skipped (self-match filter).
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        exclude_note_path: Option<&str>,
    ) -> Result<Vec<SearchHit>>;

    /// All stored (key, vector) pairs for a note, in chunk order.
    async fn chunks_for_note(&self, note_path: &str) -> Result<Vec<(String, Vec<f32>)>>;

    /// Total stored chunk count.
    async fn len(&self) -> usize;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[derive(Debug, Clone)]
struct StoredChunk {
    vector: Vec<f32>,
    metadata: ChunkMetadata,
}

/// In-memory cosine-similarity store. The reference [`VectorStore`]
/// implementation, also used throughout the test suites.
#[derive(Default)]
pub struct MemoryVectorStore {
    chunks: RwLock<HashMap<String, StoredChunk>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, key: &str, vector: Vec<f32>, metadata: ChunkMetadata) -> Result<()> {
        let mut chunks = self.chunks.write().await;
        chunks.insert(key.to_string(), StoredChunk { vector, metadata });
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize> {
        let mut chunks = self.chunks.write().await;
        let before = chunks.len();
        chunks.retain(|key, _| !key.starts_with(prefix));
        Ok(before - chunks.len())
    }

    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        exclude_note_path: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let chunks = self.chunks.read().await;
        let mut hits: Vec<SearchHit> = chunks
            .iter()
            .filter(|(_, stored)| {
                exclude_note_path
                    .map(|p| stored.metadata.note_path != p)
                    .unwrap_or(true)
            })
            .map(|(key, stored)| SearchHit {
                key: key.clone(),
                score: cosine_similarity(vector, &stored.vector),
                metadata: stored.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    async fn chunks_for_note(&self, note_path: &str) -> Result<Vec<(String, Vec<f32>)>> {
        let prefix = format!("{note_path}::");
        let chunks = self.chunks.read().await;
        let mut result: Vec<(usize, String, Vec<f32>)> = chunks
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, stored)| (stored.metadata.chunk_idx, key.clone(), stored.vector.clone()))
            .collect();
        result.sort_by_key(|(idx, _, _)| *idx);
        Ok(result.into_iter().map(|(_, key, vector)| (key, vector)).collect())
    }

    async fn len(&self) -> usize {
        self.chunks.read().await.len()
    }
}
