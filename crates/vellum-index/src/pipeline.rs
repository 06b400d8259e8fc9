//! Indexing pipeline — turns stabilized change events into vector-store
//! state.
//!
//! On `Changed`: read, parse, chunk, embed through the cache, then
//! replace-by-path upsert and publish `Indexed`. On `Deleted`: drop the
//! note's chunks and publish `Removed`.
//!
//! Writes are serialized per path. Each incoming event takes a sequence
//! number on arrival; after acquiring the path lock, an event whose
//! sequence is older than the last applied one is silently discarded, so
//! a slow re-index can never overwrite a newer one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, instrument, trace, warn};

use vellum_core::{
    content_hash, parse_note, ChunkMetadata, Error, EventBus, HeadingChunker, Note,
    NoteChunk, NoteEvent, NoteEventHandler, Result,
};

use crate::cache::EmbeddingCache;
use crate::embedder::EmbeddingBackend;
use crate::store::VectorStore;

#[derive(Default)]
struct PipelineState {
    next_seq: u64,
    applied: HashMap<String, u64>,
    locks: HashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

/// Consumes `Changed`/`Deleted` events and maintains the vector store.
pub struct IndexingPipeline {
    vault_root: PathBuf,
    chunker: HeadingChunker,
    cache: Arc<EmbeddingCache>,
    backend: Arc<dyn EmbeddingBackend>,
    store: Arc<dyn VectorStore>,
    bus: EventBus,
    state: Mutex<PipelineState>,
}

impl IndexingPipeline {
    pub fn new(
        vault_root: PathBuf,
        chunker: HeadingChunker,
        cache: Arc<EmbeddingCache>,
        backend: Arc<dyn EmbeddingBackend>,
        store: Arc<dyn VectorStore>,
        bus: EventBus,
    ) -> Self {
        Self {
            vault_root,
            chunker,
            cache,
            backend,
            store,
            bus,
            state: Mutex::new(PipelineState::default()),
        }
    }

    /// Allocate an arrival sequence number and the per-path lock.
    fn admit(&self, path: &str) -> (u64, Arc<tokio::sync::Mutex<()>>) {
        let mut state = self.state.lock().expect("pipeline state poisoned");
        let seq = state.next_seq;
        state.next_seq += 1;
        let lock = state
            .locks
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        (seq, lock)
    }

    fn is_stale(&self, path: &str, seq: u64) -> bool {
        let state = self.state.lock().expect("pipeline state poisoned");
        state.applied.get(path).is_some_and(|&applied| applied > seq)
    }

    fn mark_applied(&self, path: &str, seq: u64) {
        let mut state = self.state.lock().expect("pipeline state poisoned");
        state.applied.insert(path.to_string(), seq);
    }

    fn clear_path(&self, path: &str) {
        let mut state = self.state.lock().expect("pipeline state poisoned");
        state.applied.remove(path);
        state.locks.remove(path);
    }

    /// Re-index a single note. Public so a full-vault reindex can drive
    /// the same code path the watcher does.
    #[instrument(skip(self), fields(subsystem = "index", component = "pipeline"))]
    pub async fn index_note(&self, path: &str) -> Result<()> {
        let (seq, lock) = self.admit(path);
        let _guard = lock.lock().await;
        if self.is_stale(path, seq) {
            trace!(note_path = path, "Discarding stale index write");
            return Ok(());
        }

        let rel = vellum_core::validate_vault_path(Path::new(path), &self.vault_root)?;
        let abs = self.vault_root.join(&rel);

        let raw = match tokio::fs::read_to_string(&abs).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(note_path = path, "File vanished before indexing");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let note = match parse_note(&rel, &raw) {
            Ok(note) => note,
            Err(Error::Parse(msg)) => {
                warn!(
                    note_path = path,
                    error = %msg,
                    "Skipping unparseable note"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let chunks = self.chunker.chunk(&note);
        let embeddings = self.embed_chunks(&chunks).await?;

        // Full replace-by-path: stale indices from a shrunk note must go.
        self.store.delete_by_prefix(&format!("{path}::")).await?;
        for (chunk, vector) in chunks.iter().zip(embeddings) {
            self.store
                .upsert(&chunk.chunk_id(), vector, chunk_metadata(&note, chunk))
                .await?;
        }

        self.mark_applied(path, seq);
        info!(
            note_path = path,
            chunk_count = chunks.len(),
            "Indexed note"
        );
        self.bus.publish(NoteEvent::Indexed {
            path: path.to_string(),
            chunk_count: chunks.len(),
        });
        Ok(())
    }

    /// Remove a deleted note's chunks from the store.
    #[instrument(skip(self), fields(subsystem = "index", component = "pipeline"))]
    pub async fn remove_note(&self, path: &str) -> Result<()> {
        let (seq, lock) = self.admit(path);
        let _guard = lock.lock().await;
        if self.is_stale(path, seq) {
            trace!(note_path = path, "Discarding stale removal");
            return Ok(());
        }

        let removed = self.store.delete_by_prefix(&format!("{path}::")).await?;
        self.clear_path(path);
        info!(
            note_path = path,
            chunk_count = removed,
            "Removed note from index"
        );
        self.bus.publish(NoteEvent::Removed {
            path: path.to_string(),
        });
        Ok(())
    }

    /// Embed chunk texts through the cache: one batch lookup, one API
    /// call for the misses, one batch store.
    async fn embed_chunks(&self, chunks: &[NoteChunk]) -> Result<Vec<Vec<f32>>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let provider = self.backend.provider_id().to_string();
        let model = self.backend.model().to_string();

        let hashes: Vec<String> = chunks.iter().map(|c| content_hash(&c.text)).collect();
        let mut cached = self.cache.get_batch(&hashes, &provider, &model)?;

        let uncached: Vec<usize> = hashes
            .iter()
            .enumerate()
            .filter(|(_, h)| !cached.contains_key(*h))
            .map(|(i, _)| i)
            .collect();

        debug!(
            cache_hits = chunks.len() - uncached.len(),
            cache_misses = uncached.len(),
            "Embedding cache lookup"
        );

        if !uncached.is_empty() {
            let texts: Vec<String> = uncached.iter().map(|&i| chunks[i].text.clone()).collect();
            let fresh = self.backend.embed_texts(&texts).await?;
            let entries: Vec<(String, Vec<f32>)> = uncached
                .iter()
                .zip(&fresh)
                .map(|(&i, vector)| (hashes[i].clone(), vector.clone()))
                .collect();
            self.cache.put_batch(&entries, &provider, &model)?;
            for (hash, vector) in entries {
                cached.insert(hash, vector);
            }
        }

        Ok(hashes
            .iter()
            .map(|h| cached.get(h).cloned().unwrap_or_default())
            .collect())
    }
}

fn chunk_metadata(note: &Note, chunk: &NoteChunk) -> ChunkMetadata {
    ChunkMetadata {
        note_path: note.path.clone(),
        note_title: note.title.clone(),
        heading: chunk.heading.clone(),
        chunk_idx: chunk.chunk_idx,
        entities: note.entities.clone(),
    }
}

#[async_trait]
impl NoteEventHandler for IndexingPipeline {
    async fn handle(&self, event: NoteEvent) -> Result<()> {
        match event {
            NoteEvent::Changed { path, .. } => self.index_note(&path).await,
            NoteEvent::Deleted { path } => self.remove_note(&path).await,
            _ => Ok(()),
        }
    }
}
