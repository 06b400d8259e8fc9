//! Duplicate detection over freshly indexed notes.
//!
//! For each chunk of the note the vector store is queried for nearest
//! neighbours excluding the note's own chunks; the best cross-note score
//! per candidate is banded. Entries are handed to an [`OverlapSink`],
//! nothing is persisted here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use vellum_core::{defaults, BandConfig, NoteEvent, NoteEventHandler, Result};
use vellum_index::VectorStore;

use crate::band::SimilarityBand;

/// One detected overlap between two notes.
#[derive(Debug, Clone, Serialize)]
pub struct OverlapEntry {
    pub path: String,
    pub candidate_path: String,
    pub band: SimilarityBand,
    pub score: f32,
}

/// Receives overlap reports. The detector computes, the sink decides
/// what to do with the result.
#[async_trait]
pub trait OverlapSink: Send + Sync {
    async fn report(&self, entries: Vec<OverlapEntry>) -> Result<()>;
}

/// Sink that logs each overlap. The default collaborator for daemon use.
pub struct LogSink;

#[async_trait]
impl OverlapSink for LogSink {
    async fn report(&self, entries: Vec<OverlapEntry>) -> Result<()> {
        for entry in entries {
            info!(
                note_path = %entry.path,
                candidate = %entry.candidate_path,
                band = ?entry.band,
                score = entry.score,
                "Overlap detected"
            );
        }
        Ok(())
    }
}

/// Sink that buffers entries for inspection. Used by tests.
#[derive(Default)]
pub struct BufferSink {
    entries: std::sync::Mutex<Vec<OverlapEntry>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<OverlapEntry> {
        std::mem::take(&mut self.entries.lock().expect("sink poisoned"))
    }
}

#[async_trait]
impl OverlapSink for BufferSink {
    async fn report(&self, mut entries: Vec<OverlapEntry>) -> Result<()> {
        self.entries.lock().expect("sink poisoned").append(&mut entries);
        Ok(())
    }
}

/// Classifies cross-note overlap for each indexed note.
pub struct DuplicateDetector {
    store: Arc<dyn VectorStore>,
    sink: Arc<dyn OverlapSink>,
    bands: BandConfig,
    neighbor_k: usize,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn VectorStore>, sink: Arc<dyn OverlapSink>, bands: BandConfig) -> Self {
        Self {
            store,
            sink,
            bands,
            neighbor_k: defaults::NEIGHBOR_K,
        }
    }

    /// Best cross-note similarity per candidate, banded. Only candidates
    /// at or above the suggestion threshold are reported; a note with no
    /// neighbours yields an empty report.
    pub async fn detect(&self, path: &str) -> Result<Vec<OverlapEntry>> {
        let chunks = self.store.chunks_for_note(path).await?;
        let mut best: HashMap<String, f32> = HashMap::new();

        for (_, vector) in &chunks {
            let hits = self.store.query(vector, self.neighbor_k, Some(path)).await?;
            for hit in hits {
                let entry = best.entry(hit.metadata.note_path).or_insert(f32::MIN);
                if hit.score > *entry {
                    *entry = hit.score;
                }
            }
        }

        let mut entries: Vec<OverlapEntry> = best
            .into_iter()
            .filter(|(_, score)| *score >= self.bands.suggest_min)
            .map(|(candidate_path, score)| OverlapEntry {
                path: path.to_string(),
                candidate_path,
                band: SimilarityBand::classify(score, &self.bands),
                score,
            })
            .collect();
        entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        debug!(
            note_path = path,
            candidate_count = entries.len(),
            "Overlap detection complete"
        );
        Ok(entries)
    }
}

#[async_trait]
impl NoteEventHandler for DuplicateDetector {
    async fn handle(&self, event: NoteEvent) -> Result<()> {
        if let NoteEvent::Indexed { path, .. } = event {
            let entries = self.detect(&path).await?;
            if !entries.is_empty() {
                self.sink.report(entries).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_core::ChunkMetadata;
    use vellum_index::MemoryVectorStore;

    fn meta(path: &str, idx: usize) -> ChunkMetadata {
        ChunkMetadata {
            note_path: path.to_string(),
            note_title: path.to_string(),
            heading: String::new(),
            chunk_idx: idx,
            entities: vec![],
        }
    }

    /// Unit vector at the given cosine similarity to [1, 0].
    fn at_similarity(target: f32) -> Vec<f32> {
        vec![target, (1.0 - target * target).sqrt()]
    }

    async fn detector_with(
        pairs: &[(&str, Vec<f32>)],
    ) -> (DuplicateDetector, Arc<BufferSink>) {
        let store = Arc::new(MemoryVectorStore::new());
        for (key, vector) in pairs {
            let path = key.split("::").next().unwrap();
            store.upsert(key, vector.clone(), meta(path, 0)).await.unwrap();
        }
        let sink = Arc::new(BufferSink::new());
        (
            DuplicateDetector::new(store, sink.clone(), BandConfig::default()),
            sink,
        )
    }

    #[tokio::test]
    async fn test_95_percent_similar_is_duplicate() {
        let (detector, _) = detector_with(&[
            ("a.md::0", at_similarity(1.0)),
            ("b.md::0", at_similarity(0.95)),
        ])
        .await;

        let entries = detector.detect("a.md").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].candidate_path, "b.md");
        assert_eq!(entries[0].band, SimilarityBand::Duplicate);
        assert!((entries[0].score - 0.95).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_unrelated_candidates_not_reported() {
        let (detector, _) = detector_with(&[
            ("a.md::0", at_similarity(1.0)),
            ("far.md::0", at_similarity(0.3)),
        ])
        .await;

        let entries = detector.detect("a.md").await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_best_chunk_score_wins_per_candidate() {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .upsert("a.md::0", at_similarity(1.0), meta("a.md", 0))
            .await
            .unwrap();
        store
            .upsert("b.md::0", at_similarity(0.72), meta("b.md", 0))
            .await
            .unwrap();
        store
            .upsert("b.md::1", at_similarity(0.85), meta("b.md", 1))
            .await
            .unwrap();
        let sink = Arc::new(BufferSink::new());
        let detector = DuplicateDetector::new(store, sink, BandConfig::default());

        let entries = detector.detect("a.md").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].band, SimilarityBand::MergeCandidate);
        assert!((entries[0].score - 0.85).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_empty_store_yields_empty_report() {
        let (detector, _) = detector_with(&[]).await;
        let entries = detector.detect("a.md").await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_indexed_event_reports_to_sink() {
        let (detector, sink) = detector_with(&[
            ("a.md::0", at_similarity(1.0)),
            ("b.md::0", at_similarity(0.95)),
        ])
        .await;

        detector
            .handle(NoteEvent::Indexed {
                path: "a.md".to_string(),
                chunk_count: 1,
            })
            .await
            .unwrap();

        let reported = sink.take();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].candidate_path, "b.md");
    }
}
