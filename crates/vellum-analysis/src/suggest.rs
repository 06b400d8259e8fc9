//! Link suggestion with graph-aware ranking.
//!
//! Candidates are eligible on raw vector similarity alone, in the band
//! below merge/duplicate. Shared entities and graph proximity then
//! adjust ranking *within* that band; the composite score can exceed the
//! merge threshold numerically but never changes the tier — band
//! separation with the duplicate detector is strict.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use vellum_core::{defaults, BandConfig, NoteEvent, NoteEventHandler, Result, SuggestConfig};
use vellum_graph::GraphStore;
use vellum_index::VectorStore;

/// A ranked link suggestion.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub path: String,
    pub candidate_path: String,
    /// Raw vector similarity, the eligibility criterion.
    pub similarity: f32,
    /// Composite ranking score; may exceed band thresholds without
    /// changing the tier.
    pub score: f32,
    pub shared_entities: usize,
    pub graph_distance: Option<usize>,
}

/// `similarity + entity_weight·shared + graph_weight·(1/(1+distance))`.
/// Missing graph data contributes zero.
pub fn composite_score(
    similarity: f32,
    shared_entities: usize,
    graph_distance: Option<usize>,
    config: &SuggestConfig,
) -> f32 {
    let graph_term = graph_distance
        .map(|d| 1.0 / (1.0 + d as f32))
        .unwrap_or(0.0);
    similarity + config.entity_weight * shared_entities as f32 + config.graph_weight * graph_term
}

/// Proposes links between a freshly indexed note and its mid-similarity
/// neighbours.
pub struct NoteSuggester {
    store: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
    bands: BandConfig,
    weights: SuggestConfig,
    neighbor_k: usize,
}

impl NoteSuggester {
    pub fn new(
        store: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        bands: BandConfig,
        weights: SuggestConfig,
    ) -> Self {
        Self {
            store,
            graph,
            bands,
            weights,
            neighbor_k: defaults::NEIGHBOR_K,
        }
    }

    /// Suggestions for `path`, best composite score first.
    pub async fn suggest(&self, path: &str) -> Result<Vec<Suggestion>> {
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

        let own_entities = self.graph.entities_for_note(path).await?;
        let mut suggestions = Vec::new();
        for (candidate_path, similarity) in best {
            // Eligibility is raw similarity alone.
            if similarity < self.bands.suggest_min || similarity >= self.bands.merge_min {
                continue;
            }
            let candidate_entities = self.graph.entities_for_note(&candidate_path).await?;
            let shared_entities = own_entities
                .iter()
                .filter(|e| candidate_entities.contains(e))
                .count();
            let graph_distance = self.graph.note_distance(path, &candidate_path).await?;
            let score = composite_score(similarity, shared_entities, graph_distance, &self.weights);
            suggestions.push(Suggestion {
                path: path.to_string(),
                candidate_path,
                similarity,
                score,
                shared_entities,
                graph_distance,
            });
        }
        suggestions
            .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        debug!(
            note_path = path,
            candidate_count = suggestions.len(),
            "Suggestion pass complete"
        );
        Ok(suggestions)
    }
}

#[async_trait]
impl NoteEventHandler for NoteSuggester {
    async fn handle(&self, event: NoteEvent) -> Result<()> {
        if let NoteEvent::Indexed { path, .. } = event {
            for suggestion in self.suggest(&path).await? {
                info!(
                    note_path = %suggestion.path,
                    candidate = %suggestion.candidate_path,
                    similarity = suggestion.similarity,
                    score = suggestion.score,
                    shared = suggestion.shared_entities,
                    "Link suggestion"
                );
            }
        }
        Ok(())
    }
}
