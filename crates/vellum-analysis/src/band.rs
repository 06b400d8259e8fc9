//! Similarity band classification.
//!
//! Bands partition the score axis: `[duplicate, 1]`, `[merge,
//! duplicate)`, `[suggest, merge)`, and everything below. Half-open on
//! the high side, so no score ever lands in two bands.

use serde::Serialize;

use vellum_core::BandConfig;

/// How strongly two notes overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimilarityBand {
    Duplicate,
    MergeCandidate,
    LinkSuggestion,
    Unrelated,
}

impl SimilarityBand {
    /// Classify a cosine similarity score. Total over all finite scores.
    pub fn classify(score: f32, config: &BandConfig) -> Self {
        if score >= config.duplicate_min {
            SimilarityBand::Duplicate
        } else if score >= config.merge_min {
            SimilarityBand::MergeCandidate
        } else if score >= config.suggest_min {
            SimilarityBand::LinkSuggestion
        } else {
            SimilarityBand::Unrelated
        }
    }
}
