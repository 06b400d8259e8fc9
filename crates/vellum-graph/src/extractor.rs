//! Entity extraction seam.
//!
//! The batcher only sees [`EntityExtractor`]; what produces the entities
//! is pluggable. [`WikilinkExtractor`] derives them from the note's own
//! structure (wikilinks, tags, frontmatter entities) and is the default
//! for local operation.

use async_trait::async_trait;

use vellum_core::{parse_note, Result};

/// Extraction result for one note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub entities: Vec<String>,
    /// Undirected entity pairs.
    pub relations: Vec<(String, String)>,
}

/// Produces entities and relations from a note's text.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, note_path: &str, text: &str) -> Result<Extraction>;
}

/// Structural extractor: entities are the note's wikilinks, tags, and
/// frontmatter entities; every pair mentioned in the same note is
/// related.
#[derive(Debug, Default)]
pub struct WikilinkExtractor;

#[async_trait]
impl EntityExtractor for WikilinkExtractor {
    async fn extract(&self, note_path: &str, text: &str) -> Result<Extraction> {
        let note = parse_note(std::path::Path::new(note_path), text)?;

        let mut entities: Vec<String> = note
            .wikilinks
            .iter()
            .chain(note.tags.iter())
            .chain(note.entities.iter())
            .cloned()
            .collect();
        entities.sort();
        entities.dedup();

        let mut relations = Vec::new();
        for (i, a) in entities.iter().enumerate() {
            for b in entities.iter().skip(i + 1) {
                relations.push((a.clone(), b.clone()));
            }
        }

        Ok(Extraction { entities, relations })
    }
}
