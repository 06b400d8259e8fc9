//! Data models for vault notes and chunks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::fingerprint::Fingerprint;

/// A parsed markdown note from the vault.
///
/// `path` is always vault-relative — it doubles as the note's stable
/// identity for the vector store, the event bus, and the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    /// Vault-relative path, forward slashes.
    pub path: String,
    /// Title from frontmatter, falling back to the file stem.
    pub title: String,
    /// Body text with frontmatter stripped.
    pub body: String,
    /// Parsed YAML frontmatter. Empty map when absent.
    #[serde(default)]
    pub frontmatter: BTreeMap<String, serde_yaml::Value>,
    /// Tags from frontmatter merged with inline `#tag` occurrences.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Entity names declared in frontmatter.
    #[serde(default)]
    pub entities: Vec<String>,
    /// `[[wikilink]]` targets found in the body.
    #[serde(default)]
    pub wikilinks: Vec<String>,
    /// When the note was last modified, if known.
    pub modified: Option<DateTime<Utc>>,
}

impl Note {
    /// Fingerprint of the note body, for change detection.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of_text(&self.body)
    }
}

/// A heading-delimited (or paragraph-delimited) slice of a note's body —
/// the unit of embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteChunk {
    /// Vault-relative path of the owning note.
    pub note_path: String,
    /// Position of this chunk within the note's ordered chunk sequence.
    pub chunk_idx: usize,
    /// Heading line this chunk falls under. Empty for preamble or
    /// paragraph-fallback chunks.
    pub heading: String,
    /// Chunk text, including its heading line when present.
    pub text: String,
}

impl NoteChunk {
    /// Vector-store key: `path::idx`. All chunks for a note share the
    /// `path::` prefix, which is what delete-by-prefix relies on.
    pub fn chunk_id(&self) -> String {
        format!("{}::{}", self.note_path, self.chunk_idx)
    }
}

/// Chunk metadata carried alongside the vector in the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub note_path: String,
    pub note_title: String,
    pub heading: String,
    pub chunk_idx: usize,
    #[serde(default)]
    pub entities: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_format() {
        let chunk = NoteChunk {
            note_path: "00-inbox/x.md".to_string(),
            chunk_idx: 0,
            heading: "# A".to_string(),
            text: "# A\n\ntext".to_string(),
        };
        assert_eq!(chunk.chunk_id(), "00-inbox/x.md::0");
    }

    #[test]
    fn test_note_fingerprint_tracks_body() {
        let mut note = Note {
            path: "a.md".to_string(),
            title: "a".to_string(),
            body: "text".to_string(),
            frontmatter: BTreeMap::new(),
            tags: vec![],
            entities: vec![],
            wikilinks: vec![],
            modified: None,
        };
        let fp1 = note.fingerprint();
        note.body.push_str(" more");
        assert_ne!(fp1, note.fingerprint());
    }
}
