//! Heading-aware chunking for embedding.
//!
//! Strategy:
//! 1. Split the body at ATX headings — each heading section is one chunk,
//!    with preamble before the first heading as its own chunk.
//! 2. A note with no headings falls back to paragraph-level chunks.
//! 3. A section exceeding the size budget is split at paragraph
//!    boundaries, each piece keeping the heading context.
//!
//! Chunking is deterministic: identical input always yields the same
//! ordered chunk sequence. The embedding cache depends on this.

use regex::Regex;
use std::sync::OnceLock;

use crate::defaults;
use crate::note::{Note, NoteChunk};

fn heading_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(#{1,6})\s+(.+)$").unwrap())
}

/// Configuration for the heading chunker.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum characters per chunk before paragraph splitting kicks in.
    pub max_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: defaults::CHUNK_MAX_CHARS,
        }
    }
}

/// Splits notes into heading-delimited chunks ready for embedding.
#[derive(Debug, Clone, Default)]
pub struct HeadingChunker {
    config: ChunkerConfig,
}

impl HeadingChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Chunk a note's body. Empty bodies produce no chunks.
    pub fn chunk(&self, note: &Note) -> Vec<NoteChunk> {
        let body = note.body.trim();
        if body.is_empty() {
            return Vec::new();
        }

        let sections = split_by_headings(body);
        let mut chunks: Vec<NoteChunk> = Vec::new();

        if sections.len() == 1 && sections[0].0.is_empty() {
            // No headings: paragraph-level fallback.
            for text in self.pack_paragraphs(sections[0].1) {
                self.push_chunk(&mut chunks, note, "", &text);
            }
            return chunks;
        }

        for (heading, content) in sections {
            let content = content.trim();
            if content.is_empty() && heading.is_empty() {
                continue;
            }
            if content.len() <= self.config.max_chars {
                let text = join_heading(heading, content);
                self.push_chunk(&mut chunks, note, heading, &text);
            } else {
                for piece in self.pack_paragraphs(content) {
                    let text = join_heading(heading, &piece);
                    self.push_chunk(&mut chunks, note, heading, &text);
                }
            }
        }

        chunks
    }

    fn push_chunk(&self, chunks: &mut Vec<NoteChunk>, note: &Note, heading: &str, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        chunks.push(NoteChunk {
            note_path: note.path.clone(),
            chunk_idx: chunks.len(),
            heading: heading.to_string(),
            text: text.to_string(),
        });
    }

    /// Greedily pack consecutive paragraphs up to the size budget.
    fn pack_paragraphs(&self, text: &str) -> Vec<String> {
        let mut pieces: Vec<String> = Vec::new();
        let mut current = String::new();

        for para in text.split("\n\n") {
            let para = para.trim();
            if para.is_empty() {
                continue;
            }
            if !current.is_empty() && current.len() + 2 + para.len() > self.config.max_chars {
                pieces.push(std::mem::take(&mut current));
            }
            if current.is_empty() {
                current = para.to_string();
            } else {
                current.push_str("\n\n");
                current.push_str(para);
            }
        }
        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }
}

fn join_heading(heading: &str, content: &str) -> String {
    if heading.is_empty() {
        content.to_string()
    } else if content.is_empty() {
        heading.to_string()
    } else {
        format!("{heading}\n\n{content}")
    }
}

/// Split text into (heading line, section content) pairs. Preamble before
/// the first heading gets an empty heading.
fn split_by_headings(text: &str) -> Vec<(&str, &str)> {
    let matches: Vec<_> = heading_pattern().find_iter(text).collect();
    if matches.is_empty() {
        return vec![("", text)];
    }

    let mut sections: Vec<(&str, &str)> = Vec::new();

    if matches[0].start() > 0 {
        let preamble = text[..matches[0].start()].trim();
        if !preamble.is_empty() {
            sections.push(("", preamble));
        }
    }

    for (i, m) in matches.iter().enumerate() {
        let heading = m.as_str().trim();
        let start = m.end();
        let end = matches
            .get(i + 1)
            .map(|next| next.start())
            .unwrap_or(text.len());
        sections.push((heading, text[start..end].trim()));
    }

    sections
}
