//! # vellum-core
//!
//! Core types, events, and abstractions shared by the vellum crates:
//! the note model and parser, heading-aware chunking, content
//! fingerprinting, path security, configuration, and the note event bus.

pub mod chunker;
pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod fingerprint;
pub mod logging;
pub mod note;
pub mod parser;
pub mod security;
pub mod vault;

// Re-export commonly used types at crate root
pub use chunker::{ChunkerConfig, HeadingChunker};
pub use config::{
    AutoTagConfig, BandConfig, DigestConfig, GraphBatchConfig, SuggestConfig, VaultConfig,
    WatchConfig,
};
pub use error::{Error, Result};
pub use events::{EventBus, NoteEvent, NoteEventHandler, NoteEventKind, Subscription};
pub use fingerprint::{content_hash, Fingerprint};
pub use note::{ChunkMetadata, Note, NoteChunk};
pub use parser::parse_note;
pub use security::validate_vault_path;
pub use vault::list_notes;
