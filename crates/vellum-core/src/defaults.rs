//! Centralized default values for vellum configuration.
//!
//! Every tunable consumed by the watch, index, graph, and analysis
//! subsystems has its default defined here, so `from_env()` constructors
//! across crates agree on one source of truth.

// ─── Watch / debounce ──────────────────────────────────────────────────────

/// Debounce window for coalescing rapid filesystem notifications (ms).
pub const DEBOUNCE_MS: u64 = 500;

/// Interval between the two fingerprint reads of the stability check (ms).
pub const STABILITY_INTERVAL_MS: u64 = 500;

/// File extensions treated as notes.
pub const NOTE_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Vault folders excluded from watching and indexing.
pub const EXCLUDED_FOLDERS: &[&str] = &[".obsidian", ".git", ".trash"];

// ─── Chunking ──────────────────────────────────────────────────────────────

/// Maximum characters per chunk before a heading section is split by
/// paragraphs.
pub const CHUNK_MAX_CHARS: usize = 2000;

// ─── Embedding ─────────────────────────────────────────────────────────────

/// Default embedding provider identifier.
pub const EMBED_PROVIDER: &str = "openai";

/// Default embedding model.
pub const EMBED_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension.
pub const EMBED_DIMENSION: usize = 1536;

/// Maximum texts per embedding API request.
pub const EMBED_BATCH_SIZE: usize = 64;

/// Timeout for embedding requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 60;

// ─── Similarity bands ──────────────────────────────────────────────────────

/// Minimum similarity for the duplicate band (score >= this).
pub const BAND_DUPLICATE_MIN: f32 = 0.92;

/// Minimum similarity for the merge-candidate band.
pub const BAND_MERGE_MIN: f32 = 0.80;

/// Minimum similarity for the link-suggestion band.
pub const BAND_SUGGEST_MIN: f32 = 0.70;

/// Nearest-neighbour fan-out per chunk when detecting duplicates.
pub const NEIGHBOR_K: usize = 10;

// ─── Note suggestions ──────────────────────────────────────────────────────

/// Weight applied to the shared-entity count in the composite score.
pub const ENTITY_WEIGHT: f32 = 0.1;

/// Weight applied to the inverse graph distance in the composite score.
pub const GRAPH_WEIGHT: f32 = 0.05;

// ─── Auto-tagging ──────────────────────────────────────────────────────────

/// Minimum body length (chars) before a note is worth classifying.
pub const TAG_MIN_CONTENT_LEN: usize = 100;

/// Maximum tags suggested per note.
pub const TAG_MAX_PER_NOTE: usize = 3;

// ─── Digest ────────────────────────────────────────────────────────────────

/// Activity window for the vault digest (days).
pub const DIGEST_PERIOD_DAYS: u64 = 1;

/// Interval between automatic digest generations (seconds).
pub const DIGEST_INTERVAL_SECS: u64 = 86_400;

/// Maximum trending entities reported per digest.
pub const DIGEST_MAX_TRENDING: usize = 5;

/// Maximum suggested connections reported per digest.
pub const DIGEST_MAX_SUGGESTIONS: usize = 5;

/// Lower similarity bound for digest connection suggestions.
pub const DIGEST_CONNECTION_MIN: f32 = 0.70;

/// Upper similarity bound for digest connection suggestions. Pairs above
/// this are duplicate-detector territory, not missing links.
pub const DIGEST_CONNECTION_MAX: f32 = 0.85;

// ─── Graph batching ────────────────────────────────────────────────────────

/// Interval between dirty-set flushes to entity extraction (seconds).
pub const BATCH_GRAPH_INTERVAL_SECS: u64 = 300;

/// Timeout for a single entity-extraction call (seconds). One hanging
/// note must not stall the rest of the batch.
pub const EXTRACTION_TIMEOUT_SECS: u64 = 120;
