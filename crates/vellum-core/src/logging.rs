//! Structured logging field name constants for vellum.
//!
//! All crates use these constants for consistent structured logging
//! fields, so log queries work across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, item skipped or fallback applied |
//! | INFO  | Lifecycle events, completed index/flush operations |
//! | DEBUG | Decision points (debounce restarts, cache hit ratios) |
//! | TRACE | Per-item iteration (chunks, neighbour hits, stale discards) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "watch", "index", "graph", "analysis", "events"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "stabilizer", "pipeline", "embedding_cache", "batcher"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "stability_check", "index_note", "flush_batch"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Vault-relative note path being operated on.
pub const NOTE_PATH: &str = "note_path";

/// Content fingerprint of the note at the time of the operation.
pub const FINGERPRINT: &str = "fingerprint";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of chunks produced or indexed.
pub const CHUNK_COUNT: &str = "chunk_count";

/// Embedding cache hits during an index pass.
pub const CACHE_HITS: &str = "cache_hits";

/// Embedding cache misses during an index pass.
pub const CACHE_MISSES: &str = "cache_misses";

/// Number of candidate notes examined by analysis.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of paths taken in a graph batch flush.
pub const BATCH_SIZE: &str = "batch_size";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
