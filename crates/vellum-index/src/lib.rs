//! Indexing for vellum: embedding backends, the persistent embedding
//! cache, the vector store abstraction, and the pipeline that keeps the
//! store in sync with note change events.

pub mod cache;
pub mod embedder;
pub mod pipeline;
pub mod store;

pub use cache::{CacheStats, EmbeddingCache};
pub use embedder::{EmbeddingBackend, MockBackend, OpenAiBackend};
pub use pipeline::IndexingPipeline;
pub use store::{MemoryVectorStore, SearchHit, VectorStore};
