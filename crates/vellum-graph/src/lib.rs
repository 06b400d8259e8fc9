//! Knowledge graph for vellum: the graph store abstraction with an
//! in-memory implementation, the entity extraction seam, the dirty-set
//! batcher, and the delete-pruning maintainer.

pub mod batcher;
pub mod extractor;
pub mod graph;
pub mod maintainer;

pub use batcher::GraphBatcher;
pub use extractor::{EntityExtractor, Extraction, WikilinkExtractor};
pub use graph::{GraphStore, MemoryGraph};
pub use maintainer::GraphMaintainer;
