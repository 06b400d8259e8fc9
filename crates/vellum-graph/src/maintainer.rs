//! Graph pruning on note deletion.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use vellum_core::{NoteEvent, NoteEventHandler, Result};

use crate::graph::GraphStore;

/// Removes a deleted note's contribution from the graph. Subscribes to
/// `Deleted` so graph state never outlives the file it came from.
pub struct GraphMaintainer {
    graph: Arc<dyn GraphStore>,
}

impl GraphMaintainer {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl NoteEventHandler for GraphMaintainer {
    async fn handle(&self, event: NoteEvent) -> Result<()> {
        if let NoteEvent::Deleted { path } = event {
            debug!(note_path = %path, "Pruning graph for deleted note");
            self.graph.remove_source(&path).await?;
        }
        Ok(())
    }
}
