//! Dirty-set graph batching.
//!
//! Entity extraction is the expensive step, so it runs on a timer
//! instead of per save: change events only mark the path dirty, and a
//! periodic flush takes-and-clears the whole set atomically, extracts
//! each path with a bounded timeout, and merges the results into the
//! graph. A failed or timed-out path is logged and skipped, never
//! requeued; it gets another chance the next time it changes.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use vellum_core::{GraphBatchConfig, NoteEvent, NoteEventHandler, Result};

use crate::extractor::EntityExtractor;
use crate::graph::GraphStore;

/// Accumulates changed notes and flushes them to entity extraction on an
/// interval. Cloning is cheap; all clones share the dirty set.
#[derive(Clone)]
pub struct GraphBatcher {
    inner: Arc<BatcherInner>,
}

struct BatcherInner {
    vault_root: PathBuf,
    config: GraphBatchConfig,
    extractor: Arc<dyn EntityExtractor>,
    graph: Arc<dyn GraphStore>,
    dirty: Mutex<HashSet<String>>,
}

impl GraphBatcher {
    pub fn new(
        vault_root: PathBuf,
        config: GraphBatchConfig,
        extractor: Arc<dyn EntityExtractor>,
        graph: Arc<dyn GraphStore>,
    ) -> Self {
        Self {
            inner: Arc::new(BatcherInner {
                vault_root,
                config,
                extractor,
                graph,
                dirty: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Mark a note as needing re-extraction. Deduplicated by path.
    pub fn mark_dirty(&self, path: &str) {
        let mut dirty = self.inner.dirty.lock().expect("dirty set poisoned");
        if dirty.insert(path.to_string()) {
            trace!(note_path = path, "Note marked dirty for extraction");
        }
    }

    /// Number of paths awaiting extraction.
    pub fn dirty_count(&self) -> usize {
        self.inner.dirty.lock().expect("dirty set poisoned").len()
    }

    /// Spawn the periodic flush loop. Runs until the handle is aborted.
    pub fn run(&self) -> JoinHandle<()> {
        let batcher = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(batcher.inner.config.flush_interval);
            // The immediate first tick would flush an empty set.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                batcher.flush_now().await;
            }
        })
    }

    /// Flush the dirty set once. Public so tests and shutdown paths can
    /// force a flush without waiting for the timer.
    pub async fn flush_now(&self) {
        let batch: Vec<String> = {
            let mut dirty = self.inner.dirty.lock().expect("dirty set poisoned");
            std::mem::take(&mut *dirty).into_iter().collect()
        };
        if batch.is_empty() {
            trace!("Graph flush tick with empty dirty set");
            return;
        }

        info!(batch_size = batch.len(), "Flushing graph batch");
        for path in batch {
            match tokio::time::timeout(
                self.inner.config.extraction_timeout,
                self.inner.extract_one(&path),
            )
            .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        note_path = %path,
                        error = %e,
                        "Entity extraction failed, skipping note"
                    );
                }
                Err(_) => {
                    warn!(
                        note_path = %path,
                        "Entity extraction timed out, skipping note"
                    );
                }
            }
        }
    }
}

impl BatcherInner {
    async fn extract_one(&self, path: &str) -> Result<()> {
        let rel = vellum_core::validate_vault_path(std::path::Path::new(path), &self.vault_root)?;
        let text = match tokio::fs::read_to_string(self.vault_root.join(&rel)).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(note_path = path, "Note vanished before extraction");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let extraction = self.extractor.extract(path, &text).await?;
        debug!(
            note_path = path,
            entities = extraction.entities.len(),
            "Merging extraction into graph"
        );
        self.graph
            .merge_entities(path, &extraction.entities, &extraction.relations)
            .await
    }
}

#[async_trait]
impl NoteEventHandler for GraphBatcher {
    async fn handle(&self, event: NoteEvent) -> Result<()> {
        if let NoteEvent::Changed { path, .. } = event {
            self.mark_dirty(&path);
        }
        Ok(())
    }
}
