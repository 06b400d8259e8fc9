//! vellum-daemon - watches a markdown vault and keeps its index fresh.
//!
//! Wires the full cycle together: OS notifications feed the stabilizer,
//! stabilized events drive the indexing pipeline, indexed events drive
//! duplicate detection, link suggestion, and tag suggestions, and change
//! events feed the graph batcher. A periodic task writes the vault
//! activity digest. Runs until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vellum_analysis::{
    AutoTagger, DigestGenerator, DuplicateDetector, KeywordClassifier, LogSink, NoteSuggester,
};
use vellum_core::{
    list_notes, AutoTagConfig, BandConfig, DigestConfig, EventBus, GraphBatchConfig,
    HeadingChunker, NoteEventKind, SuggestConfig, VaultConfig, WatchConfig,
};
use vellum_graph::{GraphBatcher, GraphMaintainer, MemoryGraph, WikilinkExtractor};
use vellum_index::{EmbeddingCache, IndexingPipeline, MemoryVectorStore, OpenAiBackend};
use vellum_watch::{VaultWatcher, WatchStabilizer};

fn init_tracing() {
    // LOG_FORMAT - "json" or "text" (default: "text")
    // RUST_LOG   - standard env filter (default: "vellum=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vellum=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let vault = VaultConfig::from_env()?;
    let watch_config = WatchConfig::from_env();
    let bands = BandConfig::from_env();
    let weights = SuggestConfig::from_env();
    let batch_config = GraphBatchConfig::from_env();
    info!(root = %vault.root.display(), "Starting vellum daemon");

    let bus = EventBus::new();

    let cache_path = std::env::var("VELLUM_CACHE_DB")
        .map(PathBuf::from)
        .unwrap_or_else(|_| vault.root.join(".vellum").join("embeddings.db"));
    let cache = Arc::new(EmbeddingCache::open(&cache_path)?);
    let backend = Arc::new(OpenAiBackend::from_env()?);
    let store = Arc::new(MemoryVectorStore::new());

    let pipeline = Arc::new(IndexingPipeline::new(
        vault.root.clone(),
        HeadingChunker::default(),
        cache,
        backend,
        store.clone(),
        bus.clone(),
    ));
    let _pipeline_sub = bus.subscribe(
        "pipeline",
        &[NoteEventKind::Changed, NoteEventKind::Deleted],
        pipeline.clone(),
    );

    let graph = Arc::new(MemoryGraph::new());
    let detector = Arc::new(DuplicateDetector::new(
        store.clone(),
        Arc::new(LogSink),
        bands.clone(),
    ));
    let _detector_sub = bus.subscribe("duplicate-detector", &[NoteEventKind::Indexed], detector);
    let suggester = Arc::new(NoteSuggester::new(
        store.clone(),
        graph.clone(),
        bands,
        weights,
    ));
    let _suggester_sub = bus.subscribe("note-suggester", &[NoteEventKind::Indexed], suggester);

    let quarantine_path = std::env::var("VELLUM_TAG_QUARANTINE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| vault.root.join(".vellum").join("tag_quarantine.json"));
    let tagger = Arc::new(AutoTagger::new(
        vault.root.clone(),
        AutoTagConfig::from_env(),
        Arc::new(KeywordClassifier),
        quarantine_path,
    )?);
    let _tagger_sub = bus.subscribe("auto-tagger", &[NoteEventKind::Indexed], tagger);

    let batcher = GraphBatcher::new(
        vault.root.clone(),
        batch_config,
        Arc::new(WikilinkExtractor),
        graph.clone(),
    );
    let _batcher_sub = bus.subscribe(
        "graph-batcher",
        &[NoteEventKind::Changed],
        Arc::new(batcher.clone()),
    );
    let _maintainer_sub = bus.subscribe(
        "graph-maintainer",
        &[NoteEventKind::Deleted],
        Arc::new(GraphMaintainer::new(graph.clone())),
    );
    let batcher_task = batcher.run();

    let digest_config = DigestConfig::from_env();
    let digest_interval = digest_config.generation_interval;
    let digest = DigestGenerator::new(
        vault.root.clone(),
        watch_config.clone(),
        store,
        graph,
        digest_config,
    );
    let digest_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(digest_interval);
        ticker.tick().await; // the immediate first tick
        loop {
            ticker.tick().await;
            match digest.generate().await {
                Ok(report) => {
                    if let Err(e) = digest.save_to_vault(&report).await {
                        warn!(error = %e, "Failed to save digest");
                    }
                }
                Err(e) => warn!(error = %e, "Digest generation failed"),
            }
        }
    });

    let stabilizer = WatchStabilizer::new(vault.root.clone(), watch_config.clone(), bus.clone());
    let _watcher = VaultWatcher::start(&vault.root, stabilizer)?;

    // The vector store is in-memory, so every start re-indexes the
    // vault; the embedding cache keeps that cheap.
    let notes = list_notes(&vault.root, &watch_config);
    info!(note_count = notes.len(), "Initial vault scan");
    for path in &notes {
        if let Err(e) = pipeline.index_note(path).await {
            warn!(path = %path, error = %e, "Initial indexing failed for note");
        }
        batcher.mark_dirty(path);
    }
    batcher.flush_now().await;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    batcher.flush_now().await;
    batcher_task.abort();
    digest_task.abort();
    Ok(())
}
