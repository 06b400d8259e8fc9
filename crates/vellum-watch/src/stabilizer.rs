//! Per-path change stabilization.
//!
//! Editors do not save atomically: a single user-visible save can arrive
//! as half a dozen notifications, some of them observing a truncated
//! file mid-write. The stabilizer collapses each burst into one
//! trustworthy event per logical change:
//!
//! - every `Created`/`Modified` notification (re)starts a debounce
//!   window for its path;
//! - when the window elapses, the content is fingerprinted twice with a
//!   short gap between the reads — if the fingerprints agree the content
//!   is stable and `NoteEvent::Changed` is published, otherwise the
//!   write is still in flight and the debounce restarts;
//! - `Deleted` cancels any pending timer and publishes
//!   `NoteEvent::Deleted` immediately, a missing file needs no debounce;
//! - a read failure during the stability check means the file vanished
//!   between notifications and is treated as a delete, not an error.
//!
//! Paths outside the vault root, with unrecognized extensions, or inside
//! excluded folders are dropped without an event.
//!
//! Timers are real task handles stored in per-path state and aborted on
//! supersession; a generation counter closes the race between an abort
//! and a timer that is already past its last await point.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use vellum_core::{validate_vault_path, EventBus, Fingerprint, NoteEvent, WatchConfig};

use crate::notification::{RawNotification, RawNotificationKind};

struct PendingChange {
    generation: u64,
    timer: JoinHandle<()>,
}

struct StabilizerInner {
    vault_root: PathBuf,
    config: WatchConfig,
    bus: EventBus,
    pending: Mutex<HashMap<String, PendingChange>>,
    next_generation: std::sync::atomic::AtomicU64,
}

/// Turns raw filesystem notifications into stabilized [`NoteEvent`]s.
///
/// Cloning is cheap; all clones share the pending-change table.
#[derive(Clone)]
pub struct WatchStabilizer {
    inner: Arc<StabilizerInner>,
}

impl WatchStabilizer {
    pub fn new(vault_root: PathBuf, config: WatchConfig, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(StabilizerInner {
                vault_root,
                config,
                bus,
                pending: Mutex::new(HashMap::new()),
                next_generation: std::sync::atomic::AtomicU64::new(0),
            }),
        }
    }

    /// Feed one raw notification into the state machine. Non-blocking;
    /// must be called from within a tokio runtime.
    pub fn notify(&self, raw: RawNotification) {
        let Some(rel) = self.inner.note_path(&raw.path) else {
            trace!(path = %raw.path.display(), "Ignoring non-vault notification");
            return;
        };
        match raw.kind {
            RawNotificationKind::Created | RawNotificationKind::Modified => {
                self.inner.clone().schedule(rel);
            }
            RawNotificationKind::Deleted => {
                self.inner.cancel(&rel);
                info!(note_path = %rel, "Note deleted");
                self.inner.bus.publish(NoteEvent::Deleted { path: rel });
            }
        }
    }

    /// Number of paths with an in-flight debounce or stability check.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().expect("pending table poisoned").len()
    }
}

impl StabilizerInner {
    /// Vault-relative path for a notification worth reacting to, or
    /// `None` if it should be dropped.
    fn note_path(&self, path: &Path) -> Option<String> {
        let rel = validate_vault_path(path, &self.vault_root).ok()?;
        let ext = rel.extension()?.to_str()?.to_lowercase();
        if !self.config.note_extensions.contains(&ext) {
            return None;
        }
        let excluded = rel.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|name| self.config.excluded_folders.iter().any(|f| f == name))
        });
        if excluded {
            return None;
        }
        Some(rel.to_string_lossy().into_owned())
    }

    /// (Re)start the debounce timer for `path`, superseding any pending
    /// one.
    fn schedule(self: Arc<Self>, path: String) {
        let generation = self
            .next_generation
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let timer = tokio::spawn({
            let inner = self.clone();
            let path = path.clone();
            async move { inner.stability_task(path, generation).await }
        });

        let mut pending = self.pending.lock().expect("pending table poisoned");
        if let Some(previous) = pending.insert(path.clone(), PendingChange { generation, timer }) {
            previous.timer.abort();
            trace!(note_path = %path, "Debounce window reset");
        }
    }

    /// Abort and drop any pending timer for `path`.
    fn cancel(&self, path: &str) {
        let mut pending = self.pending.lock().expect("pending table poisoned");
        if let Some(change) = pending.remove(path) {
            change.timer.abort();
            debug!(note_path = %path, "Pending change cancelled by delete");
        }
    }

    /// True iff this timer still owns the path's pending entry; removes
    /// the entry when it does. A superseded timer must emit nothing.
    fn take_if_current(&self, path: &str, generation: u64) -> bool {
        let mut pending = self.pending.lock().expect("pending table poisoned");
        match pending.get(path) {
            Some(change) if change.generation == generation => {
                pending.remove(path);
                true
            }
            _ => false,
        }
    }

    async fn read_fingerprint(&self, path: &str) -> Option<Fingerprint> {
        let abs = self.vault_root.join(path);
        tokio::fs::read(&abs).await.ok().map(|bytes| Fingerprint::of_bytes(&bytes))
    }

    /// The timer body: debounce, then two-read stability check, looping
    /// back to the debounce on mid-write reads.
    async fn stability_task(self: Arc<Self>, path: String, generation: u64) {
        loop {
            tokio::time::sleep(self.config.debounce).await;

            let Some(first) = self.read_fingerprint(&path).await else {
                if self.take_if_current(&path, generation) {
                    info!(note_path = %path, "Note vanished during stability check");
                    self.bus.publish(NoteEvent::Deleted { path });
                }
                return;
            };

            tokio::time::sleep(self.config.stability_interval).await;

            let Some(second) = self.read_fingerprint(&path).await else {
                if self.take_if_current(&path, generation) {
                    info!(note_path = %path, "Note vanished during stability check");
                    self.bus.publish(NoteEvent::Deleted { path });
                }
                return;
            };

            if first == second {
                if self.take_if_current(&path, generation) {
                    info!(
                        note_path = %path,
                        fingerprint = %first,
                        "Note change stabilized"
                    );
                    self.bus.publish(NoteEvent::Changed {
                        path,
                        fingerprint: first,
                    });
                }
                return;
            }

            debug!(
                note_path = %path,
                "Mid-write read detected, restarting debounce"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::fs;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;
    use vellum_core::{NoteEventHandler, NoteEventKind, Result};

    struct Recorder {
        seen: Arc<AsyncMutex<Vec<NoteEvent>>>,
    }

    #[async_trait]
    impl NoteEventHandler for Recorder {
        async fn handle(&self, event: NoteEvent) -> Result<()> {
            self.seen.lock().await.push(event);
            Ok(())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        stabilizer: WatchStabilizer,
        seen: Arc<AsyncMutex<Vec<NoteEvent>>>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let config = WatchConfig {
            debounce: Duration::from_millis(30),
            stability_interval: Duration::from_millis(20),
            ..WatchConfig::default()
        };
        let bus = EventBus::new();
        let seen = Arc::new(AsyncMutex::new(Vec::new()));
        // Dropping the subscription does not unsubscribe.
        let _ = bus.subscribe(
            "recorder",
            &[NoteEventKind::Changed, NoteEventKind::Deleted],
            Arc::new(Recorder { seen: seen.clone() }),
        );
        Fixture {
            _dir: dir,
            stabilizer: WatchStabilizer::new(root.clone(), config, bus),
            root,
            seen,
        }
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn modified(root: &Path, rel: &str) -> RawNotification {
        RawNotification::now(RawNotificationKind::Modified, root.join(rel))
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(300)).await;
    }

    #[tokio::test]
    async fn test_burst_collapses_to_single_changed() {
        let fx = fixture();
        write(&fx.root, "00-inbox/x.md", "# A\ntext");

        for _ in 0..5 {
            fx.stabilizer.notify(modified(&fx.root, "00-inbox/x.md"));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        settle().await;

        let events = fx.seen.lock().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            NoteEvent::Changed { path, fingerprint }
                if path == "00-inbox/x.md" && *fingerprint == Fingerprint::of_text("# A\ntext")
        ));
        assert_eq!(fx.stabilizer.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_cancels_pending_timer() {
        let fx = fixture();
        write(&fx.root, "x.md", "body");

        fx.stabilizer.notify(modified(&fx.root, "x.md"));
        assert_eq!(fx.stabilizer.pending_count(), 1);

        fs::remove_file(fx.root.join("x.md")).unwrap();
        fx.stabilizer
            .notify(RawNotification::now(RawNotificationKind::Deleted, fx.root.join("x.md")));
        assert_eq!(fx.stabilizer.pending_count(), 0);
        settle().await;

        let events = fx.seen.lock().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], NoteEvent::Deleted { path } if path == "x.md"));
    }

    #[tokio::test]
    async fn test_vanished_file_emits_deleted() {
        let fx = fixture();
        write(&fx.root, "x.md", "body");
        fx.stabilizer.notify(modified(&fx.root, "x.md"));

        // Gone before the debounce window elapses, no Deleted raw event.
        fs::remove_file(fx.root.join("x.md")).unwrap();
        settle().await;

        let events = fx.seen.lock().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], NoteEvent::Deleted { path } if path == "x.md"));
    }

    #[tokio::test]
    async fn test_sequential_edits_emit_sequential_events() {
        let fx = fixture();
        write(&fx.root, "x.md", "first");
        fx.stabilizer.notify(modified(&fx.root, "x.md"));
        settle().await;

        write(&fx.root, "x.md", "second");
        fx.stabilizer.notify(modified(&fx.root, "x.md"));
        settle().await;

        let events = fx.seen.lock().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            NoteEvent::Changed { fingerprint, .. }
                if *fingerprint == Fingerprint::of_text("second")
        ));
    }

    #[tokio::test]
    async fn test_ignores_unrecognized_extension() {
        let fx = fixture();
        write(&fx.root, "image.png", "not a note");
        fx.stabilizer.notify(modified(&fx.root, "image.png"));
        settle().await;

        assert!(fx.seen.lock().await.is_empty());
        assert_eq!(fx.stabilizer.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_ignores_excluded_folders() {
        let fx = fixture();
        write(&fx.root, ".obsidian/workspace.md", "internal");
        write(&fx.root, ".trash/old.md", "trashed");
        fx.stabilizer.notify(modified(&fx.root, ".obsidian/workspace.md"));
        fx.stabilizer.notify(modified(&fx.root, ".trash/old.md"));
        settle().await;

        assert!(fx.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_ignores_paths_outside_root() {
        let fx = fixture();
        fx.stabilizer
            .notify(RawNotification::now(RawNotificationKind::Modified, "/etc/passwd.md"));
        fx.stabilizer
            .notify(modified(&fx.root, "../escape.md"));
        settle().await;

        assert!(fx.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_of_unknown_path_still_emits_deleted() {
        let fx = fixture();
        fx.stabilizer
            .notify(RawNotification::now(RawNotificationKind::Deleted, fx.root.join("never.md")));
        settle().await;

        let events = fx.seen.lock().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], NoteEvent::Deleted { path } if path == "never.md"));
    }

    #[tokio::test]
    async fn test_case_insensitive_extension() {
        let fx = fixture();
        write(&fx.root, "X.MD", "body");
        fx.stabilizer.notify(modified(&fx.root, "X.MD"));
        settle().await;

        let events = fx.seen.lock().await;
        assert_eq!(events.len(), 1);
    }
}
