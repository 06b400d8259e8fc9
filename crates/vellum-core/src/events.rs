//! Typed note-lifecycle events and the in-process event bus.
//!
//! The bus decouples the watch stabilizer from its downstream consumers
//! (indexing pipeline, duplicate detector, note suggester, graph
//! batcher). Dispatch is fire-and-forget: each subscriber owns an
//! unbounded queue drained by its own task, so a failing or slow handler
//! never blocks the publisher or other subscribers, and every registered
//! subscriber eventually sees every event of its kinds. Events for the
//! same path reach each subscriber in publish order; nothing is replayed
//! to late subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::fingerprint::Fingerprint;

/// A note-lifecycle event, published exactly once per logical change —
/// never per raw filesystem notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NoteEvent {
    /// Stabilized content change (create or modify).
    Changed {
        path: String,
        fingerprint: Fingerprint,
    },
    /// The note file is gone.
    Deleted { path: String },
    /// The pipeline finished (re)indexing a note.
    Indexed { path: String, chunk_count: usize },
    /// The pipeline removed a deleted note's chunks from the store.
    Removed { path: String },
}

impl NoteEvent {
    /// The vault-relative path this event concerns.
    pub fn path(&self) -> &str {
        match self {
            NoteEvent::Changed { path, .. }
            | NoteEvent::Deleted { path }
            | NoteEvent::Indexed { path, .. }
            | NoteEvent::Removed { path } => path,
        }
    }

    pub fn kind(&self) -> NoteEventKind {
        match self {
            NoteEvent::Changed { .. } => NoteEventKind::Changed,
            NoteEvent::Deleted { .. } => NoteEventKind::Deleted,
            NoteEvent::Indexed { .. } => NoteEventKind::Indexed,
            NoteEvent::Removed { .. } => NoteEventKind::Removed,
        }
    }
}

/// Event variant discriminant, used for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteEventKind {
    Changed,
    Deleted,
    Indexed,
    Removed,
}

/// A subscriber's event handler. Errors are logged by the dispatch task
/// and never propagate to the publisher or to other subscribers.
#[async_trait]
pub trait NoteEventHandler: Send + Sync {
    async fn handle(&self, event: NoteEvent) -> Result<()>;
}

struct SubscriberEntry {
    name: String,
    kinds: Vec<NoteEventKind>,
    tx: mpsc::UnboundedSender<NoteEvent>,
}

struct BusInner {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, SubscriberEntry>>,
}

/// In-process publish/subscribe bus for [`NoteEvent`]s.
///
/// Cloning is cheap; all clones share the subscriber set.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                next_id: AtomicU64::new(0),
                subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register `handler` for the given event kinds. Spawns a dispatch
    /// task that drains the subscriber's queue; the returned
    /// [`Subscription`] is the capability to unsubscribe.
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        kinds: &[NoteEventKind],
        handler: Arc<dyn NoteEventHandler>,
    ) -> Subscription {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<NoteEvent>();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut subs = self.inner.subscribers.lock().expect("subscriber map poisoned");
            subs.insert(
                id,
                SubscriberEntry {
                    name: name.clone(),
                    kinds: kinds.to_vec(),
                    tx,
                },
            );
        }
        debug!(subscriber = %name, ?kinds, "Subscriber registered");

        let task_name = name.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let kind = event.kind();
                if let Err(e) = handler.handle(event).await {
                    warn!(
                        subscriber = %task_name,
                        ?kind,
                        error = %e,
                        "Subscriber handler failed"
                    );
                }
            }
            debug!(subscriber = %task_name, "Subscriber dispatch task ended");
        });

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every subscriber registered for its kind.
    ///
    /// Non-blocking: the per-subscriber queues are unbounded, so a slow
    /// consumer lags behind but never stalls the publisher and never
    /// misses an event. A send only fails once the dispatch task is gone.
    pub fn publish(&self, event: NoteEvent) {
        let kind = event.kind();
        let subs = self.inner.subscribers.lock().expect("subscriber map poisoned");
        for entry in subs.values() {
            if !entry.kinds.contains(&kind) {
                continue;
            }
            if entry.tx.send(event.clone()).is_err() {
                warn!(
                    subscriber = %entry.name,
                    ?kind,
                    "Subscriber queue closed, event not delivered"
                );
            }
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().expect("subscriber map poisoned").len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability to remove a subscriber from the bus. Dropping the
/// subscription without calling [`Subscription::unsubscribe`] leaves the
/// subscriber running for the life of the bus.
pub struct Subscription {
    id: u64,
    inner: std::sync::Weak<BusInner>,
}

impl Subscription {
    /// Remove the subscriber. Its queue closes and the dispatch task
    /// exits after draining events already enqueued.
    pub fn unsubscribe(self) {
        if let Some(inner) = self.inner.upgrade() {
            let mut subs = inner.subscribers.lock().expect("subscriber map poisoned");
            subs.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::time::Duration;
    use tokio::sync::Mutex as AsyncMutex;

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

    struct AlwaysFails;

    #[async_trait]
    impl NoteEventHandler for AlwaysFails {
        async fn handle(&self, _event: NoteEvent) -> Result<()> {
            Err(Error::Internal("handler exploded".to_string()))
        }
    }

    fn changed(path: &str, body: &str) -> NoteEvent {
        NoteEvent::Changed {
            path: path.to_string(),
            fingerprint: Fingerprint::of_text(body),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = EventBus::new();
        let seen = Arc::new(AsyncMutex::new(Vec::new()));
        let _sub = bus.subscribe(
            "recorder",
            &[NoteEventKind::Changed],
            Arc::new(Recorder { seen: seen.clone() }),
        );

        bus.publish(changed("a.md", "one"));
        settle().await;

        let events = seen.lock().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path(), "a.md");
    }

    #[tokio::test]
    async fn test_kind_filtering() {
        let bus = EventBus::new();
        let seen = Arc::new(AsyncMutex::new(Vec::new()));
        let _sub = bus.subscribe(
            "deletes-only",
            &[NoteEventKind::Deleted],
            Arc::new(Recorder { seen: seen.clone() }),
        );

        bus.publish(changed("a.md", "one"));
        bus.publish(NoteEvent::Deleted {
            path: "a.md".to_string(),
        });
        settle().await;

        let events = seen.lock().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], NoteEvent::Deleted { .. }));
    }

    #[tokio::test]
    async fn test_failing_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let _bad = bus.subscribe("bad", &[NoteEventKind::Changed], Arc::new(AlwaysFails));
        let seen = Arc::new(AsyncMutex::new(Vec::new()));
        let _good = bus.subscribe(
            "good",
            &[NoteEventKind::Changed],
            Arc::new(Recorder { seen: seen.clone() }),
        );

        for i in 0..5 {
            bus.publish(changed("a.md", &format!("rev {i}")));
        }
        settle().await;

        assert_eq!(seen.lock().await.len(), 5);
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscriber() {
        let bus = EventBus::new();
        bus.publish(changed("a.md", "before"));

        let seen = Arc::new(AsyncMutex::new(Vec::new()));
        let _sub = bus.subscribe(
            "late",
            &[NoteEventKind::Changed],
            Arc::new(Recorder { seen: seen.clone() }),
        );
        settle().await;

        assert!(seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let seen = Arc::new(AsyncMutex::new(Vec::new()));
        let sub = bus.subscribe(
            "recorder",
            &[NoteEventKind::Changed],
            Arc::new(Recorder { seen: seen.clone() }),
        );
        assert_eq!(bus.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 0);

        bus.publish(changed("a.md", "after"));
        settle().await;
        assert!(seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_per_path_publish_order_preserved() {
        let bus = EventBus::new();
        let seen = Arc::new(AsyncMutex::new(Vec::new()));
        let _sub = bus.subscribe(
            "recorder",
            &[NoteEventKind::Changed],
            Arc::new(Recorder { seen: seen.clone() }),
        );

        for i in 0..10 {
            bus.publish(changed("a.md", &format!("rev {i}")));
        }
        settle().await;

        let events = seen.lock().await;
        let fingerprints: Vec<_> = events
            .iter()
            .map(|e| match e {
                NoteEvent::Changed { fingerprint, .. } => fingerprint.clone(),
                _ => unreachable!(),
            })
            .collect();
        let expected: Vec<_> = (0..10)
            .map(|i| Fingerprint::of_text(&format!("rev {i}")))
            .collect();
        assert_eq!(fingerprints, expected);
    }

    struct GatedRecorder {
        gate: Arc<AsyncMutex<()>>,
        seen: Arc<AsyncMutex<Vec<NoteEvent>>>,
    }

    #[async_trait]
    impl NoteEventHandler for GatedRecorder {
        async fn handle(&self, event: NoteEvent) -> Result<()> {
            let _open = self.gate.lock().await;
            self.seen.lock().await.push(event);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_subscriber_misses_nothing() {
        let bus = EventBus::new();
        let gate = Arc::new(AsyncMutex::new(()));
        let seen = Arc::new(AsyncMutex::new(Vec::new()));
        let _sub = bus.subscribe(
            "slow",
            &[NoteEventKind::Changed],
            Arc::new(GatedRecorder {
                gate: gate.clone(),
                seen: seen.clone(),
            }),
        );

        // Stall the dispatch task on its first event, then flood the bus.
        let stall = gate.lock().await;
        for i in 0..1000 {
            bus.publish(changed("a.md", &format!("rev {i}")));
        }
        drop(stall);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(seen.lock().await.len(), 1000);
    }

    #[tokio::test]
    async fn test_publish_with_no_subscribers_ok() {
        let bus = EventBus::new();
        bus.publish(changed("a.md", "one"));
    }
}
