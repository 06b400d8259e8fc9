//! OS-level vault watcher.
//!
//! Thin adapter from `notify` to [`RawNotification`]s. The notify
//! callback runs on the watcher's own thread, so events are bridged into
//! the runtime through an unbounded channel and drained by a forwarding
//! task that feeds the stabilizer. All debouncing and filtering lives in
//! the stabilizer; this layer only translates event kinds.

use std::path::Path;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{info, trace, warn};

use vellum_core::{Error, Result};

use crate::notification::{RawNotification, RawNotificationKind};
use crate::stabilizer::WatchStabilizer;

/// Recursive watcher over the vault root. Watching stops when the value
/// is dropped.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    forward: tokio::task::JoinHandle<()>,
}

fn raw_kind(kind: &EventKind) -> Option<RawNotificationKind> {
    match kind {
        EventKind::Create(_) => Some(RawNotificationKind::Created),
        // Renames surface as Modify(Name); the stabilizer resolves the
        // old path to a delete when the read fails.
        EventKind::Modify(_) => Some(RawNotificationKind::Modified),
        EventKind::Remove(_) => Some(RawNotificationKind::Deleted),
        _ => None,
    }
}

impl VaultWatcher {
    /// Start watching `vault_root` recursively, feeding `stabilizer`.
    /// Must be called from within a tokio runtime.
    pub fn start(vault_root: &Path, stabilizer: WatchStabilizer) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<RawNotification>();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "Watcher error");
                    return;
                }
            };
            let Some(kind) = raw_kind(&event.kind) else {
                return;
            };
            for path in event.paths {
                // Receiver gone means shutdown; nothing to do here.
                let _ = tx.send(RawNotification::now(kind, path));
            }
        })
        .map_err(|e| Error::Internal(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(vault_root, RecursiveMode::Recursive)
            .map_err(|e| Error::Internal(format!("failed to watch vault: {e}")))?;
        info!(root = %vault_root.display(), "Vault watcher started");

        let forward = tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                trace!(path = %raw.path.display(), kind = ?raw.kind, "Raw notification");
                stabilizer.notify(raw);
            }
        });

        Ok(Self {
            _watcher: watcher,
            forward,
        })
    }
}

impl Drop for VaultWatcher {
    fn drop(&mut self) {
        self.forward.abort();
    }
}
