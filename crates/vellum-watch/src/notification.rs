//! Raw filesystem notification model.
//!
//! This is the untrusted input side of the watch subsystem: one
//! notification per OS-level event, bursts and partial writes included.
//! The stabilizer turns these into note events.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// What the OS reported happened to the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawNotificationKind {
    Created,
    Modified,
    Deleted,
}

/// A single raw filesystem notification.
#[derive(Debug, Clone)]
pub struct RawNotification {
    pub kind: RawNotificationKind,
    /// Path as reported by the watcher, typically absolute.
    pub path: PathBuf,
    pub timestamp: DateTime<Utc>,
}

impl RawNotification {
    /// Construct a notification timestamped now.
    pub fn now(kind: RawNotificationKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Utc::now(),
        }
    }
}
