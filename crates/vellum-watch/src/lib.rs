//! Filesystem watching for vellum: the raw notification model, the
//! per-path change stabilizer, and the OS-level watcher adapter.

pub mod notification;
pub mod stabilizer;
pub mod watcher;

pub use notification::{RawNotification, RawNotificationKind};
pub use stabilizer::WatchStabilizer;
pub use watcher::VaultWatcher;
