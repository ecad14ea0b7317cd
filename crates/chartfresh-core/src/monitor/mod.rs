//! Change detection for file-backed sources.

pub mod change_monitor;
pub mod snapshot;
pub mod types;
pub mod watcher;

pub use change_monitor::{ChangeMonitor, ChangeSubscription, WatchSpec};
pub use snapshot::{FsSnapshotProvider, SnapshotError, SnapshotProvider};
pub use types::{ChangeType, FileChangeEvent, ResourceId, ResourceSnapshot, diff_snapshots};
pub use watcher::NativeWakeups;
