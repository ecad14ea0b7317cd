//! Native filesystem notifications as a wake-up source for pollers.
//!
//! Uses platform-native file watching (FSEvents on macOS, inotify on Linux).
//! An event for a watched file only wakes that resource's poller early; the
//! poller still snapshots, diffs, and debounces, so the change contract is
//! the same whether or not native events are available.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::Notify;

type Targets = Arc<Mutex<HashMap<PathBuf, Arc<Notify>>>>;

pub struct NativeWakeups {
    /// The underlying notify watcher. Must be kept alive.
    watcher: Mutex<RecommendedWatcher>,
    targets: Targets,
    watched_dirs: Mutex<HashSet<PathBuf>>,
}

impl NativeWakeups {
    /// Create the native watcher.
    ///
    /// Returns `None` if the platform watcher cannot be created; callers
    /// fall back to timer polling only.
    pub fn new() -> Option<Self> {
        let targets: Targets = Arc::new(Mutex::new(HashMap::new()));
        let handler_targets = Arc::clone(&targets);

        let watcher = match notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if !Self::is_relevant_event(&event) {
                        return;
                    }
                    let targets = handler_targets.lock().unwrap_or_else(|e| e.into_inner());
                    for path in &event.paths {
                        if let Some(wake) = targets.get(path) {
                            tracing::debug!(
                                event = "core.monitor.native_event_detected",
                                kind = ?event.kind,
                                path = %path.display()
                            );
                            wake.notify_one();
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(event = "core.monitor.native_event_error", error = %e);
                }
            }
        }) {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(
                    event = "core.monitor.native_create_failed",
                    error = %e,
                    "File watcher unavailable - falling back to polling"
                );
                return None;
            }
        };

        Some(Self {
            watcher: Mutex::new(watcher),
            targets,
            watched_dirs: Mutex::new(HashSet::new()),
        })
    }

    /// Wake `wake` whenever `path` is created, modified, or removed.
    ///
    /// Watches the parent directory so files that do not exist yet are
    /// still covered. Returns false when the directory cannot be watched.
    pub fn register(&self, path: &Path, wake: Arc<Notify>) -> bool {
        // A bare file name has an empty parent; it lives in the working directory.
        let dir = path
            .parent()
            .map(|d| if d.as_os_str().is_empty() { Path::new(".") } else { d })
            .filter(|d| d.is_dir());
        let Some(dir) = dir else {
            tracing::debug!(
                event = "core.monitor.native_dir_missing",
                path = %path.display()
            );
            return false;
        };

        {
            let mut dirs = self.watched_dirs.lock().unwrap_or_else(|e| e.into_inner());
            if !dirs.contains(dir) {
                let mut watcher = self.watcher.lock().unwrap_or_else(|e| e.into_inner());
                if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                    tracing::warn!(
                        event = "core.monitor.native_watch_failed",
                        path = %dir.display(),
                        error = %e,
                        "Cannot watch directory - falling back to polling"
                    );
                    return false;
                }
                dirs.insert(dir.to_path_buf());
            }
        }

        let mut targets = self.targets.lock().unwrap_or_else(|e| e.into_inner());
        targets.insert(path.to_path_buf(), Arc::clone(&wake));
        // Event paths may arrive canonicalized (e.g. /private/var on macOS).
        if let Ok(canonical) = dir.canonicalize()
            && let Some(name) = path.file_name()
        {
            targets.insert(canonical.join(name), wake);
        }

        tracing::info!(
            event = "core.monitor.native_watch_started",
            path = %path.display()
        );
        true
    }

    pub fn unregister(&self, path: &Path) {
        let mut targets = self.targets.lock().unwrap_or_else(|e| e.into_inner());
        targets.remove(path);
        if let (Some(dir), Some(name)) = (path.parent(), path.file_name())
            && let Ok(canonical) = dir.canonicalize()
        {
            targets.remove(&canonical.join(name));
        }
    }

    /// Only create, modify, and remove events can change a snapshot.
    fn is_relevant_event(event: &Event) -> bool {
        matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};

    fn make_event(kind: EventKind, paths: Vec<PathBuf>) -> Event {
        Event {
            kind,
            paths,
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_relevant_kinds() {
        let path = vec![PathBuf::from("/data/prices.csv")];
        assert!(NativeWakeups::is_relevant_event(&make_event(
            EventKind::Create(CreateKind::File),
            path.clone()
        )));
        assert!(NativeWakeups::is_relevant_event(&make_event(
            EventKind::Modify(ModifyKind::Data(notify::event::DataChange::Content)),
            path.clone()
        )));
        assert!(NativeWakeups::is_relevant_event(&make_event(
            EventKind::Remove(RemoveKind::File),
            path.clone()
        )));
        assert!(!NativeWakeups::is_relevant_event(&make_event(
            EventKind::Access(AccessKind::Read),
            path
        )));
    }

    #[test]
    fn test_register_missing_dir_fails() {
        let Some(wakeups) = NativeWakeups::new() else {
            return;
        };
        assert!(!wakeups.register(
            Path::new("/nonexistent/dir/prices.csv"),
            Arc::new(Notify::new())
        ));
    }

    #[test]
    fn test_register_bare_file_name_uses_working_dir() {
        let Some(wakeups) = NativeWakeups::new() else {
            return;
        };
        assert!(wakeups.register(Path::new("prices.csv"), Arc::new(Notify::new())));
        let dirs = wakeups.watched_dirs.lock().unwrap();
        assert!(dirs.contains(Path::new(".")));
    }

    #[tokio::test]
    async fn test_write_wakes_registered_target() {
        let Some(wakeups) = NativeWakeups::new() else {
            return;
        };
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("holdings.csv");
        let wake = Arc::new(Notify::new());
        assert!(wakeups.register(&path, Arc::clone(&wake)));

        std::fs::write(&path, "symbol,qty\nAAPL,10\n").unwrap();

        let woke =
            tokio::time::timeout(std::time::Duration::from_secs(2), wake.notified()).await;
        assert!(woke.is_ok(), "native event should wake the target");
    }
}
