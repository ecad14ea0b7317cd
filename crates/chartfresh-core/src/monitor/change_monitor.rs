//! Per-resource pollers that turn snapshot differences into debounced
//! change events.
//!
//! Each watched resource gets its own task. The first successful poll is a
//! baseline. After that every poll (timer tick or native wake-up) compares
//! the observed snapshot with the last committed one; any difference starts
//! or resets a settle timer of `debounce`. When the timer fires, the settled
//! snapshot is committed and, if it differs from the previous commit, one
//! `FileChangeEvent` goes to the resource's listeners and to global listeners.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chartfresh_config::ChartType;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::monitor::snapshot::SnapshotProvider;
use crate::monitor::types::{FileChangeEvent, ResourceId, ResourceSnapshot, diff_snapshots};
use crate::monitor::watcher::NativeWakeups;
use crate::subscription::{Broadcaster, Subscription};

pub type ChangeSubscription = Subscription<FileChangeEvent>;

type SharedSnapshot = Arc<Mutex<Option<ResourceSnapshot>>>;

/// Timing for one watched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSpec {
    pub poll_interval: Duration,
    pub debounce: Duration,
}

impl WatchSpec {
    pub fn from_millis(poll_interval_ms: u64, debounce_ms: u64) -> Self {
        Self {
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
            debounce: Duration::from_millis(debounce_ms),
        }
    }
}

struct WatchEntry {
    subscribed_charts: HashSet<ChartType>,
    spec: WatchSpec,
    last_snapshot: SharedSnapshot,
    wake: Arc<Notify>,
    cancel: CancellationToken,
}

struct MonitorInner {
    provider: Arc<dyn SnapshotProvider>,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<ResourceId, WatchEntry>>,
    listeners: Broadcaster<ResourceId, FileChangeEvent>,
    native: Mutex<Option<Arc<NativeWakeups>>>,
    shutdown: CancellationToken,
}

/// Cloneable handle to the change monitor.
#[derive(Clone)]
pub struct ChangeMonitor {
    inner: Arc<MonitorInner>,
}

impl ChangeMonitor {
    pub fn new(provider: Arc<dyn SnapshotProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                provider,
                clock,
                entries: Mutex::new(HashMap::new()),
                listeners: Broadcaster::new(),
                native: Mutex::new(None),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<ResourceId, WatchEntry>> {
        self.inner.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn native(&self) -> Option<Arc<NativeWakeups>> {
        self.inner
            .native
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Use native file notifications to wake pollers early.
    ///
    /// Returns false when the platform watcher is unavailable; polling
    /// continues either way.
    pub fn enable_native_wakeups(&self) -> bool {
        if self.native().is_some() {
            return true;
        }
        let Some(native) = NativeWakeups::new() else {
            return false;
        };
        let native = Arc::new(native);
        for (resource, entry) in self.entries().iter() {
            native.register(resource.as_path(), Arc::clone(&entry.wake));
        }
        *self.inner.native.lock().unwrap_or_else(|e| e.into_inner()) = Some(native);
        true
    }

    /// Subscribe `chart` to changes of `resource`.
    ///
    /// The first registration of a resource starts its poller with `spec`;
    /// later registrations only add the chart. Must be called from within a
    /// tokio runtime.
    pub fn watch(&self, resource: ResourceId, chart: ChartType, spec: WatchSpec) {
        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(&resource) {
            entry.subscribed_charts.insert(chart);
            return;
        }

        let entry = WatchEntry {
            subscribed_charts: HashSet::from([chart.clone()]),
            spec,
            last_snapshot: Arc::new(Mutex::new(None)),
            wake: Arc::new(Notify::new()),
            cancel: self.inner.shutdown.child_token(),
        };

        if let Some(native) = self.native() {
            native.register(resource.as_path(), Arc::clone(&entry.wake));
        }

        let poller = Poller {
            resource: resource.clone(),
            provider: Arc::clone(&self.inner.provider),
            clock: Arc::clone(&self.inner.clock),
            listeners: self.inner.listeners.clone(),
            committed: Arc::clone(&entry.last_snapshot),
            spec,
            wake: Arc::clone(&entry.wake),
            cancel: entry.cancel.clone(),
        };
        tokio::spawn(poller.run());

        info!(
            event = "core.monitor.watch_started",
            resource = %resource,
            chart = %chart,
            poll_interval_ms = spec.poll_interval.as_millis() as u64,
            debounce_ms = spec.debounce.as_millis() as u64,
        );
        entries.insert(resource, entry);
    }

    /// Remove `chart` from `resource`. The poller stops when the last chart
    /// leaves. Returns false when the chart was not watching the resource.
    pub fn unwatch(&self, resource: &ResourceId, chart: &ChartType) -> bool {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(resource) else {
            return false;
        };
        if !entry.subscribed_charts.remove(chart) {
            return false;
        }
        if entry.subscribed_charts.is_empty()
            && let Some(entry) = entries.remove(resource)
        {
            entry.cancel.cancel();
            if let Some(native) = self.native() {
                native.unregister(resource.as_path());
            }
            info!(event = "core.monitor.watch_stopped", resource = %resource);
        }
        true
    }

    pub fn subscribe(&self, resource: ResourceId) -> ChangeSubscription {
        self.inner.listeners.subscribe(resource)
    }

    pub fn subscribe_all(&self) -> ChangeSubscription {
        self.inner.listeners.subscribe_all()
    }

    /// Charts subscribed to `resource`, sorted.
    pub fn charts_for(&self, resource: &ResourceId) -> Vec<ChartType> {
        let entries = self.entries();
        let mut charts: Vec<ChartType> = entries
            .get(resource)
            .map(|e| e.subscribed_charts.iter().cloned().collect())
            .unwrap_or_default();
        charts.sort();
        charts
    }

    pub fn watched_resources(&self) -> Vec<ResourceId> {
        let mut resources: Vec<ResourceId> = self.entries().keys().cloned().collect();
        resources.sort();
        resources
    }

    pub fn watch_spec(&self, resource: &ResourceId) -> Option<WatchSpec> {
        self.entries().get(resource).map(|e| e.spec)
    }

    /// Last committed snapshot; `None` before the baseline or while the
    /// resource is absent.
    pub fn last_snapshot(&self, resource: &ResourceId) -> Option<ResourceSnapshot> {
        self.entries()
            .get(resource)
            .and_then(|e| e.last_snapshot.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    /// Stop every poller. Watch registrations are kept but inert.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        info!(event = "core.monitor.shutdown_completed");
    }
}

struct PendingChange {
    observed: Option<ResourceSnapshot>,
    deadline: Instant,
}

struct Poller {
    resource: ResourceId,
    provider: Arc<dyn SnapshotProvider>,
    clock: Arc<dyn Clock>,
    listeners: Broadcaster<ResourceId, FileChangeEvent>,
    committed: SharedSnapshot,
    spec: WatchSpec,
    wake: Arc<Notify>,
    cancel: CancellationToken,
}

impl Poller {
    async fn run(self) {
        let mut ticker = tokio::time::interval(self.spec.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut baseline_taken = false;
        let mut pending: Option<PendingChange> = None;

        loop {
            let settle_at = pending.as_ref().map(|p| p.deadline);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep_until(settle_at.unwrap_or_else(Instant::now)), if settle_at.is_some() => {
                    if let Some(change) = pending.take() {
                        self.settle(change);
                    }
                }
                _ = ticker.tick() => {
                    self.observe(&mut baseline_taken, &mut pending).await;
                }
                _ = self.wake.notified() => {
                    self.observe(&mut baseline_taken, &mut pending).await;
                }
            }
        }

        debug!(event = "core.monitor.poller_stopped", resource = %self.resource);
    }

    async fn observe(&self, baseline_taken: &mut bool, pending: &mut Option<PendingChange>) {
        let observed = match self.provider.snapshot(&self.resource).await {
            Ok(snapshot) => snapshot.into_present(),
            Err(e) => {
                warn!(
                    event = "core.monitor.snapshot_failed",
                    resource = %self.resource,
                    error = %e,
                );
                if !*baseline_taken {
                    return;
                }
                None
            }
        };

        if !*baseline_taken {
            *self.committed.lock().unwrap_or_else(|e| e.into_inner()) = observed;
            *baseline_taken = true;
            debug!(event = "core.monitor.baseline_recorded", resource = %self.resource);
            return;
        }

        let differs = match pending.as_ref() {
            Some(p) => diff_snapshots(p.observed.as_ref(), observed.as_ref()).is_some(),
            None => {
                let committed = self.committed.lock().unwrap_or_else(|e| e.into_inner());
                diff_snapshots(committed.as_ref(), observed.as_ref()).is_some()
            }
        };

        if differs {
            *pending = Some(PendingChange {
                observed,
                deadline: Instant::now() + self.spec.debounce,
            });
            debug!(event = "core.monitor.change_pending", resource = %self.resource);
        }
    }

    fn settle(&self, change: PendingChange) {
        let change_type = {
            let mut committed = self.committed.lock().unwrap_or_else(|e| e.into_inner());
            let change_type = diff_snapshots(committed.as_ref(), change.observed.as_ref());
            *committed = change.observed;
            change_type
        };

        // A burst that ended where it started is not a change.
        let Some(change_type) = change_type else {
            return;
        };

        let event = FileChangeEvent {
            resource_id: self.resource.clone(),
            change_type,
            timestamp: self.clock.now(),
        };
        let delivered = self.listeners.publish(&self.resource, event);
        info!(
            event = "core.monitor.change_emitted",
            resource = %self.resource,
            change_type = %change_type,
            delivered = delivered,
        );
    }
}
