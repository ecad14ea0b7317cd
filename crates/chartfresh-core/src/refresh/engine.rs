//! The refresh orchestrator.
//!
//! All mutable state (registry, rate windows, queue, in-flight set) lives in
//! one `EngineState` behind a `std::sync::Mutex`. Critical sections never
//! await; fetches run outside the lock and re-enter it to commit results.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chartfresh_config::{ChartType, FreshConfig, ServiceConfig, SourceDescriptor, SourceKind};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::errors::EngineError;
use crate::fetch::{FetchError, FetcherRegistry, ProgressReporter, RefreshProgress};
use crate::freshness::{
    DataSourceStatus, DataState, LastUpdateSource, RefreshCapability, age_hours, reevaluate,
};
use crate::monitor::{
    ChangeMonitor, ChangeType, FileChangeEvent, FsSnapshotProvider, SnapshotProvider,
};
use crate::ratelimit::{Admission, RateLimiter, RefreshQueue};
use crate::refresh::registry::{DependencyEntry, DependencyRegistry};
use crate::refresh::sweep;
use crate::refresh::types::{RefreshError, RefreshNotification, RefreshRequest, RefreshResult};
use crate::subscription::{Broadcaster, Subscription};

pub type RefreshSubscription = Subscription<RefreshNotification>;

type RefreshFuture<'a> = Pin<Box<dyn Future<Output = RefreshResult> + Send + 'a>>;

pub(crate) struct EngineState {
    pub(crate) registry: DependencyRegistry,
    pub(crate) limiter: RateLimiter,
    pub(crate) queue: RefreshQueue<RefreshRequest>,
    /// Charts with a running fetch. Mirrors `status.refreshing`.
    pub(crate) in_flight: HashSet<ChartType>,
}

impl EngineState {
    fn is_queued(&self, chart: &ChartType) -> bool {
        self.queue.iter().any(|r| &r.chart_type == chart)
    }

    fn set_refreshing(&mut self, chart: &ChartType, refreshing: bool) {
        if refreshing {
            self.in_flight.insert(chart.clone());
        } else {
            self.in_flight.remove(chart);
        }
        if let Some(entry) = self.registry.get_mut(chart) {
            entry.status.refreshing = refreshing;
        }
    }
}

struct EngineInner {
    state: Mutex<EngineState>,
    services: BTreeMap<String, ServiceConfig>,
    fetchers: FetcherRegistry,
    snapshots: Arc<dyn SnapshotProvider>,
    clock: Arc<dyn Clock>,
    monitor: ChangeMonitor,
    notifications: Broadcaster<ChartType, RefreshNotification>,
    fetch_timeout: Duration,
    sweep_interval: Duration,
    native_wakeups: bool,
    started: AtomicBool,
    shutdown: CancellationToken,
}

/// Builds a [`RefreshEngine`] with replaceable collaborators.
pub struct RefreshEngineBuilder {
    config: FreshConfig,
    fetchers: Option<FetcherRegistry>,
    snapshots: Option<Arc<dyn SnapshotProvider>>,
    clock: Option<Arc<dyn Clock>>,
    native_wakeups: bool,
}

impl RefreshEngineBuilder {
    pub fn fetchers(mut self, fetchers: FetcherRegistry) -> Self {
        self.fetchers = Some(fetchers);
        self
    }

    pub fn snapshot_provider(mut self, provider: Arc<dyn SnapshotProvider>) -> Self {
        self.snapshots = Some(provider);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Wake file pollers from native filesystem events (default: on).
    pub fn native_wakeups(mut self, enabled: bool) -> Self {
        self.native_wakeups = enabled;
        self
    }

    pub fn build(self) -> Result<RefreshEngine, EngineError> {
        self.config.validate()?;

        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let snapshots = self
            .snapshots
            .unwrap_or_else(|| Arc::new(FsSnapshotProvider));
        let fetchers = self
            .fetchers
            .unwrap_or_else(|| FetcherRegistry::from_config(&config));

        let state = EngineState {
            registry: DependencyRegistry::from_config(&config),
            limiter: RateLimiter::from_services(&config.services),
            queue: RefreshQueue::new(config.engine.max_concurrent_refresh()),
            in_flight: HashSet::new(),
        };

        Ok(RefreshEngine {
            inner: Arc::new(EngineInner {
                state: Mutex::new(state),
                services: config.services.clone(),
                fetchers,
                monitor: ChangeMonitor::new(Arc::clone(&snapshots), Arc::clone(&clock)),
                snapshots,
                clock,
                notifications: Broadcaster::new(),
                fetch_timeout: Duration::from_secs(config.engine.fetch_timeout_secs()),
                sweep_interval: Duration::from_secs(config.engine.sweep_interval_secs()),
                native_wakeups: self.native_wakeups,
                started: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
            }),
        })
    }
}

/// What `admit` decided for a request.
enum Admit {
    Run(RefreshRequest, SourceDescriptor),
    Done(RefreshResult),
}

#[derive(Debug, thiserror::Error)]
enum FetchFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Refresh timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// Cloneable handle to the orchestrator.
#[derive(Clone)]
pub struct RefreshEngine {
    inner: Arc<EngineInner>,
}

impl RefreshEngine {
    /// Engine with the built-in fetchers, filesystem snapshots, and the
    /// system clock.
    pub fn new(config: FreshConfig) -> Result<Self, EngineError> {
        Self::builder(config).build()
    }

    pub fn builder(config: FreshConfig) -> RefreshEngineBuilder {
        RefreshEngineBuilder {
            config,
            fetchers: None,
            snapshots: None,
            clock: None,
            native_wakeups: true,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.inner.clock.now()
    }

    pub fn monitor(&self) -> &ChangeMonitor {
        &self.inner.monitor
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Seed file-backed charts from their current snapshots, then start the
    /// change monitor, the change consumer, and the background sweep.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(&self) -> Result<(), EngineError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(EngineError::AlreadyStarted);
        }

        let watched = self.lock().registry.watched();
        info!(event = "core.engine.start_started", watched = watched.len());

        for (chart, resource, _) in &watched {
            match self.inner.snapshots.snapshot(resource).await {
                Ok(snapshot) => {
                    let Some(modified) = snapshot.into_present().and_then(|s| s.last_modified_at)
                    else {
                        continue;
                    };
                    let now = self.now();
                    let mut state = self.lock();
                    if let Some(entry) = state.registry.get_mut(chart)
                        && entry.status.last_updated_at().is_none()
                    {
                        let update_source = entry.update_source();
                        entry.status.mark_updated(modified, update_source);
                        reevaluate(&mut entry.status, &entry.policy, now);
                        debug!(
                            event = "core.engine.status_seeded",
                            chart = %chart,
                            status = %entry.status.status(),
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        event = "core.engine.seed_failed",
                        chart = %chart,
                        resource = %resource,
                        error = %e,
                    );
                }
            }
        }

        // Subscribe before the pollers exist so no settled change is missed.
        let mut changes = self.inner.monitor.subscribe_all();
        if self.inner.native_wakeups {
            self.inner.monitor.enable_native_wakeups();
        }
        for (chart, resource, spec) in watched {
            self.inner.monitor.watch(resource, chart, spec);
        }

        let engine = self.clone();
        let cancel = self.inner.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = changes.recv() => match event {
                        Some(event) => engine.handle_file_change(&event),
                        None => break,
                    },
                }
            }
            debug!(event = "core.engine.change_consumer_stopped");
        });

        tokio::spawn(sweep::run(
            self.clone(),
            self.inner.sweep_interval,
            self.inner.shutdown.clone(),
        ));

        info!(event = "core.engine.start_completed");
        Ok(())
    }

    /// Stop background tasks. Queued requests are failed through their
    /// completion channels; running fetches finish on their own.
    pub fn shutdown(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        self.inner.shutdown.cancel();
        self.inner.monitor.shutdown();

        let dropped = {
            let mut state = self.lock();
            let queued = state.queue.clear();
            queued
                .into_iter()
                .map(|request| {
                    let status = state
                        .registry
                        .get(&request.chart_type)
                        .map(|e| e.status.clone())
                        .unwrap_or_default();
                    (request, status)
                })
                .collect::<Vec<_>>()
        };
        for (mut request, status) in dropped {
            let result = RefreshResult::failed(
                status,
                None,
                RefreshError::failed("Engine shut down before the refresh ran", true),
                0,
            );
            request.complete(&result);
        }

        info!(event = "core.engine.shutdown_completed");
    }

    /// Current status of a chart, re-aged against the clock first.
    pub fn get_status(&self, chart: &ChartType) -> Option<DataSourceStatus> {
        let now = self.now();
        let mut state = self.lock();
        let entry = state.registry.get_mut(chart)?;
        reevaluate(&mut entry.status, &entry.policy, now);
        Some(entry.status.clone())
    }

    pub fn get_all_statuses(&self) -> BTreeMap<ChartType, DataSourceStatus> {
        let now = self.now();
        let mut state = self.lock();
        state
            .registry
            .iter_mut()
            .map(|entry| {
                reevaluate(&mut entry.status, &entry.policy, now);
                (entry.chart_type.clone(), entry.status.clone())
            })
            .collect()
    }

    pub fn get_capability(&self, chart: &ChartType) -> Option<RefreshCapability> {
        self.lock().registry.get(chart).map(|e| e.capability.clone())
    }

    /// Snapshot of a chart's full registry entry.
    pub fn entry(&self, chart: &ChartType) -> Option<DependencyEntry> {
        let now = self.now();
        let mut state = self.lock();
        let entry = state.registry.get_mut(chart)?;
        reevaluate(&mut entry.status, &entry.policy, now);
        Some(entry.clone())
    }

    pub fn chart_types(&self) -> Vec<ChartType> {
        self.lock()
            .registry
            .iter()
            .map(|e| e.chart_type.clone())
            .collect()
    }

    /// Charts currently fetching.
    pub fn in_flight(&self) -> BTreeSet<ChartType> {
        self.lock().in_flight.iter().cloned().collect()
    }

    pub fn queued_len(&self) -> usize {
        self.lock().queue.queued_len()
    }

    pub fn subscribe(&self, chart: ChartType) -> RefreshSubscription {
        self.inner.notifications.subscribe(chart)
    }

    pub fn subscribe_all(&self) -> RefreshSubscription {
        self.inner.notifications.subscribe_all()
    }

    /// Refresh one chart.
    ///
    /// Never fails at the API boundary: every outcome, including rejection
    /// and deferral, is a [`RefreshResult`]. A `REFRESH_QUEUED` result means
    /// the request will run later and report through its completion channel.
    ///
    /// An admitted fetch runs as its own task, so dropping the returned
    /// future does not abandon the fetch or leak its slot.
    pub async fn request_refresh(&self, request: RefreshRequest) -> RefreshResult {
        let (request, source) = match self.admit(request) {
            Admit::Run(request, source) => (request, source),
            Admit::Done(result) => return result,
        };

        let chart = request.chart_type.clone();
        let engine = self.clone();
        let handle = tokio::spawn(async move { engine.execute(request, source).await });
        match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!(event = "core.refresh.task_failed", chart = %chart, error = %e);
                self.release_aborted(&chart);
                RefreshResult::failed(
                    self.get_status(&chart).unwrap_or_default(),
                    None,
                    RefreshError::failed(format!("Refresh task aborted: {}", e), true),
                    0,
                )
            }
        }
    }

    /// Undo the admission of a refresh whose task died before committing.
    fn release_aborted(&self, chart: &ChartType) {
        {
            let mut state = self.lock();
            if !state.in_flight.contains(chart) {
                return;
            }
            state.set_refreshing(chart, false);
            state.queue.release();
        }
        self.dispatch_queued();
    }

    fn admit(&self, mut request: RefreshRequest) -> Admit {
        let chart = request.chart_type.clone();
        let now = self.now();
        let mut state = self.lock();

        let Some(entry) = state.registry.get_mut(&chart) else {
            return reject(
                request,
                RefreshResult::failed(
                    DataSourceStatus::missing(),
                    None,
                    RefreshError::unknown_chart(&chart),
                    0,
                ),
            );
        };
        reevaluate(&mut entry.status, &entry.policy, now);
        let source = entry.source.clone();
        let status = entry.status.clone();
        let capability = entry.capability.clone();
        let service = entry.rate_limited_service().map(str::to_string);
        let is_api = entry.source.kind == SourceKind::ApiService;

        let denied = |error: RefreshError| {
            RefreshResult::failed(status.clone(), Some(source.clone()), error, 0)
        };

        if self.inner.shutdown.is_cancelled() {
            return reject(
                request,
                denied(RefreshError::not_available("Refresh engine is shut down")),
            );
        }

        let queued = state.is_queued(&chart);
        if queued || state.in_flight.contains(&chart) {
            if !request.force || queued {
                debug!(event = "core.refresh.request_deduplicated", chart = %chart);
                return reject(request, denied(RefreshError::in_progress(&chart, queued)));
            }
            // Forced while running: wait for the running fetch, never overlap it.
            let priority = request.priority;
            let position = state.queue.push(request, priority);
            info!(
                event = "core.refresh.request_queued",
                chart = %chart,
                position = position,
                reason = "in_flight",
            );
            return Admit::Done(denied(RefreshError::queued(position)));
        }

        if !capability.can_refresh {
            return reject(request, denied(RefreshError::not_available(capability.reason)));
        }

        if is_api {
            let Some(service) = service.as_deref() else {
                return reject(
                    request,
                    denied(RefreshError::service_not_found("<unnamed>")),
                );
            };
            if !self.inner.services.contains_key(service) {
                return reject(request, denied(RefreshError::service_not_found(service)));
            }
            if !state.limiter.can_admit(service) {
                let wait = state.limiter.next_available_in(service);
                warn!(
                    event = "core.refresh.rate_limited",
                    chart = %chart,
                    service = service,
                    retry_after_ms = wait.as_millis() as u64,
                );
                return reject(request, denied(RefreshError::rate_limited(service, wait)));
            }
        }

        let priority = request.priority;
        match state.queue.enqueue(request, priority) {
            Admission::Queued { position } => {
                info!(
                    event = "core.refresh.request_queued",
                    chart = %chart,
                    position = position,
                    reason = "capacity",
                );
                Admit::Done(denied(RefreshError::queued(position)))
            }
            Admission::Execute(request) => {
                state.set_refreshing(&chart, true);
                if let Some(service) = service.as_deref() {
                    state.limiter.record_admission(service);
                }
                Admit::Run(request, source)
            }
        }
    }

    /// Run an admitted request to completion. Boxed because completions
    /// spawn further executions.
    fn execute(&self, mut request: RefreshRequest, source: SourceDescriptor) -> RefreshFuture<'_> {
        Box::pin(async move {
            let chart = request.chart_type.clone();
            info!(
                event = "core.refresh.request_started",
                chart = %chart,
                kind = %source.kind,
                priority = %request.priority,
                force = request.force,
            );

            let reporter = ProgressReporter::new(request.progress.take());
            let started = Instant::now();
            let outcome = self.run_fetch(&source, &reporter).await;
            if outcome.is_ok() {
                reporter.report(RefreshProgress::Caching);
            }
            let duration_ms = started.elapsed().as_millis() as u64;

            let (result, notification) = self.commit(&chart, &source, outcome, duration_ms);
            if let Some(notification) = notification {
                self.inner.notifications.publish(&chart, notification);
            }
            request.complete(&result);
            self.dispatch_queued();
            result
        })
    }

    async fn run_fetch(
        &self,
        source: &SourceDescriptor,
        reporter: &ProgressReporter,
    ) -> Result<u64, FetchFailure> {
        let fetcher = self.inner.fetchers.get(source.kind)?;
        match tokio::time::timeout(self.inner.fetch_timeout, fetcher.fetch(source, reporter)).await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(FetchFailure::TimedOut(self.inner.fetch_timeout)),
        }
    }

    /// Record a finished fetch and release its slot.
    fn commit(
        &self,
        chart: &ChartType,
        source: &SourceDescriptor,
        outcome: Result<u64, FetchFailure>,
        duration_ms: u64,
    ) -> (RefreshResult, Option<RefreshNotification>) {
        let now = self.now();
        let mut state = self.lock();
        state.set_refreshing(chart, false);
        state.queue.release();

        let Some(entry) = state.registry.get_mut(chart) else {
            let error = RefreshError::unknown_chart(chart);
            return (
                RefreshResult::failed(DataSourceStatus::missing(), None, error, duration_ms),
                None,
            );
        };

        match outcome {
            Ok(records) => {
                let update_source = entry.update_source();
                entry.status.mark_updated(now, update_source);
                info!(
                    event = "core.refresh.request_completed",
                    chart = %chart,
                    records = records,
                    duration_ms = duration_ms,
                );
                let notification = RefreshNotification {
                    chart_type: chart.clone(),
                    status: entry.status.clone(),
                    source: update_source,
                };
                (
                    RefreshResult::succeeded(
                        entry.status.clone(),
                        source.clone(),
                        records,
                        duration_ms,
                    ),
                    Some(notification),
                )
            }
            Err(failure) => {
                let message = failure.to_string();
                entry.status.mark_failed(message.as_str());
                entry.status.age_hours = entry.status.last_updated_at().map(|at| age_hours(at, now));

                let error = match &failure {
                    FetchFailure::Fetch(FetchError::ServiceNotFound { service }) => {
                        RefreshError::service_not_found(service)
                    }
                    _ => RefreshError::failed(
                        message,
                        entry.status.retry_count < entry.policy.max_retries,
                    ),
                };
                warn!(
                    event = "core.refresh.request_failed",
                    chart = %chart,
                    error = %failure,
                    retry_count = entry.status.retry_count,
                    retryable = error.retryable,
                    duration_ms = duration_ms,
                );
                (
                    RefreshResult::failed(
                        entry.status.clone(),
                        Some(source.clone()),
                        error,
                        duration_ms,
                    ),
                    None,
                )
            }
        }
    }

    /// Start queued requests while capacity remains. A queued request whose
    /// chart is still running stays queued; one whose service window is
    /// full is failed with `RATE_LIMIT_EXCEEDED`.
    fn dispatch_queued(&self) {
        let mut launches = Vec::new();
        let mut rejected = Vec::new();
        {
            let mut state = self.lock();
            loop {
                let ready = {
                    let EngineState {
                        queue, in_flight, ..
                    } = &mut *state;
                    queue.drain_ready(|r| !in_flight.contains(&r.chart_type))
                };
                if ready.is_empty() {
                    break;
                }
                for request in ready {
                    match self.begin_queued(&mut state, &request) {
                        Ok(source) => launches.push((request, source)),
                        Err(result) => {
                            state.queue.release();
                            rejected.push((request, result));
                        }
                    }
                }
            }
        }

        for (mut request, result) in rejected {
            request.complete(&result);
        }
        for (request, source) in launches {
            let engine = self.clone();
            tokio::spawn(async move {
                engine.execute(request, source).await;
            });
        }
    }

    /// Mark a dequeued request as running. Its slot is already reserved.
    fn begin_queued(
        &self,
        state: &mut EngineState,
        request: &RefreshRequest,
    ) -> Result<SourceDescriptor, RefreshResult> {
        let chart = &request.chart_type;
        let Some(entry) = state.registry.get(chart) else {
            return Err(RefreshResult::failed(
                DataSourceStatus::missing(),
                None,
                RefreshError::unknown_chart(chart),
                0,
            ));
        };
        let source = entry.source.clone();
        let service = entry.rate_limited_service().map(str::to_string);
        let status = entry.status.clone();

        if let Some(service) = service.as_deref() {
            if !state.limiter.can_admit(service) {
                let wait = state.limiter.next_available_in(service);
                warn!(
                    event = "core.refresh.rate_limited",
                    chart = %chart,
                    service = service,
                    retry_after_ms = wait.as_millis() as u64,
                    queued = true,
                );
                return Err(RefreshResult::failed(
                    status,
                    Some(source),
                    RefreshError::rate_limited(service, wait),
                    0,
                ));
            }
            state.limiter.record_admission(service);
        }
        state.set_refreshing(chart, true);
        Ok(source)
    }

    /// Apply a settled file change to every chart watching the resource.
    pub(crate) fn handle_file_change(&self, event: &FileChangeEvent) {
        let charts = self.inner.monitor.charts_for(&event.resource_id);
        let mut notifications = Vec::new();
        {
            let mut state = self.lock();
            for chart in &charts {
                let Some(entry) = state.registry.get_mut(chart) else {
                    continue;
                };
                match event.change_type {
                    ChangeType::Deleted => {
                        entry.status.state = DataState::Failed {
                            since: entry.status.last_updated_at(),
                            message: format!("Source removed: {}", event.resource_id),
                        };
                    }
                    ChangeType::Created | ChangeType::Modified => {
                        entry
                            .status
                            .mark_updated(event.timestamp, LastUpdateSource::Manual);
                        notifications.push(RefreshNotification {
                            chart_type: chart.clone(),
                            status: entry.status.clone(),
                            source: LastUpdateSource::Manual,
                        });
                    }
                }
                info!(
                    event = "core.engine.file_change_applied",
                    chart = %chart,
                    resource = %event.resource_id,
                    change_type = %event.change_type,
                    status = %entry.status.status(),
                );
            }
        }

        for notification in notifications {
            let chart = notification.chart_type.clone();
            self.inner.notifications.publish(&chart, notification);
        }
    }
}

fn reject(mut request: RefreshRequest, result: RefreshResult) -> Admit {
    debug!(
        event = "core.refresh.request_rejected",
        chart = %request.chart_type,
        code = ?result.error_code(),
    );
    request.complete(&result);
    Admit::Done(result)
}
