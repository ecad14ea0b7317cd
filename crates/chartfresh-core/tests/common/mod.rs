//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chartfresh_core::fetch::{FetchError, FetcherRegistry, ProgressReporter, SourceFetcher};
use chartfresh_core::monitor::{ResourceId, ResourceSnapshot, SnapshotError, SnapshotProvider};
use chartfresh_core::{
    ChartConfig, EngineSettings, FreshConfig, FreshnessPolicy, ManualClock, RefreshEngine,
    RefreshMethod, ServiceConfig, SourceDescriptor, SourceKind,
};
use chrono::{DateTime, TimeZone, Utc};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn chart(name: &str, kind: SourceKind) -> ChartConfig {
    let refresh_method = match kind {
        SourceKind::Static => RefreshMethod::None,
        SourceKind::ApiService => RefreshMethod::ApiPoll,
        SourceKind::ManualFile | SourceKind::Hybrid => RefreshMethod::FilePoll,
    };
    ChartConfig {
        chart_type: name.into(),
        source: SourceDescriptor {
            kind,
            location: format!("{}.csv", name),
            refresh_method,
            service_name: None,
        },
        policy: FreshnessPolicy::default(),
        poll_interval_ms: None,
        debounce_ms: None,
    }
}

pub fn api_chart(name: &str, service: &str) -> ChartConfig {
    let mut chart = chart(name, SourceKind::ApiService);
    chart.source.service_name = Some(service.to_string());
    chart
}

pub fn config(charts: Vec<ChartConfig>) -> FreshConfig {
    FreshConfig {
        engine: EngineSettings::default(),
        services: BTreeMap::new(),
        charts,
    }
}

pub fn with_service(mut config: FreshConfig, name: &str, per_minute: u32, per_hour: u32) -> FreshConfig {
    config.services.insert(
        name.to_string(),
        ServiceConfig {
            per_minute,
            per_hour,
            command: None,
        },
    );
    config
}

pub fn with_max_concurrent(mut config: FreshConfig, max: usize) -> FreshConfig {
    config.engine.max_concurrent_refresh = Some(max);
    config
}

/// Fetcher that sleeps for `delay`, records start order and concurrency,
/// and fails while `failing` is set.
pub struct MockFetcher {
    delay: Duration,
    records: u64,
    failing: Mutex<Option<String>>,
    started: Mutex<Vec<String>>,
    active: Mutex<HashSet<String>>,
    concurrent: AtomicUsize,
    max_concurrent: AtomicUsize,
    overlapped: AtomicUsize,
}

impl MockFetcher {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            records: 42,
            failing: Mutex::new(None),
            started: Mutex::new(Vec::new()),
            active: Mutex::new(HashSet::new()),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
            overlapped: AtomicUsize::new(0),
        })
    }

    pub fn fail_with(&self, message: &str) {
        *self.failing.lock().unwrap() = Some(message.to_string());
    }

    pub fn succeed(&self) {
        *self.failing.lock().unwrap() = None;
    }

    /// Locations in the order their fetches started.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::SeqCst)
    }

    /// Times a fetch started while another fetch of the same location ran.
    pub fn overlapped(&self) -> usize {
        self.overlapped.load(Ordering::SeqCst)
    }

    pub fn registry(self: &Arc<Self>) -> FetcherRegistry {
        let fetcher: Arc<dyn SourceFetcher> = self.clone();
        FetcherRegistry::new()
            .with(SourceKind::ManualFile, Arc::clone(&fetcher))
            .with(SourceKind::ApiService, Arc::clone(&fetcher))
            .with(SourceKind::Hybrid, fetcher)
    }
}

#[async_trait]
impl SourceFetcher for MockFetcher {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        _progress: &ProgressReporter,
    ) -> Result<u64, FetchError> {
        let location = source.location.clone();
        self.started.lock().unwrap().push(location.clone());
        if !self.active.lock().unwrap().insert(location.clone()) {
            self.overlapped.fetch_add(1, Ordering::SeqCst);
        }
        let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.concurrent.fetch_sub(1, Ordering::SeqCst);
        self.active.lock().unwrap().remove(&location);

        match self.failing.lock().unwrap().clone() {
            Some(message) => Err(FetchError::Parse { location, message }),
            None => Ok(self.records),
        }
    }
}

/// Snapshot provider whose answer the test controls.
#[derive(Default)]
pub struct ScriptedSnapshots {
    current: Mutex<Option<ResourceSnapshot>>,
}

impl ScriptedSnapshots {
    pub fn new(initial: Option<ResourceSnapshot>) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(initial),
        })
    }

    pub fn set(&self, snapshot: Option<ResourceSnapshot>) {
        *self.current.lock().unwrap() = snapshot;
    }
}

#[async_trait]
impl SnapshotProvider for ScriptedSnapshots {
    async fn snapshot(&self, _resource: &ResourceId) -> Result<ResourceSnapshot, SnapshotError> {
        Ok(self
            .current
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(ResourceSnapshot::absent))
    }
}

pub fn engine_with(
    config: FreshConfig,
    fetcher: &Arc<MockFetcher>,
    clock: &ManualClock,
) -> RefreshEngine {
    RefreshEngine::builder(config)
        .fetchers(fetcher.registry())
        .snapshot_provider(ScriptedSnapshots::new(None))
        .clock(Arc::new(clock.clone()))
        .native_wakeups(false)
        .build()
        .unwrap()
}
