//! chartfresh-core: freshness tracking and refresh orchestration for chart
//! data feeds
//!
//! Decides, for each configured chart, whether its cached data is fresh and
//! whether it may be refreshed, and coordinates refreshes under per-service
//! rate limits, a global concurrency cap, and a retry policy. File-backed
//! charts are kept current by a polling change monitor.
//!
//! # Main Entry Points
//!
//! - [`refresh`] - The [`RefreshEngine`] orchestrator and its request/result types
//! - [`freshness`] - Pure age classification and refresh capability
//! - [`ratelimit`] - Sliding-window rate limiter and the priority queue
//! - [`monitor`] - Snapshot polling with debounced change events
//! - [`fetch`] - Source fetchers the engine delegates to

pub mod clock;
pub mod errors;
pub mod fetch;
pub mod freshness;
pub mod logging;
pub mod monitor;
pub mod ratelimit;
pub mod refresh;
pub mod subscription;

// Re-export config types from chartfresh-config
pub use chartfresh_config::{
    ChartConfig, ChartType, ConfigError, EngineSettings, FreshConfig, FreshnessPolicy,
    RefreshMethod, ServiceConfig, SourceDescriptor, SourceKind,
};

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{EngineError, FreshError, FreshResult};
pub use fetch::{FetchError, FetcherRegistry, ProgressReporter, RefreshProgress, SourceFetcher};
pub use freshness::{
    DataSourceStatus, DataState, FreshnessStatus, LastUpdateSource, RefreshCapability,
};
pub use monitor::{
    ChangeMonitor, ChangeType, FileChangeEvent, FsSnapshotProvider, ResourceId,
    ResourceSnapshot, SnapshotError, SnapshotProvider,
};
pub use ratelimit::Priority;
pub use refresh::{
    DependencyEntry, RefreshEngine, RefreshEngineBuilder, RefreshError, RefreshErrorCode,
    RefreshNotification, RefreshRequest, RefreshResult, RefreshSubscription, SweepReport,
};
pub use subscription::Subscription;

// Re-export logging initialization
pub use logging::init_logging;
