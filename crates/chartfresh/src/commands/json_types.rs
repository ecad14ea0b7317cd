use chrono::{DateTime, Utc};
use serde::Serialize;

use chartfresh_core::{
    ChartType, DependencyEntry, FreshnessStatus, LastUpdateSource, RefreshCapability,
    RefreshProgress, RefreshResult, SourceKind,
};

/// One chart's status, flattened for `status --json`.
#[derive(Serialize)]
pub struct ChartStatusView {
    pub chart_type: ChartType,
    pub source_kind: SourceKind,
    pub location: String,
    pub status: FreshnessStatus,
    pub age_hours: Option<f64>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub last_update_source: LastUpdateSource,
    pub last_error: Option<String>,
    pub retry_count: u32,
    pub refreshing: bool,
    pub capability: RefreshCapability,
}

impl From<DependencyEntry> for ChartStatusView {
    fn from(entry: DependencyEntry) -> Self {
        Self {
            status: entry.status.status(),
            age_hours: entry.status.age_hours,
            last_updated_at: entry.status.last_updated_at(),
            last_error: entry.status.last_error().map(str::to_string),
            last_update_source: entry.status.last_update_source,
            retry_count: entry.status.retry_count,
            refreshing: entry.status.refreshing,
            source_kind: entry.source.kind,
            location: entry.source.location,
            capability: entry.capability,
            chart_type: entry.chart_type,
        }
    }
}

/// Final output of `refresh --json`.
#[derive(Serialize)]
pub struct RefreshOutput {
    pub chart_type: ChartType,
    pub progress: Vec<RefreshProgress>,
    #[serde(flatten)]
    pub result: RefreshResult,
}
