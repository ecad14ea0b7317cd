//! The dependency registry: one entry per configured chart.

use std::collections::BTreeMap;

use chartfresh_config::{
    ChartConfig, ChartType, FreshConfig, FreshnessPolicy, RefreshMethod, SourceDescriptor,
    SourceKind,
};
use serde::{Deserialize, Serialize};

use crate::freshness::{DataSourceStatus, LastUpdateSource, RefreshCapability, refresh_capability};
use crate::monitor::{ResourceId, WatchSpec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub chart_type: ChartType,
    pub source: SourceDescriptor,
    pub policy: FreshnessPolicy,
    pub status: DataSourceStatus,
    pub capability: RefreshCapability,
}

impl DependencyEntry {
    pub fn new(chart_type: ChartType, source: SourceDescriptor, policy: FreshnessPolicy) -> Self {
        let capability = refresh_capability(&source, &policy);
        Self {
            chart_type,
            source,
            policy,
            status: DataSourceStatus::missing(),
            capability,
        }
    }

    /// File-backed charts are watched by the change monitor.
    pub fn is_file_watched(&self) -> bool {
        self.source.refresh_method == RefreshMethod::FilePoll
            && matches!(self.source.kind, SourceKind::ManualFile | SourceKind::Hybrid)
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(self.source.location.as_str())
    }

    /// Service whose rate limit governs this chart. Only API sources are
    /// rate limited.
    pub fn rate_limited_service(&self) -> Option<&str> {
        match self.source.kind {
            SourceKind::ApiService => self.source.service_name.as_deref(),
            _ => None,
        }
    }

    /// What a successful refresh of this chart counts as.
    pub fn update_source(&self) -> LastUpdateSource {
        match self.source.kind {
            SourceKind::ApiService => LastUpdateSource::Api,
            SourceKind::Hybrid if self.source.service_name.is_some() => LastUpdateSource::Api,
            _ => LastUpdateSource::Manual,
        }
    }
}

impl From<&ChartConfig> for DependencyEntry {
    fn from(chart: &ChartConfig) -> Self {
        Self::new(
            chart.chart_type.clone(),
            chart.source.clone(),
            chart.policy.clone(),
        )
    }
}

/// Chart-keyed store of dependency entries. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct DependencyRegistry {
    entries: BTreeMap<ChartType, DependencyEntry>,
    watch_specs: BTreeMap<ChartType, WatchSpec>,
}

impl DependencyRegistry {
    pub fn from_config(config: &FreshConfig) -> Self {
        let mut registry = Self::default();
        for chart in &config.charts {
            let entry = DependencyEntry::from(chart);
            if entry.is_file_watched() {
                registry.watch_specs.insert(
                    chart.chart_type.clone(),
                    WatchSpec::from_millis(
                        config.poll_interval_ms_for(chart),
                        config.debounce_ms_for(chart),
                    ),
                );
            }
            registry.entries.insert(chart.chart_type.clone(), entry);
        }
        registry
    }

    pub fn get(&self, chart: &ChartType) -> Option<&DependencyEntry> {
        self.entries.get(chart)
    }

    pub fn get_mut(&mut self, chart: &ChartType) -> Option<&mut DependencyEntry> {
        self.entries.get_mut(chart)
    }

    pub fn contains(&self, chart: &ChartType) -> bool {
        self.entries.contains_key(chart)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependencyEntry> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DependencyEntry> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Watched charts with their resource and poll timing.
    pub fn watched(&self) -> Vec<(ChartType, ResourceId, WatchSpec)> {
        self.watch_specs
            .iter()
            .filter_map(|(chart, spec)| {
                self.entries
                    .get(chart)
                    .map(|entry| (chart.clone(), entry.resource_id(), *spec))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FreshConfig {
        let toml = r#"
[engine]
poll_interval_ms = 2000

[services.quotes]
per_minute = 5
per_hour = 100

[[charts]]
chart_type = "holdings"
debounce_ms = 250
[charts.source]
kind = "manual-file"
location = "/data/holdings.csv"
refresh_method = "file-poll"

[[charts]]
chart_type = "prices"
[charts.source]
kind = "api-service"
location = "https://quotes.example/v1"
refresh_method = "api-poll"
service_name = "quotes"

[[charts]]
chart_type = "sectors"
[charts.source]
kind = "static"
location = "builtin"
"#;
        chartfresh_config::parse_config(toml).unwrap()
    }

    #[test]
    fn test_registry_seeds_missing_status_and_capability() {
        let registry = DependencyRegistry::from_config(&config());
        assert_eq!(registry.len(), 3);

        let prices = registry.get(&"prices".into()).unwrap();
        assert_eq!(prices.status, DataSourceStatus::missing());
        assert!(prices.capability.can_refresh);
        assert!(prices.capability.requires_auth);
        assert_eq!(prices.rate_limited_service(), Some("quotes"));
        assert_eq!(prices.update_source(), LastUpdateSource::Api);

        let sectors = registry.get(&"sectors".into()).unwrap();
        assert!(!sectors.capability.can_refresh);
        assert_eq!(sectors.rate_limited_service(), None);
    }

    #[test]
    fn test_only_file_poll_charts_are_watched() {
        let registry = DependencyRegistry::from_config(&config());
        let watched = registry.watched();
        assert_eq!(watched.len(), 1);

        let (chart, resource, spec) = &watched[0];
        assert_eq!(chart.as_str(), "holdings");
        assert_eq!(resource.as_str(), "/data/holdings.csv");
        assert_eq!(*spec, WatchSpec::from_millis(2000, 250));
    }

    #[test]
    fn test_iteration_is_ordered_by_chart() {
        let registry = DependencyRegistry::from_config(&config());
        let names: Vec<&str> = registry.iter().map(|e| e.chart_type.as_str()).collect();
        assert_eq!(names, vec!["holdings", "prices", "sectors"]);
    }
}
