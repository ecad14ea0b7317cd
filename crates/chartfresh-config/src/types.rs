//! Configuration types.
//!
//! Every field read from a file is optional or defaulted so that user and
//! project configs can be layered. Accessor methods apply the built-in
//! defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::defaults;

/// Name of a logical data feed. Key for every registry in the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartType(String);

impl ChartType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChartType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChartType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Where a chart's data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Static,
    ManualFile,
    ApiService,
    Hybrid,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Static => write!(f, "static"),
            SourceKind::ManualFile => write!(f, "manual-file"),
            SourceKind::ApiService => write!(f, "api-service"),
            SourceKind::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// How fresh data is detected for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshMethod {
    #[default]
    None,
    FilePoll,
    ApiPoll,
}

/// Immutable description of a chart's data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub kind: SourceKind,
    /// File path for file-backed sources, service endpoint otherwise.
    pub location: String,
    #[serde(default)]
    pub refresh_method: RefreshMethod,
    /// Required when `kind = api-service`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

/// Per-chart freshness thresholds and refresh permissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
    pub warning_age_hours: f64,
    pub error_age_hours: f64,
    #[serde(default)]
    pub auto_refresh_enabled: bool,
    #[serde(default = "defaults::manual_refresh_allowed")]
    pub manual_refresh_allowed: bool,
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            warning_age_hours: defaults::WARNING_AGE_HOURS,
            error_age_hours: defaults::ERROR_AGE_HOURS,
            auto_refresh_enabled: false,
            manual_refresh_allowed: defaults::manual_refresh_allowed(),
            max_retries: defaults::max_retries(),
        }
    }
}

/// Seed entry for one chart in the dependency registry.
///
/// Scalar fields come before the nested tables so the struct serializes
/// back to TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub chart_type: ChartType,
    /// Overrides `[engine] poll_interval_ms` for file-poll charts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    /// Overrides `[engine] debounce_ms` for file-poll charts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    pub source: SourceDescriptor,
    #[serde(default)]
    pub policy: FreshnessPolicy,
}

/// Request ceilings and optional fetch command for an API service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub per_minute: u32,
    pub per_hour: u32,
    /// Subprocess whose stdout rows are the fetched records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

/// `[engine]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_refresh: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
}

impl EngineSettings {
    pub fn max_concurrent_refresh(&self) -> usize {
        self.max_concurrent_refresh
            .unwrap_or(defaults::MAX_CONCURRENT_REFRESH)
    }

    pub fn sweep_interval_secs(&self) -> u64 {
        self.sweep_interval_secs
            .unwrap_or(defaults::SWEEP_INTERVAL_SECS)
    }

    pub fn fetch_timeout_secs(&self) -> u64 {
        self.fetch_timeout_secs
            .unwrap_or(defaults::FETCH_TIMEOUT_SECS)
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms.unwrap_or(defaults::POLL_INTERVAL_MS)
    }

    pub fn debounce_ms(&self) -> u64 {
        self.debounce_ms.unwrap_or(defaults::DEBOUNCE_MS)
    }

    /// Field-by-field merge, `override_settings` wins where set.
    pub fn merge(base: &Self, override_settings: &Self) -> Self {
        Self {
            max_concurrent_refresh: override_settings
                .max_concurrent_refresh
                .or(base.max_concurrent_refresh),
            sweep_interval_secs: override_settings
                .sweep_interval_secs
                .or(base.sweep_interval_secs),
            fetch_timeout_secs: override_settings
                .fetch_timeout_secs
                .or(base.fetch_timeout_secs),
            poll_interval_ms: override_settings.poll_interval_ms.or(base.poll_interval_ms),
            debounce_ms: override_settings.debounce_ms.or(base.debounce_ms),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreshConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
}

impl FreshConfig {
    pub fn chart(&self, chart_type: &ChartType) -> Option<&ChartConfig> {
        self.charts.iter().find(|c| &c.chart_type == chart_type)
    }

    /// Poll interval for a file-poll chart, falling back to the engine default.
    pub fn poll_interval_ms_for(&self, chart: &ChartConfig) -> u64 {
        chart
            .poll_interval_ms
            .unwrap_or_else(|| self.engine.poll_interval_ms())
    }

    pub fn debounce_ms_for(&self, chart: &ChartConfig) -> u64 {
        chart
            .debounce_ms
            .unwrap_or_else(|| self.engine.debounce_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_wire_format() {
        let parsed: SourceDescriptor = toml::from_str(
            r#"
            kind = "api-service"
            location = "quotes"
            refresh_method = "api-poll"
            service_name = "svcA"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.kind, SourceKind::ApiService);
        assert_eq!(parsed.refresh_method, RefreshMethod::ApiPoll);
        assert_eq!(parsed.service_name.as_deref(), Some("svcA"));
    }

    #[test]
    fn test_refresh_method_defaults_to_none() {
        let parsed: SourceDescriptor = toml::from_str(
            r#"
            kind = "static"
            location = "embedded"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.refresh_method, RefreshMethod::None);
        assert!(parsed.service_name.is_none());
    }

    #[test]
    fn test_policy_defaults() {
        let policy: FreshnessPolicy = toml::from_str(
            r#"
            warning_age_hours = 6
            error_age_hours = 12
            "#,
        )
        .unwrap();
        assert!(!policy.auto_refresh_enabled);
        assert!(policy.manual_refresh_allowed);
        assert_eq!(policy.max_retries, 3);
    }

    #[test]
    fn test_engine_settings_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.max_concurrent_refresh(), 3);
        assert_eq!(settings.sweep_interval_secs(), 300);
        assert_eq!(settings.fetch_timeout_secs(), 30);
        assert_eq!(settings.poll_interval_ms(), 5000);
        assert_eq!(settings.debounce_ms(), 1000);
    }

    #[test]
    fn test_engine_settings_merge() {
        let base = EngineSettings {
            max_concurrent_refresh: Some(2),
            sweep_interval_secs: Some(60),
            ..Default::default()
        };
        let over = EngineSettings {
            max_concurrent_refresh: Some(5),
            debounce_ms: Some(250),
            ..Default::default()
        };
        let merged = EngineSettings::merge(&base, &over);
        assert_eq!(merged.max_concurrent_refresh(), 5);
        assert_eq!(merged.sweep_interval_secs(), 60);
        assert_eq!(merged.debounce_ms(), 250);
        assert_eq!(merged.fetch_timeout_secs(), 30);
    }

    #[test]
    fn test_chart_type_display() {
        let chart = ChartType::new("spy-daily");
        assert_eq!(chart.to_string(), "spy-daily");
        assert_eq!(chart.as_str(), "spy-daily");
        assert_eq!(ChartType::from("spy-daily"), chart);
    }

    #[test]
    fn test_chart_poll_overrides() {
        let config: FreshConfig = toml::from_str(
            r#"
            [engine]
            poll_interval_ms = 2000

            [[charts]]
            chart_type = "holdings"
            poll_interval_ms = 500
            [charts.source]
            kind = "manual-file"
            location = "/data/holdings.csv"
            refresh_method = "file-poll"
            "#,
        )
        .unwrap();
        let chart = config.chart(&ChartType::from("holdings")).unwrap();
        assert_eq!(config.poll_interval_ms_for(chart), 500);
        assert_eq!(config.debounce_ms_for(chart), 1000);
    }
}
