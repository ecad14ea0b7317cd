//! Configuration validation logic.
//!
//! Catches misconfiguration at load time so the engine never starts with a
//! registry it cannot honor.

use std::collections::HashSet;

use crate::defaults::MAX_INTERVAL_SECS;
use crate::errors::ConfigError;
use crate::types::{FreshConfig, SourceKind};

const MAX_INTERVAL_MS: u64 = MAX_INTERVAL_SECS * 1000;

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidConfiguration {
        message: message.into(),
    }
}

/// Validate a FreshConfig, returning an error if any values are invalid.
///
/// # Validation Rules
///
/// - Engine intervals and the concurrency cap must be non-zero
/// - Intervals, timeouts, and debounce windows are at most one week
/// - Chart types must be non-empty and unique
/// - Age thresholds are finite and `error_age_hours >= warning_age_hours >= 0`
/// - API-backed sources must name a service
/// - Service ceilings must be non-zero with `per_hour >= per_minute`
///
/// A `service_name` with no matching `[services]` entry is accepted here;
/// it surfaces as `SERVICE_NOT_FOUND` when the chart is refreshed.
pub fn validate_config(config: &FreshConfig) -> Result<(), ConfigError> {
    let engine = &config.engine;
    if engine.max_concurrent_refresh() == 0 {
        return Err(invalid("max_concurrent_refresh must be > 0"));
    }
    if engine.sweep_interval_secs() == 0 {
        return Err(invalid("sweep_interval_secs must be > 0"));
    }
    if engine.fetch_timeout_secs() == 0 {
        return Err(invalid("fetch_timeout_secs must be > 0"));
    }
    if engine.poll_interval_ms() == 0 {
        return Err(invalid("poll_interval_ms must be > 0"));
    }
    check_bound("sweep_interval_secs", engine.sweep_interval_secs(), MAX_INTERVAL_SECS)?;
    check_bound("fetch_timeout_secs", engine.fetch_timeout_secs(), MAX_INTERVAL_SECS)?;
    check_bound("poll_interval_ms", engine.poll_interval_ms(), MAX_INTERVAL_MS)?;
    check_bound("debounce_ms", engine.debounce_ms(), MAX_INTERVAL_MS)?;

    let mut seen = HashSet::new();
    for chart in &config.charts {
        let name = chart.chart_type.as_str();
        if name.trim().is_empty() {
            return Err(invalid("chart_type must not be empty"));
        }
        if !seen.insert(name) {
            return Err(invalid(format!("duplicate chart_type '{}'", name)));
        }

        let policy = &chart.policy;
        if !policy.warning_age_hours.is_finite() || !policy.error_age_hours.is_finite() {
            return Err(invalid(format!(
                "chart '{}': age thresholds must be finite numbers",
                name
            )));
        }
        if policy.warning_age_hours < 0.0 {
            return Err(invalid(format!(
                "chart '{}': warning_age_hours must be >= 0",
                name
            )));
        }
        if policy.error_age_hours < policy.warning_age_hours {
            return Err(invalid(format!(
                "chart '{}': error_age_hours ({}) must be >= warning_age_hours ({})",
                name, policy.error_age_hours, policy.warning_age_hours
            )));
        }

        if chart.source.kind == SourceKind::ApiService && chart.source.service_name.is_none() {
            return Err(invalid(format!(
                "chart '{}': api-service source requires service_name",
                name
            )));
        }

        if chart.poll_interval_ms == Some(0) {
            return Err(invalid(format!(
                "chart '{}': poll_interval_ms must be > 0",
                name
            )));
        }
        if let Some(ms) = chart.poll_interval_ms {
            check_bound(&format!("chart '{}': poll_interval_ms", name), ms, MAX_INTERVAL_MS)?;
        }
        if let Some(ms) = chart.debounce_ms {
            check_bound(&format!("chart '{}': debounce_ms", name), ms, MAX_INTERVAL_MS)?;
        }
    }

    for (service, limits) in &config.services {
        if limits.per_minute == 0 || limits.per_hour == 0 {
            return Err(invalid(format!(
                "service '{}': per_minute and per_hour must be > 0",
                service
            )));
        }
        if limits.per_hour < limits.per_minute {
            return Err(invalid(format!(
                "service '{}': per_hour ({}) must be >= per_minute ({})",
                service, limits.per_hour, limits.per_minute
            )));
        }
        if let Some(command) = &limits.command
            && command.is_empty()
        {
            return Err(invalid(format!(
                "service '{}': command must not be empty",
                service
            )));
        }
    }

    Ok(())
}

fn check_bound(field: &str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value > max {
        return Err(invalid(format!("{} must be <= {} (got {})", field, max, value)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ChartConfig, ChartType, FreshnessPolicy, RefreshMethod, ServiceConfig, SourceDescriptor,
    };

    fn chart(name: &str, kind: SourceKind, service: Option<&str>) -> ChartConfig {
        ChartConfig {
            chart_type: ChartType::from(name),
            source: SourceDescriptor {
                kind,
                location: format!("{}.csv", name),
                refresh_method: RefreshMethod::None,
                service_name: service.map(str::to_string),
            },
            policy: FreshnessPolicy::default(),
            poll_interval_ms: None,
            debounce_ms: None,
        }
    }

    fn assert_invalid(config: &FreshConfig) {
        assert!(matches!(
            validate_config(config),
            Err(ConfigError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&FreshConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = FreshConfig::default();
        config.engine.max_concurrent_refresh = Some(0);
        assert_invalid(&config);
    }

    #[test]
    fn test_duplicate_chart_rejected() {
        let mut config = FreshConfig::default();
        config.charts.push(chart("spy", SourceKind::Static, None));
        config.charts.push(chart("spy", SourceKind::Static, None));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate chart_type 'spy'"));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = FreshConfig::default();
        let mut c = chart("spy", SourceKind::Static, None);
        c.policy.warning_age_hours = 48.0;
        c.policy.error_age_hours = 24.0;
        config.charts.push(c);
        assert_invalid(&config);
    }

    #[test]
    fn test_oversized_intervals_rejected() {
        let mut config = FreshConfig::default();
        config.engine.sweep_interval_secs = Some(u64::MAX);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("sweep_interval_secs must be <="));

        let mut config = FreshConfig::default();
        config.engine.debounce_ms = Some(u64::MAX);
        assert_invalid(&config);

        let mut config = FreshConfig::default();
        config.engine.fetch_timeout_secs = Some(MAX_INTERVAL_SECS + 1);
        assert_invalid(&config);

        let mut config = FreshConfig::default();
        let mut c = chart("holdings", SourceKind::ManualFile, None);
        c.poll_interval_ms = Some(u64::MAX);
        config.charts.push(c);
        assert_invalid(&config);

        let mut config = FreshConfig::default();
        config.engine.sweep_interval_secs = Some(MAX_INTERVAL_SECS);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_nan_thresholds_rejected() {
        let parsed = crate::parse_config(
            r#"
            [[charts]]
            chart_type = "spy"
            [charts.source]
            kind = "static"
            location = "embedded"
            [charts.policy]
            warning_age_hours = nan
            error_age_hours = 48.0
            "#,
        );
        let config = parsed.unwrap();
        assert!(config.charts[0].policy.warning_age_hours.is_nan());
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("age thresholds must be finite"));

        let mut config = FreshConfig::default();
        let mut c = chart("spy", SourceKind::Static, None);
        c.policy.error_age_hours = f64::INFINITY;
        config.charts.push(c);
        assert_invalid(&config);
    }

    #[test]
    fn test_api_source_requires_service_name() {
        let mut config = FreshConfig::default();
        config.charts.push(chart("spy", SourceKind::ApiService, None));
        assert_invalid(&config);
    }

    #[test]
    fn test_unknown_service_is_accepted() {
        let mut config = FreshConfig::default();
        config
            .charts
            .push(chart("spy", SourceKind::ApiService, Some("nowhere")));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_service_limits_validated() {
        let mut config = FreshConfig::default();
        config.services.insert(
            "svcA".to_string(),
            ServiceConfig {
                per_minute: 10,
                per_hour: 5,
                command: None,
            },
        );
        assert_invalid(&config);

        config.services.insert(
            "svcA".to_string(),
            ServiceConfig {
                per_minute: 0,
                per_hour: 5,
                command: None,
            },
        );
        assert_invalid(&config);

        config.services.insert(
            "svcA".to_string(),
            ServiceConfig {
                per_minute: 5,
                per_hour: 100,
                command: Some(vec![]),
            },
        );
        assert_invalid(&config);
    }
}
