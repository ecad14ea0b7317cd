//! Configuration loading and merging logic.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in the following order (later sources override earlier ones):
//! 1. **Hardcoded defaults** - Built-in fallback values
//! 2. **User config** - `~/.chartfresh/config.toml`
//! 3. **Project config** - `./.chartfresh/config.toml`
//! 4. **Explicit file** - `--config <path>` (highest priority)

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::paths::FreshPaths;
use crate::types::{ChartConfig, EngineSettings, FreshConfig};
use crate::validation::validate_config;

fn is_file_not_found(e: &ConfigError) -> bool {
    matches!(e, ConfigError::IoError { source } if source.kind() == std::io::ErrorKind::NotFound)
}

/// Load and merge defaults, user config, project config, and an optional
/// explicit file, then validate the result.
///
/// # Errors
///
/// Missing user/project files are not errors. A missing explicit file,
/// a parse failure, or a validation failure is.
pub fn load_hierarchy(explicit: Option<&Path>) -> Result<FreshConfig, ConfigError> {
    let mut config = FreshConfig::default();

    match load_user_config() {
        Ok(user_config) => config = merge_configs(config, user_config),
        Err(e) if !is_file_not_found(&e) => return Err(e),
        Err(_) => debug!(event = "config.load.user_missing"),
    }

    match load_project_config() {
        Ok(project_config) => config = merge_configs(config, project_config),
        Err(e) if !is_file_not_found(&e) => return Err(e),
        Err(_) => debug!(event = "config.load.project_missing"),
    }

    if let Some(path) = explicit {
        config = merge_configs(config, load_config_file(path)?);
    }

    validate_config(&config)?;

    info!(
        event = "config.load.completed",
        charts = config.charts.len(),
        services = config.services.len(),
    );

    Ok(config)
}

fn load_user_config() -> Result<FreshConfig, ConfigError> {
    let paths = FreshPaths::resolve()?;
    load_config_file(&paths.user_config())
}

fn load_project_config() -> Result<FreshConfig, ConfigError> {
    let project_root = std::env::current_dir()?;
    load_config_file(&FreshPaths::project_config(&project_root))
}

/// Load a single configuration file without validating it.
pub fn load_config_file(path: &Path) -> Result<FreshConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        source: std::io::Error::new(e.kind(), format!("'{}': {}", path.display(), e)),
    })?;
    parse_config(&content).map_err(|e| match e {
        ConfigError::ConfigParseError { message } => ConfigError::ConfigParseError {
            message: format!("'{}': {}", path.display(), message),
        },
        other => other,
    })
}

/// Parse configuration from TOML text without validating it.
pub fn parse_config(content: &str) -> Result<FreshConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ConfigParseError {
        message: e.to_string(),
    })
}

/// Merge two configurations, with `override_config` taking precedence.
///
/// Engine scalars override field-by-field. Services merge by name. Charts
/// merge by `chart_type`: an override entry replaces the base entry in
/// place, new charts are appended in file order.
pub fn merge_configs(base: FreshConfig, override_config: FreshConfig) -> FreshConfig {
    FreshConfig {
        engine: EngineSettings::merge(&base.engine, &override_config.engine),
        services: {
            let mut merged = base.services;
            merged.extend(override_config.services);
            merged
        },
        charts: merge_charts(base.charts, override_config.charts),
    }
}

fn merge_charts(base: Vec<ChartConfig>, overrides: Vec<ChartConfig>) -> Vec<ChartConfig> {
    let mut merged = base;
    for chart in overrides {
        match merged
            .iter_mut()
            .find(|existing| existing.chart_type == chart.chart_type)
        {
            Some(existing) => *existing = chart,
            None => merged.push(chart),
        }
    }
    merged
}
