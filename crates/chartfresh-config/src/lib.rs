//! # chartfresh-config
//!
//! TOML configuration types, loading, and validation for chartfresh.
//!
//! Holds the static seed table of the dependency registry (chart type,
//! source descriptor, freshness policy), the per-service rate ceilings, and
//! the engine's tuning knobs.

mod defaults;
mod loading;
mod validation;

pub mod errors;
pub mod paths;
pub mod types;

pub use errors::ConfigError;
pub use loading::{load_config_file, load_hierarchy, merge_configs, parse_config};
pub use paths::FreshPaths;
pub use types::{
    ChartConfig, ChartType, EngineSettings, FreshConfig, FreshnessPolicy, RefreshMethod,
    ServiceConfig, SourceDescriptor, SourceKind,
};
pub use validation::validate_config;

impl FreshConfig {
    /// Load configuration from the hierarchy of config files.
    ///
    /// See [`loading::load_hierarchy`] for details.
    pub fn load_hierarchy(explicit: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        loading::load_hierarchy(explicit)
    }

    /// Validate the configuration.
    ///
    /// See [`validation::validate_config`] for details.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_config(self)
    }
}
