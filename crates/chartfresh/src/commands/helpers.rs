use std::path::PathBuf;

use clap::ArgMatches;
use tracing::error;

use chartfresh_config::FreshConfig;
use chartfresh_core::RefreshEngine;

/// Load the merged configuration, honoring `--config`.
///
/// Unlike a missing user or project file, a broken config is fatal here:
/// an engine without its charts has nothing to report.
pub fn load_config(matches: &ArgMatches) -> Result<FreshConfig, Box<dyn std::error::Error>> {
    let explicit = matches.get_one::<PathBuf>("config");
    match FreshConfig::load_hierarchy(explicit.map(PathBuf::as_path)) {
        Ok(config) => Ok(config),
        Err(e) => {
            eprintln!(
                "Could not load config: {}\n\
                 Tip: Check ~/.chartfresh/config.toml and ./.chartfresh/config.toml for syntax errors.",
                e
            );
            error!(event = "cli.config.load_failed", error = %e);
            Err(e.into())
        }
    }
}

/// Build an engine from the loaded config and start it so file-backed
/// charts are seeded from their current modification times.
///
/// Must be called from within a tokio runtime.
pub async fn start_engine(
    config: FreshConfig,
) -> Result<RefreshEngine, Box<dyn std::error::Error>> {
    let engine = match RefreshEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Could not create refresh engine: {}", e);
            error!(event = "cli.engine.create_failed", error = %e);
            return Err(e.into());
        }
    };

    if let Err(e) = engine.start().await {
        eprintln!("Could not start refresh engine: {}", e);
        error!(event = "cli.engine.start_failed", error = %e);
        return Err(e.into());
    }

    Ok(engine)
}

/// Human-readable age, e.g. `45m`, `6.5h`, `3.2d`.
pub fn format_age(age_hours: Option<f64>) -> String {
    match age_hours {
        None => "-".to_string(),
        Some(hours) if hours < 1.0 => format!("{}m", (hours * 60.0).floor() as u64),
        Some(hours) if hours < 48.0 => format!("{:.1}h", hours),
        Some(hours) => format!("{:.1}d", hours / 24.0),
    }
}
