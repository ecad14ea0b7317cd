use clap::ArgMatches;
use tracing::{error, info};

use super::helpers::load_config;

pub(crate) fn handle_config_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(event = "cli.config_started");

    let config = load_config(matches)?;
    let rendered = match toml::to_string_pretty(&config) {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("Could not render config: {}", e);
            error!(event = "cli.config_failed", error = %e);
            return Err(e.into());
        }
    };
    print!("{}", rendered);

    info!(
        event = "cli.config_completed",
        charts = config.charts.len(),
        services = config.services.len()
    );
    Ok(())
}
