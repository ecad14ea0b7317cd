use clap::ArgMatches;
use tracing::{info, warn};

use super::helpers::{format_age, load_config, start_engine};

pub(crate) fn handle_watch_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let json_output = matches.get_flag("json");

    info!(event = "cli.watch_started", json_output = json_output);

    let config = load_config(matches)?;
    let rt = tokio::runtime::Runtime::new()?;
    let delivered = rt.block_on(async {
        let engine = start_engine(config).await?;
        let mut updates = engine.subscribe_all();
        let watched = engine.monitor().watched_resources();

        if !json_output {
            println!(
                "Watching {} source(s) for {} chart(s). Press Ctrl-C to stop.",
                watched.len(),
                engine.chart_types().len()
            );
        }

        let mut delivered = 0usize;
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        warn!(event = "cli.watch.signal_failed", error = %e);
                    }
                    break;
                }
                update = updates.recv() => {
                    let Some(update) = update else { break };
                    delivered += 1;
                    if json_output {
                        match serde_json::to_string(&update) {
                            Ok(line) => println!("{}", line),
                            Err(e) => warn!(event = "cli.watch.encode_failed", error = %e),
                        }
                    } else {
                        println!(
                            "{}  {:<24} {:<9} via {} (age {})",
                            chrono::Utc::now().format("%H:%M:%S"),
                            update.chart_type,
                            update.status.status(),
                            update.source,
                            format_age(update.status.age_hours)
                        );
                    }
                }
            }
        }

        engine.shutdown();
        Ok::<_, Box<dyn std::error::Error>>(delivered)
    })?;

    info!(event = "cli.watch_completed", updates = delivered);
    Ok(())
}
