use clap::ArgMatches;
use tracing::{error, info};

use chartfresh_core::ChartType;

use crate::table::StatusTable;

use super::helpers::{load_config, start_engine};
use super::json_types::ChartStatusView;

pub(crate) fn handle_status_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let chart = matches.get_one::<String>("chart").map(ChartType::new);
    let json_output = matches.get_flag("json");

    info!(
        event = "cli.status_started",
        chart = chart.as_ref().map(ChartType::as_str),
        json_output = json_output
    );

    let config = load_config(matches)?;
    let rt = tokio::runtime::Runtime::new()?;
    let views = rt.block_on(async {
        let engine = start_engine(config).await?;
        let charts = match &chart {
            Some(chart) => vec![chart.clone()],
            None => engine.chart_types(),
        };
        let mut views = Vec::with_capacity(charts.len());
        for chart in charts {
            let Some(entry) = engine.entry(&chart) else {
                engine.shutdown();
                eprintln!("Chart '{}' is not configured", chart);
                error!(event = "cli.status_failed", chart = %chart, "unknown chart");
                return Err(format!("Unknown chart: {}", chart).into());
            };
            views.push(ChartStatusView::from(entry));
        }
        engine.shutdown();
        Ok::<_, Box<dyn std::error::Error>>(views)
    })?;

    if json_output {
        if chart.is_some()
            && let Some(view) = views.first()
        {
            println!("{}", serde_json::to_string_pretty(view)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&views)?);
        }
    } else if views.is_empty() {
        println!("No charts configured.");
    } else {
        print!("{}", StatusTable::new(&views).render());
    }

    info!(event = "cli.status_completed", count = views.len());
    Ok(())
}
