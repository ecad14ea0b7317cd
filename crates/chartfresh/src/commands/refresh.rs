use clap::ArgMatches;
use tokio::sync::mpsc;
use tracing::{error, info};

use chartfresh_core::{ChartType, Priority, RefreshRequest, RefreshResult};

use super::helpers::{format_age, load_config, start_engine};
use super::json_types::RefreshOutput;

pub(crate) fn handle_refresh_command(
    matches: &ArgMatches,
) -> Result<(), Box<dyn std::error::Error>> {
    let chart = matches
        .get_one::<String>("chart")
        .map(ChartType::new)
        .ok_or("Chart argument is required")?;
    let force = matches.get_flag("force");
    let json_output = matches.get_flag("json");
    let priority = matches
        .get_one::<String>("priority")
        .and_then(|p| Priority::parse(p))
        .unwrap_or_default();

    info!(
        event = "cli.refresh_started",
        chart = %chart,
        force = force,
        priority = %priority
    );

    let config = load_config(matches)?;
    let rt = tokio::runtime::Runtime::new()?;
    let (result, progress) = rt.block_on(async {
        let engine = start_engine(config).await?;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = RefreshRequest::new(chart.clone())
            .force(force)
            .priority(priority)
            .with_progress(tx);

        let printer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(stage) = rx.recv().await {
                if !json_output {
                    println!("  {}...", stage);
                }
                seen.push(stage);
            }
            seen
        });

        let result = engine.request_refresh(request).await;
        engine.shutdown();
        let progress = printer.await.unwrap_or_default();
        Ok::<_, Box<dyn std::error::Error>>((result, progress))
    })?;

    if json_output {
        let output = RefreshOutput {
            chart_type: chart.clone(),
            progress,
            result: result.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_result(&chart, &result);
    }

    if result.success {
        info!(
            event = "cli.refresh_completed",
            chart = %chart,
            records = result.records_updated,
            duration_ms = result.duration_ms
        );
        Ok(())
    } else {
        let message = result
            .error
            .as_ref()
            .map_or_else(|| "Refresh failed".to_string(), ToString::to_string);
        error!(event = "cli.refresh_failed", chart = %chart, error = %message);
        Err(message.into())
    }
}

fn print_result(chart: &ChartType, result: &RefreshResult) {
    if result.success {
        println!("✅ Refreshed {}", chart);
        if let Some(records) = result.records_updated {
            println!("   Records:  {}", records);
        }
        println!("   Duration: {}ms", result.duration_ms);
        println!("   Status:   {}", result.status.status());
        return;
    }

    let Some(error) = &result.error else {
        eprintln!("❌ Refresh of {} failed", chart);
        return;
    };
    if result.is_deferred() {
        eprintln!("⏳ {}: {}", chart, error.message);
        eprintln!("   The engine is busy; nothing was fetched in this run.");
    } else {
        eprintln!("❌ Refresh of {} failed: {}", chart, error.message);
        eprintln!("   Code:     {}", error.code);
    }
    if let Some(wait) = error.retry_after() {
        eprintln!("   Retry in: {}s", wait.as_secs().max(1));
    } else if error.retryable {
        eprintln!("   Retryable: yes (attempt {})", result.status.retry_count);
    }
    eprintln!(
        "   Status:   {} (age {})",
        result.status.status(),
        format_age(result.status.age_hours)
    );
}
