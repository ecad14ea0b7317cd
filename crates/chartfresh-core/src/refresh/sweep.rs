//! Periodic re-aging of every chart, plus auto-refresh of charts whose
//! policy asks for it.

use std::time::Duration;

use chartfresh_config::ChartType;
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::freshness::{FreshnessStatus, reevaluate};
use crate::ratelimit::Priority;
use crate::refresh::engine::RefreshEngine;
use crate::refresh::types::RefreshRequest;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusTransition {
    pub chart_type: ChartType,
    pub from: FreshnessStatus,
    pub to: FreshnessStatus,
}

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub transitions: Vec<StatusTransition>,
    pub auto_refreshed: Vec<ChartType>,
}

impl RefreshEngine {
    /// Re-age every chart that is not refreshing, then issue low-priority
    /// refreshes for auto-refresh charts that are not available.
    ///
    /// Auto-refreshes run as spawned tasks; must be called from within a
    /// tokio runtime.
    pub fn sweep(&self) -> SweepReport {
        let now = self.now();
        let mut report = SweepReport::default();
        {
            let mut state = self.lock();
            let queued: Vec<ChartType> = state.queue.iter().map(|r| r.chart_type.clone()).collect();

            for entry in state.registry.iter_mut() {
                if entry.status.refreshing {
                    continue;
                }
                if let Some((from, to)) = reevaluate(&mut entry.status, &entry.policy, now) {
                    info!(
                        event = "core.sweep.transition",
                        chart = %entry.chart_type,
                        from = %from,
                        to = %to,
                    );
                    report.transitions.push(StatusTransition {
                        chart_type: entry.chart_type.clone(),
                        from,
                        to,
                    });
                }

                let wants_refresh = entry.policy.auto_refresh_enabled
                    && entry.capability.can_refresh
                    && entry.status.status() != FreshnessStatus::Available
                    && entry.status.retry_count < entry.policy.max_retries
                    && !queued.contains(&entry.chart_type);
                if wants_refresh {
                    report.auto_refreshed.push(entry.chart_type.clone());
                }
            }
        }

        for chart in &report.auto_refreshed {
            info!(event = "core.sweep.auto_refresh_started", chart = %chart);
            let engine = self.clone();
            let chart = chart.clone();
            tokio::spawn(async move {
                let request = RefreshRequest::new(chart.clone()).priority(Priority::Low);
                let result = engine.request_refresh(request).await;
                debug!(
                    event = "core.sweep.auto_refresh_completed",
                    chart = %chart,
                    success = result.success,
                    code = ?result.error_code(),
                );
            });
        }

        debug!(
            event = "core.sweep.completed",
            transitions = report.transitions.len(),
            auto_refreshed = report.auto_refreshed.len(),
        );
        report
    }
}

/// Sweep every `period` until cancelled. The first sweep runs one period
/// after start.
pub(crate) async fn run(engine: RefreshEngine, period: Duration, cancel: CancellationToken) {
    let Some(start) = Instant::now().checked_add(period) else {
        warn!(
            event = "core.sweep.interval_invalid",
            period_secs = period.as_secs(),
            "Sweep interval out of range - periodic sweep disabled"
        );
        return;
    };
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                engine.sweep();
            }
        }
    }

    debug!(event = "core.sweep.stopped");
}
