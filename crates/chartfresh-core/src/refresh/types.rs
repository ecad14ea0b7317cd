use std::fmt;
use std::time::Duration;

use chartfresh_config::{ChartType, SourceDescriptor};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::errors::FreshError;
use crate::fetch::RefreshProgress;
use crate::freshness::{DataSourceStatus, LastUpdateSource};
use crate::ratelimit::Priority;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefreshErrorCode {
    RefreshNotAvailable,
    RefreshInProgress,
    RefreshQueued,
    RateLimitExceeded,
    RefreshFailed,
    ServiceNotFound,
}

impl RefreshErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshErrorCode::RefreshNotAvailable => "REFRESH_NOT_AVAILABLE",
            RefreshErrorCode::RefreshInProgress => "REFRESH_IN_PROGRESS",
            RefreshErrorCode::RefreshQueued => "REFRESH_QUEUED",
            RefreshErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            RefreshErrorCode::RefreshFailed => "REFRESH_FAILED",
            RefreshErrorCode::ServiceNotFound => "SERVICE_NOT_FOUND",
        }
    }
}

impl fmt::Display for RefreshErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a refresh did not produce fresh data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct RefreshError {
    pub code: RefreshErrorCode,
    pub message: String,
    pub retryable: bool,
    /// Backoff hint for `RATE_LIMIT_EXCEEDED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl RefreshError {
    pub fn new(code: RefreshErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
            retry_after_ms: None,
        }
    }

    pub fn unknown_chart(chart: &ChartType) -> Self {
        Self::new(
            RefreshErrorCode::RefreshNotAvailable,
            format!("Unknown chart '{}'", chart),
            false,
        )
    }

    pub fn not_available(reason: impl Into<String>) -> Self {
        Self::new(RefreshErrorCode::RefreshNotAvailable, reason, false)
    }

    pub fn in_progress(chart: &ChartType, queued: bool) -> Self {
        let message = if queued {
            format!("A refresh of '{}' is already queued", chart)
        } else {
            format!("A refresh of '{}' is already running", chart)
        };
        Self::new(RefreshErrorCode::RefreshInProgress, message, true)
    }

    pub fn queued(position: usize) -> Self {
        Self::new(
            RefreshErrorCode::RefreshQueued,
            format!("Queued behind {} other refresh(es)", position),
            false,
        )
    }

    pub fn rate_limited(service: &str, wait: Duration) -> Self {
        Self {
            retry_after_ms: Some(wait.as_millis() as u64),
            ..Self::new(
                RefreshErrorCode::RateLimitExceeded,
                format!(
                    "Rate limit for service '{}' reached; retry in {} ms",
                    service,
                    wait.as_millis()
                ),
                true,
            )
        }
    }

    pub fn service_not_found(service: &str) -> Self {
        Self::new(
            RefreshErrorCode::ServiceNotFound,
            format!("Service '{}' is not configured", service),
            false,
        )
    }

    pub fn failed(message: impl Into<String>, retryable: bool) -> Self {
        Self::new(RefreshErrorCode::RefreshFailed, message, retryable)
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after_ms.map(Duration::from_millis)
    }
}

impl FreshError for RefreshError {
    fn error_code(&self) -> &'static str {
        self.code.as_str()
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self.code,
            RefreshErrorCode::RefreshNotAvailable | RefreshErrorCode::ServiceNotFound
        )
    }
}

/// A caller's request to refresh one chart.
///
/// `progress` receives coarse milestones. `completion` receives the final
/// result, including the deferred result of a queued request.
#[derive(Debug)]
pub struct RefreshRequest {
    pub chart_type: ChartType,
    pub force: bool,
    pub priority: Priority,
    pub progress: Option<mpsc::UnboundedSender<RefreshProgress>>,
    pub completion: Option<oneshot::Sender<RefreshResult>>,
}

impl RefreshRequest {
    pub fn new(chart_type: impl Into<ChartType>) -> Self {
        Self {
            chart_type: chart_type.into(),
            force: false,
            priority: Priority::Normal,
            progress: None,
            completion: None,
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<RefreshProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn with_completion(mut self, tx: oneshot::Sender<RefreshResult>) -> Self {
        self.completion = Some(tx);
        self
    }

    /// Deliver the final result to the completion channel, if any.
    pub(crate) fn complete(&mut self, result: &RefreshResult) {
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(result.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshResult {
    pub success: bool,
    pub status: DataSourceStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_updated: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RefreshError>,
    /// `None` only for unknown charts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceDescriptor>,
}

impl RefreshResult {
    pub fn succeeded(
        status: DataSourceStatus,
        source: SourceDescriptor,
        records_updated: u64,
        duration_ms: u64,
    ) -> Self {
        Self {
            success: true,
            status,
            duration_ms,
            records_updated: Some(records_updated),
            error: None,
            source: Some(source),
        }
    }

    pub fn failed(
        status: DataSourceStatus,
        source: Option<SourceDescriptor>,
        error: RefreshError,
        duration_ms: u64,
    ) -> Self {
        Self {
            success: false,
            status,
            duration_ms,
            records_updated: None,
            error: Some(error),
            source,
        }
    }

    pub fn error_code(&self) -> Option<RefreshErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }

    /// Accepted but waiting for capacity; not a failure.
    pub fn is_deferred(&self) -> bool {
        self.error_code() == Some(RefreshErrorCode::RefreshQueued)
    }

    pub fn is_retryable(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.retryable)
    }
}

/// Published to subscribers when a chart becomes available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshNotification {
    pub chart_type: ChartType,
    pub status: DataSourceStatus,
    /// `api` after a refresh through a service, `manual` after a file change.
    pub source: LastUpdateSource,
}
