use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse freshness classification reported to consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessStatus {
    Available,
    Stale,
    Error,
    Missing,
}

impl fmt::Display for FreshnessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreshnessStatus::Available => write!(f, "available"),
            FreshnessStatus::Stale => write!(f, "stale"),
            FreshnessStatus::Error => write!(f, "error"),
            FreshnessStatus::Missing => write!(f, "missing"),
        }
    }
}

/// What produced the most recent data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LastUpdateSource {
    #[default]
    None,
    Manual,
    Api,
}

impl fmt::Display for LastUpdateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastUpdateSource::None => write!(f, "none"),
            LastUpdateSource::Manual => write!(f, "manual"),
            LastUpdateSource::Api => write!(f, "api"),
        }
    }
}

/// Freshness state with exactly the data each state carries.
///
/// `Expired` is an age-based error; `Failed` is a refresh failure and stays
/// in place until a later success, whatever the age of the last good data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DataState {
    Available {
        since: DateTime<Utc>,
    },
    Stale {
        since: DateTime<Utc>,
    },
    Expired {
        since: DateTime<Utc>,
    },
    Failed {
        since: Option<DateTime<Utc>>,
        message: String,
    },
    Missing,
}

impl DataState {
    pub fn status(&self) -> FreshnessStatus {
        match self {
            DataState::Available { .. } => FreshnessStatus::Available,
            DataState::Stale { .. } => FreshnessStatus::Stale,
            DataState::Expired { .. } | DataState::Failed { .. } => FreshnessStatus::Error,
            DataState::Missing => FreshnessStatus::Missing,
        }
    }

    /// Timestamp of the last good data, if any.
    pub fn since(&self) -> Option<DateTime<Utc>> {
        match self {
            DataState::Available { since }
            | DataState::Stale { since }
            | DataState::Expired { since } => Some(*since),
            DataState::Failed { since, .. } => *since,
            DataState::Missing => None,
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            DataState::Failed { message, .. } => Some(message),
            _ => None,
        }
    }
}

/// Live status of one chart. Written only by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceStatus {
    pub state: DataState,
    /// Age of the last good data in hours, as of the last evaluation.
    pub age_hours: Option<f64>,
    pub retry_count: u32,
    pub refreshing: bool,
    pub last_update_source: LastUpdateSource,
}

impl DataSourceStatus {
    pub fn missing() -> Self {
        Self {
            state: DataState::Missing,
            age_hours: None,
            retry_count: 0,
            refreshing: false,
            last_update_source: LastUpdateSource::None,
        }
    }

    pub fn status(&self) -> FreshnessStatus {
        self.state.status()
    }

    pub fn last_updated_at(&self) -> Option<DateTime<Utc>> {
        self.state.since()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.state.failure_message()
    }

    /// Record fresh data at `at`. Clears failures and the retry counter.
    pub fn mark_updated(&mut self, at: DateTime<Utc>, source: LastUpdateSource) {
        self.state = DataState::Available { since: at };
        self.age_hours = Some(0.0);
        self.retry_count = 0;
        self.last_update_source = source;
    }

    /// Record a refresh failure. Keeps the timestamp of the last good data.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.state = DataState::Failed {
            since: self.state.since(),
            message: message.into(),
        };
        self.retry_count += 1;
    }
}

impl Default for DataSourceStatus {
    fn default() -> Self {
        Self::missing()
    }
}
