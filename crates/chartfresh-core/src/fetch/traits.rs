use async_trait::async_trait;
use chartfresh_config::SourceDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;

use crate::fetch::errors::FetchError;

/// Coarse refresh milestones. Observability only; they never gate work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshProgress {
    Connecting,
    Downloading,
    Parsing,
    Caching,
}

impl fmt::Display for RefreshProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshProgress::Connecting => write!(f, "connecting"),
            RefreshProgress::Downloading => write!(f, "downloading"),
            RefreshProgress::Parsing => write!(f, "parsing"),
            RefreshProgress::Caching => write!(f, "caching"),
        }
    }
}

/// Sends progress milestones to whoever asked for them, if anyone.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<UnboundedSender<RefreshProgress>>,
}

impl ProgressReporter {
    pub fn new(tx: Option<UnboundedSender<RefreshProgress>>) -> Self {
        Self { tx }
    }

    pub fn silent() -> Self {
        Self { tx: None }
    }

    /// A dropped receiver is ignored.
    pub fn report(&self, stage: RefreshProgress) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(stage);
        }
    }
}

/// Performs the actual data fetch for a source.
///
/// Returns the number of records updated.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        progress: &ProgressReporter,
    ) -> Result<u64, FetchError>;
}
