use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::FreshError;
use crate::monitor::types::{ResourceId, ResourceSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Cannot stat resource '{resource}': {source}")]
    Io {
        resource: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource '{resource}' is unreachable: {message}")]
    Unreachable { resource: String, message: String },
}

impl FreshError for SnapshotError {
    fn error_code(&self) -> &'static str {
        match self {
            SnapshotError::Io { .. } => "SNAPSHOT_IO_ERROR",
            SnapshotError::Unreachable { .. } => "SNAPSHOT_UNREACHABLE",
        }
    }
}

/// Source of resource snapshots for the change monitor.
///
/// An `Err` is treated as "resource vanished" by the monitor.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self, resource: &ResourceId) -> Result<ResourceSnapshot, SnapshotError>;
}

/// stat()-based snapshots of local files.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSnapshotProvider;

#[async_trait]
impl SnapshotProvider for FsSnapshotProvider {
    async fn snapshot(&self, resource: &ResourceId) -> Result<ResourceSnapshot, SnapshotError> {
        match tokio::fs::metadata(resource.as_path()).await {
            Ok(meta) => {
                let modified = meta.modified().ok().map(DateTime::<Utc>::from);
                Ok(ResourceSnapshot::present(meta.len(), modified))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ResourceSnapshot::absent()),
            Err(e) => Err(SnapshotError::Io {
                resource: resource.to_string(),
                source: e,
            }),
        }
    }
}
