use std::sync::Arc;

use async_trait::async_trait;
use chartfresh_config::SourceDescriptor;
use tracing::debug;

use crate::fetch::errors::FetchError;
use crate::fetch::traits::{ProgressReporter, RefreshProgress, SourceFetcher};

/// Turns raw source bytes into a record count.
pub trait RecordParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<u64, String>;
}

/// Counts non-empty data rows of a CSV file, excluding the header row.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvRowCounter;

impl RecordParser for CsvRowCounter {
    fn parse(&self, bytes: &[u8]) -> Result<u64, String> {
        let text = std::str::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {}", e))?;
        let rows = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .skip(1)
            .count();
        Ok(rows as u64)
    }
}

/// Reads a local file named by the source's `location`.
#[derive(Clone)]
pub struct FileFetcher {
    parser: Arc<dyn RecordParser>,
}

impl Default for FileFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::with_parser(Arc::new(CsvRowCounter))
    }

    pub fn with_parser(parser: Arc<dyn RecordParser>) -> Self {
        Self { parser }
    }
}

#[async_trait]
impl SourceFetcher for FileFetcher {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        progress: &ProgressReporter,
    ) -> Result<u64, FetchError> {
        let location = source.location.as_str();

        progress.report(RefreshProgress::Connecting);
        progress.report(RefreshProgress::Downloading);
        let bytes = tokio::fs::read(location).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound {
                    location: location.to_string(),
                }
            } else {
                FetchError::Io {
                    location: location.to_string(),
                    source: e,
                }
            }
        })?;

        progress.report(RefreshProgress::Parsing);
        let records = self
            .parser
            .parse(&bytes)
            .map_err(|message| FetchError::Parse {
                location: location.to_string(),
                message,
            })?;

        debug!(
            event = "core.fetch.file_read",
            location = location,
            bytes = bytes.len(),
            records = records,
        );
        Ok(records)
    }
}
