use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chartfresh_config::{FreshConfig, SourceDescriptor, SourceKind};
use tracing::warn;

use crate::fetch::command::CommandFetcher;
use crate::fetch::errors::FetchError;
use crate::fetch::file::FileFetcher;
use crate::fetch::traits::{ProgressReporter, SourceFetcher};

/// Maps each source kind to the fetcher that serves it.
#[derive(Clone, Default)]
pub struct FetcherRegistry {
    fetchers: HashMap<SourceKind, Arc<dyn SourceFetcher>>,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in fetchers: files for manual sources, service commands for
    /// API sources, command-then-file for hybrid sources.
    pub fn from_config(config: &FreshConfig) -> Self {
        let file: Arc<dyn SourceFetcher> = Arc::new(FileFetcher::new());
        let command: Arc<dyn SourceFetcher> =
            Arc::new(CommandFetcher::new(config.services.clone()));
        let hybrid = HybridFetcher::new(Arc::clone(&command), Arc::clone(&file));

        Self::new()
            .with(SourceKind::ManualFile, file)
            .with(SourceKind::ApiService, command)
            .with(SourceKind::Hybrid, Arc::new(hybrid))
    }

    pub fn with(mut self, kind: SourceKind, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.register(kind, fetcher);
        self
    }

    pub fn register(&mut self, kind: SourceKind, fetcher: Arc<dyn SourceFetcher>) {
        self.fetchers.insert(kind, fetcher);
    }

    pub fn get(&self, kind: SourceKind) -> Result<Arc<dyn SourceFetcher>, FetchError> {
        self.fetchers
            .get(&kind)
            .cloned()
            .ok_or(FetchError::NoFetcher { kind })
    }
}

/// Tries the service command first when the source names a service, and
/// falls back to the file at `location`.
pub struct HybridFetcher {
    command: Arc<dyn SourceFetcher>,
    file: Arc<dyn SourceFetcher>,
}

impl HybridFetcher {
    pub fn new(command: Arc<dyn SourceFetcher>, file: Arc<dyn SourceFetcher>) -> Self {
        Self { command, file }
    }
}

#[async_trait]
impl SourceFetcher for HybridFetcher {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        progress: &ProgressReporter,
    ) -> Result<u64, FetchError> {
        if source.service_name.is_some() {
            match self.command.fetch(source, progress).await {
                Ok(records) => return Ok(records),
                Err(e) => {
                    warn!(
                        event = "core.fetch.hybrid_fallback",
                        location = %source.location,
                        error = %e,
                        "Service fetch failed - falling back to file"
                    );
                }
            }
        }
        self.file.fetch(source, progress).await
    }
}
