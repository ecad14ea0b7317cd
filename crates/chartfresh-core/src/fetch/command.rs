use std::collections::BTreeMap;

use async_trait::async_trait;
use chartfresh_config::{ServiceConfig, SourceDescriptor};
use tokio::process::Command;
use tracing::debug;

use crate::fetch::errors::FetchError;
use crate::fetch::traits::{ProgressReporter, RefreshProgress, SourceFetcher};

/// Runs a service's configured command and counts the non-empty lines it
/// prints on stdout.
///
/// The service is `service_name`, or `location` when no name is given. The
/// child is killed if the fetch future is dropped, so a fetch timeout does
/// not leave it running.
#[derive(Debug, Clone, Default)]
pub struct CommandFetcher {
    services: BTreeMap<String, ServiceConfig>,
}

impl CommandFetcher {
    pub fn new(services: BTreeMap<String, ServiceConfig>) -> Self {
        Self { services }
    }

    fn command_for(&self, service: &str) -> Result<&[String], FetchError> {
        let config = self
            .services
            .get(service)
            .ok_or_else(|| FetchError::ServiceNotFound {
                service: service.to_string(),
            })?;
        match config.command.as_deref() {
            Some(argv) if !argv.is_empty() => Ok(argv),
            _ => Err(FetchError::NoCommand {
                service: service.to_string(),
            }),
        }
    }
}

#[async_trait]
impl SourceFetcher for CommandFetcher {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        progress: &ProgressReporter,
    ) -> Result<u64, FetchError> {
        let service = source.service_name.as_deref().unwrap_or(&source.location);
        let argv = self.command_for(service)?;
        let (program, args) = (&argv[0], &argv[1..]);

        progress.report(RefreshProgress::Connecting);
        let mut cmd = Command::new(program);
        cmd.args(args).kill_on_drop(true);

        progress.report(RefreshProgress::Downloading);
        let output = cmd.output().await.map_err(|e| FetchError::CommandSpawn {
            program: program.clone(),
            source: e,
        })?;

        if !output.status.success() {
            return Err(FetchError::CommandFailed {
                program: program.clone(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        progress.report(RefreshProgress::Parsing);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let records = stdout.lines().filter(|l| !l.trim().is_empty()).count() as u64;

        debug!(
            event = "core.fetch.command_completed",
            service = service,
            program = %program,
            records = records,
        );
        Ok(records)
    }
}
