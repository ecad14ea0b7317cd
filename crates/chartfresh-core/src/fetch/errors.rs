use chartfresh_config::SourceKind;

use crate::errors::FreshError;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Source file not found: {location}")]
    NotFound { location: String },

    #[error("Failed to read '{location}': {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{location}': {message}")]
    Parse { location: String, message: String },

    #[error("Service '{service}' is not configured")]
    ServiceNotFound { service: String },

    #[error("Service '{service}' has no fetch command configured")]
    NoCommand { service: String },

    #[error("Failed to run '{program}': {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with status {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: i32,
        stderr: String,
    },

    #[error("No fetcher registered for {kind} sources")]
    NoFetcher { kind: SourceKind },
}

impl FreshError for FetchError {
    fn error_code(&self) -> &'static str {
        match self {
            FetchError::NotFound { .. } => "FETCH_NOT_FOUND",
            FetchError::Io { .. } => "FETCH_IO_ERROR",
            FetchError::Parse { .. } => "FETCH_PARSE_ERROR",
            FetchError::ServiceNotFound { .. } => "SERVICE_NOT_FOUND",
            FetchError::NoCommand { .. } => "FETCH_NO_COMMAND",
            FetchError::CommandSpawn { .. } => "FETCH_COMMAND_SPAWN_FAILED",
            FetchError::CommandFailed { .. } => "FETCH_COMMAND_FAILED",
            FetchError::NoFetcher { .. } => "FETCH_NO_FETCHER",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            FetchError::NotFound { .. }
                | FetchError::ServiceNotFound { .. }
                | FetchError::NoCommand { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let error = FetchError::CommandFailed {
            program: "quotes".to_string(),
            status: 2,
            stderr: "bad ticker".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "'quotes' exited with status 2: bad ticker"
        );
        assert_eq!(error.error_code(), "FETCH_COMMAND_FAILED");
        assert!(!error.is_user_error());
    }

    #[test]
    fn test_no_fetcher_names_kind() {
        let error = FetchError::NoFetcher {
            kind: SourceKind::Hybrid,
        };
        assert_eq!(error.to_string(), "No fetcher registered for hybrid sources");
    }
}
