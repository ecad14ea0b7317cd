use std::error::Error;

/// Base trait for all engine errors
pub trait FreshError: Error + Send + Sync + 'static {
    /// Error code for programmatic handling
    fn error_code(&self) -> &'static str;

    /// Whether this error should be logged as an error or warning
    fn is_user_error(&self) -> bool {
        false
    }
}

/// Common result type for the engine
pub type FreshResult<T> = Result<T, Box<dyn FreshError>>;

impl FreshError for chartfresh_config::ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            chartfresh_config::ConfigError::ConfigParseError { .. } => "CONFIG_PARSE_ERROR",
            chartfresh_config::ConfigError::InvalidConfiguration { .. } => {
                "INVALID_CONFIGURATION"
            }
            chartfresh_config::ConfigError::HomeNotFound => "HOME_NOT_FOUND",
            chartfresh_config::ConfigError::IoError { .. } => "CONFIG_IO_ERROR",
        }
    }

    fn is_user_error(&self) -> bool {
        matches!(
            self,
            chartfresh_config::ConfigError::ConfigParseError { .. }
                | chartfresh_config::ConfigError::InvalidConfiguration { .. }
        )
    }
}

/// Errors raised while building or starting the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid engine configuration: {0}")]
    Config(#[from] chartfresh_config::ConfigError),

    #[error("Engine already started")]
    AlreadyStarted,
}

impl FreshError for EngineError {
    fn error_code(&self) -> &'static str {
        match self {
            EngineError::Config(e) => e.error_code(),
            EngineError::AlreadyStarted => "ENGINE_ALREADY_STARTED",
        }
    }

    fn is_user_error(&self) -> bool {
        match self {
            EngineError::Config(e) => e.is_user_error(),
            EngineError::AlreadyStarted => false,
        }
    }
}
