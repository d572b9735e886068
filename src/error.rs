use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedmixError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("An optimization run is already in progress")]
    AlreadyRunning,

    #[error("No optimization run is in progress")]
    NotRunning,

    #[error("Run failed: {0}")]
    RunFailure(String),

    #[error("Result not ready yet")]
    NotReady,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config source error: {0}")]
    ConfigSource(#[from] config::ConfigError),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

impl FeedmixError {
    /// Short machine-readable kind used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedmixError::InvalidInput(_) => "invalid_input",
            FeedmixError::AlreadyRunning => "already_running",
            FeedmixError::NotRunning => "not_running",
            FeedmixError::RunFailure(_) => "run_failure",
            FeedmixError::NotReady => "not_ready",
            FeedmixError::Configuration(_)
            | FeedmixError::ConfigSource(_)
            | FeedmixError::TomlSer(_)
            | FeedmixError::TomlDe(_) => "configuration",
            FeedmixError::Io(_) | FeedmixError::Serde(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, FeedmixError>;
