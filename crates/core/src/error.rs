//! Error types for the Walnut core

use thiserror::Error;

use crate::dispatch::HookFailure;
use crate::driver::DriverError;

/// Result type alias using the Walnut core error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A fatal hook failure propagated to the runner
    #[error(transparent)]
    Hook(#[from] HookFailure),

    #[error("Timeout after {ms} ms: {title}")]
    Timeout { title: String, ms: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Suite file parse error: {0}")]
    SpecParse(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
