use cartographer::core::io::ccp4::Ccp4Error;
use cartographer::engine::error::EngineError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] EngineError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file '{path}': {source}", path = path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(
        "Input file '{path}' could not be found (working directory: {cwd})",
        path = path.display(),
        cwd = cwd.display()
    )]
    InputNotFound { path: PathBuf, cwd: PathBuf },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to write map '{path}': {source}", path = path.display())]
    MapWrite {
        path: PathBuf,
        #[source]
        source: Ccp4Error,
    },

    #[error("Installation error: {0}")]
    Install(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
