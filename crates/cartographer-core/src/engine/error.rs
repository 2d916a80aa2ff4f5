use std::path::PathBuf;
use thiserror::Error;

use super::config::ConfigError;
use super::model::ModelError;
use crate::core::io::ccp4::Ccp4Error;
use crate::core::io::mtz::MtzError;
use crate::core::transform::TransformError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to read reflection file: {source}")]
    Mtz {
        #[from]
        source: MtzError,
    },

    #[error("Failed to read or write map file: {source}")]
    Map {
        #[from]
        source: Ccp4Error,
    },

    #[error("Fourier synthesis failed: {source}")]
    Transform {
        #[from]
        source: TransformError,
    },

    #[error("Model evaluation failed: {source}")]
    Model {
        #[from]
        source: ModelError,
    },

    #[error("The input file is not an MTZ or map file: {}", .0.display())]
    UnsupportedInput(PathBuf),

    #[error("Resampling failed: {0}")]
    Resampling(String),
}
