use cartographer::core::models::kind::ModelKind;
use cartographer::engine::config::PredictionConfig;
use std::path::PathBuf;

use crate::cli::InstallTarget;

/// How install locations are looked up on this machine.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSettings {
    /// Interpreter queried for its site-packages directories.
    pub python: String,
    /// Used instead of querying the interpreter when set.
    pub site_packages: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PredictAppConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub model_name: Option<String>,
    pub model_path: Option<PathBuf>,
    pub save_raw: Option<PathBuf>,
    pub save_interpolated: Option<PathBuf>,
    pub core_config: PredictionConfig,
    pub locations: LocationSettings,
}

#[derive(Debug, Clone)]
pub struct InstallAppConfig {
    pub models: Vec<ModelKind>,
    pub target: InstallTarget,
    pub reinstall: bool,
    pub base_url: String,
    pub locations: LocationSettings,
}
