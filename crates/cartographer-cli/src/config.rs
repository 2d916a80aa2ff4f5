//! Layered configuration: command line arguments over an optional TOML file over built-in defaults.

pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;

pub use builder::{build_install_config, build_predict_config};
pub use file::FileConfig;
pub use models::{InstallAppConfig, LocationSettings, PredictAppConfig};
