use crate::error::{CliError, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FilePredictionConfig {
    pub grid_spacing: Option<f64>,
    pub stride: Option<usize>,
    pub sample_rate: Option<f64>,
    pub default_intensity: Option<String>,
    pub default_phase: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileInstallConfig {
    pub base_url: Option<String>,
    pub python: Option<String>,
    pub site_packages: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub prediction: Option<FilePredictionConfig>,
    pub install: Option<FileInstallConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|source| CliError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Reads `explicit` if given, otherwise the per-user config file if it exists.
    ///
    /// An explicit path that cannot be read is an error; a missing per-user
    /// file yields the empty configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => {
                debug!("No configuration file found, using built-in defaults.");
                Ok(Self::default())
            }
        }
    }
}

/// `<config-dir>/cartographer/config.toml` on this platform.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("uk.ac", "york", "cartographer")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn full_file_parses_with_kebab_case_keys() {
        let config = FileConfig::from_toml(
            r#"
            [prediction]
            grid-spacing = 0.5
            stride = 8
            sample-rate = 1.5
            default-intensity = "FP"
            default-phase = "PHIC"

            [install]
            base-url = "http://localhost:8000/models"
            python = "python3.11"
            site-packages = "/opt/venv/lib/site-packages"
            "#,
        )
        .unwrap();

        let prediction = config.prediction.unwrap();
        assert_eq!(prediction.grid_spacing, Some(0.5));
        assert_eq!(prediction.stride, Some(8));
        assert_eq!(prediction.default_phase.as_deref(), Some("PHIC"));
        let install = config.install.unwrap();
        assert_eq!(install.python.as_deref(), Some("python3.11"));
        assert_eq!(
            install.site_packages,
            Some(PathBuf::from("/opt/venv/lib/site-packages"))
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FileConfig::from_toml("[prediction]\ngrid_spacing = 0.5\n").is_err());
        assert!(FileConfig::from_toml("[output]\npath = 'x'\n").is_err());
    }

    #[test]
    fn empty_file_is_the_default_config() {
        assert_eq!(FileConfig::from_toml("").unwrap(), FileConfig::default());
    }

    #[test]
    fn invalid_file_reports_its_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[prediction\nstride = ").unwrap();

        let err = FileConfig::load(Some(&path)).unwrap_err();
        match err {
            CliError::ConfigFile { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn explicit_missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let err = FileConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }
}
