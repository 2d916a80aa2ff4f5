use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileInstallConfig};
use super::models::{InstallAppConfig, LocationSettings, PredictAppConfig};
use crate::cli::{InstallCli, PredictCli};
use crate::error::{CliError, Result};
use cartographer::engine::config::PredictionConfigBuilder;
use tracing::debug;

pub fn build_predict_config(args: &PredictCli, mut file_config: FileConfig) -> Result<PredictAppConfig> {
    let defaults = DefaultsConfig::default();
    let prediction_file = file_config.prediction.take().unwrap_or_default();
    let install_file = file_config.install.take().unwrap_or_default();

    let amplitude_label = args
        .intensity
        .clone()
        .or(prediction_file.default_intensity)
        .unwrap_or(defaults.intensity.clone());
    let phase_label = args
        .phase
        .clone()
        .or(prediction_file.default_phase)
        .unwrap_or(defaults.phase.clone());

    let core_config = PredictionConfigBuilder::new()
        .amplitude_label(amplitude_label)
        .phase_label(phase_label)
        .resolution_cutoff(args.resolution)
        .sample_rate(prediction_file.sample_rate.unwrap_or(defaults.sample_rate))
        .grid_spacing(prediction_file.grid_spacing.unwrap_or(defaults.grid_spacing))
        .stride(prediction_file.stride.unwrap_or(defaults.stride))
        .raw_values(args.raw_values)
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;
    debug!("Prediction configuration: {:?}", core_config);

    Ok(PredictAppConfig {
        input_path: args.input.clone(),
        output_path: args.output.clone(),
        model_name: args.model.clone(),
        model_path: args.model_path.clone(),
        save_raw: args.save_raw.clone(),
        save_interpolated: args.save_interpolated.clone(),
        core_config,
        locations: merge_locations(&install_file, &defaults),
    })
}

pub fn build_install_config(args: &InstallCli, mut file_config: FileConfig) -> Result<InstallAppConfig> {
    let defaults = DefaultsConfig::default();
    let install_file = file_config.install.take().unwrap_or_default();

    let base_url = install_file
        .base_url
        .clone()
        .unwrap_or(defaults.base_url.clone());
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(CliError::Config(format!(
            "install.base-url must be an http(s) URL, got '{}'",
            base_url
        )));
    }

    Ok(InstallAppConfig {
        models: args.selected_models(),
        target: args.output,
        reinstall: args.reinstall,
        base_url,
        locations: merge_locations(&install_file, &defaults),
    })
}

fn merge_locations(file: &FileInstallConfig, defaults: &DefaultsConfig) -> LocationSettings {
    LocationSettings {
        python: file.python.clone().unwrap_or(defaults.python.clone()),
        site_packages: file.site_packages.clone(),
    }
}
