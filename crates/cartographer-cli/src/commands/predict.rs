use crate::config::PredictAppConfig;
use crate::error::{CliError, Result};
use crate::locations::{Environment, SearchPaths, find_model};
use crate::utils::progress::CliProgressHandler;
use cartographer::{
    core::io::{
        ccp4::{Ccp4Map, Ccp4MapFile},
        traits::CrystallographicFile,
    },
    core::models::grid::Grid,
    engine::{error::EngineError, model::load_model, progress::ProgressReporter},
    workflows,
};
use std::path::Path;
use std::time::Instant;
use tracing::info;

pub async fn run(config: PredictAppConfig) -> Result<()> {
    let start = Instant::now();

    if !config.input_path.is_file() {
        return Err(CliError::InputNotFound {
            path: config.input_path.clone(),
            cwd: std::env::current_dir()?,
        });
    }

    let search = SearchPaths::resolve(&config.locations, &Environment::from_process());
    let model_path = find_model(config.model_path.as_deref(), config.model_name.as_deref(), &search)?;
    info!("Using model {:?}", &model_path);

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Predicting {} with {}", config.input_path.display(), model_path.display());
    let result = tokio::task::block_in_place(|| {
        let model = load_model(&model_path).map_err(EngineError::from)?;
        workflows::predict::run(&config.input_path, model.as_ref(), &config.core_config, &reporter)
    })?;

    if let Some(path) = &config.save_raw {
        write_map(&result.raw, path, "Cartographer raw density")?;
        println!("Raw map written to: {}", path.display());
    }
    if let Some(path) = &config.save_interpolated {
        write_map(&result.interpolated, path, "Cartographer interpolated density")?;
        println!("Interpolated map written to: {}", path.display());
    }

    let label = format!("Cartographer prediction ({})", model_name(&model_path));
    write_map(&result.predicted, &config.output_path, &label)?;
    println!("✓ Predicted map written to: {}", config.output_path.display());

    let elapsed = start.elapsed().as_secs_f64();
    info!("Total time: {:.3} s", elapsed);
    println!(
        "Time taken: {:.2} seconds / {:.2} minutes",
        elapsed,
        elapsed / 60.0
    );
    Ok(())
}

fn write_map(grid: &Grid, path: &Path, label: &str) -> Result<()> {
    info!("Writing {:?} map to {:?}", grid.dims(), path);
    let map = Ccp4Map::new(grid.clone()).with_label(label);
    Ccp4MapFile::write_to_path(&map, path).map_err(|source| CliError::MapWrite {
        path: path.to_path_buf(),
        source,
    })
}

fn model_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("model")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocationSettings;
    use cartographer::core::models::{symmetry::SpaceGroup, unit_cell::UnitCell};
    use cartographer::engine::config::PredictionConfig;
    use ndarray::Array3;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn config(input: PathBuf, output: PathBuf, site_packages: &Path) -> PredictAppConfig {
        PredictAppConfig {
            input_path: input,
            output_path: output,
            model_name: None,
            model_path: None,
            save_raw: None,
            save_interpolated: None,
            core_config: PredictionConfig::default(),
            locations: LocationSettings {
                python: "python3".to_string(),
                site_packages: Some(site_packages.to_path_buf()),
            },
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_input_names_the_path() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("absent.mtz");
        let err = run(config(input, dir.path().join("out.map"), dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::InputNotFound { .. }));
        assert!(err.to_string().contains("absent.mtz"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn directory_input_is_not_a_reflection_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("x.mtz");
        std::fs::create_dir(&input).unwrap();
        let err = run(config(input, dir.path().join("out.map"), dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::InputNotFound { .. }));
        assert!(!dir.path().join("out.map").exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_model_is_reported_before_any_work() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.mtz");
        std::fs::write(&input, b"not read").unwrap();
        let mut cfg = config(input, dir.path().join("out.map"), dir.path());
        cfg.model_path = Some(dir.path().join("missing.onnx"));

        let err = run(cfg).await.unwrap_err();
        assert!(matches!(err, CliError::ModelNotFound(_)));
        assert!(!dir.path().join("out.map").exists());
    }

    #[test]
    fn written_maps_carry_a_label_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.ccp4");
        let cell = UnitCell::orthorhombic(12.0, 12.0, 12.0).unwrap();
        let grid = Grid::new(
            Array3::from_shape_fn((4, 4, 4), |(u, _, _)| u as f32),
            cell,
            SpaceGroup::p1(),
        );

        write_map(&grid, &path, "label").unwrap();
        let map = Ccp4MapFile::read_from_path(&path).unwrap();
        assert_eq!(map.labels, vec!["label".to_string()]);
        assert_eq!(map.grid.dims(), [4, 4, 4]);
        assert_eq!(model_name(Path::new("/m/phos.onnx")), "phos");
    }
}
