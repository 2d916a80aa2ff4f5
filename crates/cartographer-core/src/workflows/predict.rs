use crate::core::io::ccp4::Ccp4MapFile;
use crate::core::io::mtz::MtzFile;
use crate::core::io::traits::CrystallographicFile;
use crate::core::models::grid::Grid;
use crate::core::transform::{FphiColumns, transform_f_phi_to_map};
use crate::engine::config::{MapConfig, PredictionConfig, TilingConfig};
use crate::engine::error::EngineError;
use crate::engine::model::DensityModel;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::resample::{reinterpolate_to_cell, resample_to_box};
use crate::engine::tiling::{TileLayout, predict_tiles};
use std::path::Path;
use std::time::Instant;
use tracing::{info, instrument};

/// Kind of density input, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Reflection data; the map is computed by Fourier synthesis.
    Mtz,
    /// A CCP4/MRC map, used directly after normalisation.
    Map,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "mtz" => Some(Self::Mtz),
            "map" | "ccp4" | "mrc" => Some(Self::Map),
            _ => None,
        }
    }
}

/// Every intermediate and final map of one prediction.
#[derive(Debug, Clone)]
pub struct PredictionResult {
    /// Density on the crystallographic cell, before resampling.
    pub raw: Grid,
    /// Density on the orthogonal lattice that the model sees.
    pub interpolated: Grid,
    /// Predicted map on the crystallographic cell and space group.
    pub predicted: Grid,
}

#[instrument(skip_all, name = "prediction_workflow")]
pub fn run(
    input: &Path,
    model: &dyn DensityModel,
    config: &PredictionConfig,
    reporter: &ProgressReporter,
) -> Result<PredictionResult, EngineError> {
    let start = Instant::now();
    let raw = reporter.phase("Loading Density", || load_density(input, &config.map))?;
    let result = predict_density(raw, model, &config.tiling, reporter)?;

    let elapsed = start.elapsed().as_secs_f64();
    info!("Prediction took {:.3} s", elapsed);
    reporter.report(Progress::Message(format!(
        "Prediction finished in {:.2} seconds",
        elapsed
    )));
    Ok(result)
}

/// Reads `path` as reflections or as a map and returns the density on the unit cell.
///
/// For MTZ input the resolution cutoff is applied to the reflections before
/// the map is computed. Map input is normalised to mean 0 and rms 1.
pub fn load_density(path: &Path, config: &MapConfig) -> Result<Grid, EngineError> {
    let format =
        InputFormat::from_path(path).ok_or_else(|| EngineError::UnsupportedInput(path.to_path_buf()))?;
    match format {
        InputFormat::Mtz => {
            let mut mtz = MtzFile::read_from_path(path)?;
            info!(
                "Read {} reflections with {} columns from {}",
                mtz.num_reflections(),
                mtz.num_columns(),
                path.display()
            );
            if let Some(cutoff) = config.resolution_cutoff {
                let removed = mtz.apply_resolution_cutoff(cutoff, &config.amplitude_label)?;
                info!("Resolution cutoff at {:.2} Å removed {} reflections", cutoff, removed);
            }
            let columns = FphiColumns {
                amplitude: &config.amplitude_label,
                phase: &config.phase_label,
                sample_rate: config.sample_rate,
            };
            Ok(transform_f_phi_to_map(&mtz, &columns)?)
        }
        InputFormat::Map => {
            let map = Ccp4MapFile::read_from_path(path)?;
            let mut grid = map.grid;
            grid.normalize();
            info!("Read {:?} map from {}", grid.dims(), path.display());
            Ok(grid)
        }
    }
}

/// Runs the model over `raw` and maps the averaged prediction back onto its cell.
pub fn predict_density(
    raw: Grid,
    model: &dyn DensityModel,
    config: &TilingConfig,
    reporter: &ProgressReporter,
) -> Result<PredictionResult, EngineError> {
    info!("Raw unit cell is: {}", raw.cell);
    let boxed = reporter.phase("Resampling", || resample_to_box(&raw, config.grid_spacing))?;

    let layout = TileLayout::new(boxed.grid.dims(), config.stride);
    let prediction = reporter.phase("Predicting", || {
        predict_tiles(&boxed.grid, model, &layout, config.raw_values, reporter)
    })?;

    let predicted = reporter.phase("Reinterpolating", || {
        reinterpolate_to_cell(
            prediction,
            &boxed.origin,
            boxed.spacing,
            &raw.cell,
            &raw.spacegroup,
        )
    })?;

    Ok(PredictionResult {
        raw,
        interpolated: boxed.grid,
        predicted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::ccp4::Ccp4Map;
    use crate::core::io::mtz::tests::sample_mtz;
    use crate::core::models::symmetry::SpaceGroup;
    use crate::core::models::unit_cell::UnitCell;
    use crate::engine::model::ModelError;
    use ndarray::{Array3, Array4, ArrayView3};
    use tempfile::TempDir;

    struct AlwaysClassOne;

    impl DensityModel for AlwaysClassOne {
        fn predict(&self, tile: ArrayView3<f32>) -> Result<Array4<f32>, ModelError> {
            let (x, y, z) = tile.dim();
            Ok(Array4::from_shape_fn((x, y, z, 3), |(_, _, _, c)| {
                if c == 1 { 0.8 } else { 0.1 }
            }))
        }
    }

    fn write_mtz(dir: &TempDir, rows: &[[f32; 5]]) -> std::path::PathBuf {
        let path = dir.path().join("input.mtz");
        MtzFile::write_to_path(&sample_mtz(rows, SpaceGroup::p1()), &path).unwrap();
        path
    }

    #[test]
    fn input_format_follows_the_extension() {
        assert_eq!(InputFormat::from_path(Path::new("a/b.mtz")), Some(InputFormat::Mtz));
        assert_eq!(InputFormat::from_path(Path::new("b.MAP")), Some(InputFormat::Map));
        assert_eq!(InputFormat::from_path(Path::new("b.ccp4")), Some(InputFormat::Map));
        assert_eq!(InputFormat::from_path(Path::new("b.mrc")), Some(InputFormat::Map));
        assert_eq!(InputFormat::from_path(Path::new("b.pdb")), None);
        assert_eq!(InputFormat::from_path(Path::new("mtz")), None);
    }

    #[test]
    fn unsupported_input_is_rejected_before_reading() {
        let err = load_density(Path::new("missing.txt"), &PredictionConfig::default().map)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedInput(_)));
    }

    #[test]
    fn resolution_cutoff_is_applied_before_the_transform() {
        let dir = TempDir::new().unwrap();
        let path = write_mtz(&dir, &[[1.0, 0.0, 0.0, 10.0, 0.0], [5.0, 0.0, 0.0, 10.0, 0.0]]);
        let mut config = PredictionConfig::default().map;

        let full = load_density(&path, &config).unwrap();
        config.resolution_cutoff = Some(5.0);
        let cut = load_density(&path, &config).unwrap();

        // d(5,0,0) = 4 Å is removed, leaving only the first harmonic.
        assert_eq!(full.dims()[0], 12);
        assert_eq!(cut.dims()[0], 3);
    }

    #[test]
    fn map_input_is_normalised() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("input.ccp4");
        let cell = UnitCell::orthorhombic(10.0, 10.0, 10.0).unwrap();
        let data = Array3::from_shape_fn((4, 4, 4), |(u, v, w)| (u + v * w) as f32 * 3.0 + 7.0);
        let map = Ccp4Map::new(Grid::new(data, cell, SpaceGroup::p1()));
        Ccp4MapFile::write_to_path(&map, &path).unwrap();

        let grid = load_density(&path, &PredictionConfig::default().map).unwrap();
        let stats = grid.statistics();
        assert!(stats.mean.abs() < 1e-5);
        assert!((stats.rms - 1.0).abs() < 1e-5);
    }

    #[test]
    fn full_run_predicts_on_the_original_cell() {
        let dir = TempDir::new().unwrap();
        let path = write_mtz(
            &dir,
            &[
                [1.0, 0.0, 0.0, 10.0, 0.0],
                [0.0, 1.0, 1.0, 8.0, 60.0],
                [2.0, 1.0, 3.0, 5.0, 200.0],
            ],
        );
        let config = PredictionConfig::default();
        let result = run(&path, &AlwaysClassOne, &config, &ProgressReporter::new()).unwrap();

        assert_eq!(result.interpolated.dims(), [28, 42, 57]);
        assert_eq!(result.predicted.dims(), [30, 45, 60]);
        assert!((result.predicted.cell.c - 40.0).abs() < 1e-4);
        assert!(result.predicted.data.iter().all(|&v| (v - 1.0).abs() < 1e-5));
    }

    #[test]
    fn full_run_reports_phases_in_order() {
        use std::sync::Mutex;
        let dir = TempDir::new().unwrap();
        let path = write_mtz(&dir, &[[1.0, 1.0, 1.0, 10.0, 0.0]]);
        let phases = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::PhaseStart { name } = event {
                phases.lock().unwrap().push(name);
            }
        }));
        run(&path, &AlwaysClassOne, &PredictionConfig::default(), &reporter).unwrap();
        drop(reporter);
        assert_eq!(
            phases.into_inner().unwrap(),
            vec!["Loading Density", "Resampling", "Predicting", "Reinterpolating"]
        );
    }
}
