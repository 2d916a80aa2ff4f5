use super::error::EngineError;
use super::model::{DensityModel, ModelError};
use super::progress::{Progress, ProgressReporter};
use crate::core::models::grid::Grid;
use itertools::iproduct;
use ndarray::{Array3, Array4, ArrayView1, Axis, s};
use tracing::{debug, info};

/// Edge length of the cubic tiles passed to the model.
pub const TILE_SIZE: usize = 32;

/// Placement of overlapping tiles over a grid of `dims` points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayout {
    pub dims: [usize; 3],
    pub stride: usize,
}

impl TileLayout {
    pub fn new(dims: [usize; 3], stride: usize) -> Self {
        Self { dims, stride }
    }

    /// Tile origins `x·stride` for `x` in `0..=n/stride` along every axis.
    pub fn translations(&self) -> Vec<[usize; 3]> {
        let steps = self.dims.map(|n| n / self.stride + 1);
        iproduct!(0..steps[0], 0..steps[1], 0..steps[2])
            .map(|(x, y, z)| [x * self.stride, y * self.stride, z * self.stride])
            .collect()
    }

    /// Number of whole tiles per axis, `n/32 + 1`.
    pub fn blocks(&self) -> [usize; 3] {
        self.dims.map(|n| n / TILE_SIZE + 1)
    }

    /// Shape of the averaged prediction.
    pub fn output_dims(&self) -> [usize; 3] {
        self.blocks().map(|b| b * TILE_SIZE)
    }

    /// Shape of the accumulation buffers, large enough for the last tile on every axis.
    pub fn accumulator_dims(&self) -> [usize; 3] {
        self.output_dims().map(|n| n + TILE_SIZE - self.stride)
    }
}

/// Runs `model` over every tile of `grid` and averages the overlapping outputs.
///
/// Tiles are read with periodic wrapping. A tile whose values are all zero
/// counts towards the average with a zero contribution and is not sent to the
/// model. Each evaluated tile contributes its arg-max class per voxel, or the
/// class-1 score when `raw_values` is set. The result has shape
/// [`TileLayout::output_dims`].
pub fn predict_tiles(
    grid: &Grid,
    model: &dyn DensityModel,
    layout: &TileLayout,
    raw_values: bool,
    reporter: &ProgressReporter,
) -> Result<Array3<f32>, EngineError> {
    let translations = layout.translations();
    let acc_dims = layout.accumulator_dims();
    let mut sum = Array3::<f32>::zeros(acc_dims);
    let mut count = Array3::<f32>::zeros(acc_dims);
    info!(
        "Predicting {} tiles over a {}x{}x{} grid",
        translations.len(),
        layout.dims[0],
        layout.dims[1],
        layout.dims[2]
    );

    reporter.report(Progress::TaskStart {
        total_steps: translations.len() as u64,
    });
    let mut skipped = 0usize;
    for &[x, y, z] in &translations {
        let tile = grid.subarray([x, y, z], [TILE_SIZE; 3]);
        let window = s![x..x + TILE_SIZE, y..y + TILE_SIZE, z..z + TILE_SIZE];

        if tile.iter().any(|&v| v != 0.0) {
            let scores = model.predict(tile.view())?;
            let contribution = classify(&scores, raw_values)?;
            let mut target = sum.slice_mut(window);
            target += &contribution;
        } else {
            skipped += 1;
        }
        let mut counted = count.slice_mut(window);
        counted += 1.0;
        reporter.report(Progress::TaskIncrement);
    }
    reporter.report(Progress::TaskFinish);
    debug!("{} empty tiles skipped", skipped);

    let [ox, oy, oz] = layout.output_dims();
    let crop = s![..ox, ..oy, ..oz];
    Ok(&sum.slice(crop) / &count.slice(crop))
}

/// Reduces `[n, n, n, classes]` scores to one value per voxel.
fn classify(scores: &Array4<f32>, raw_values: bool) -> Result<Array3<f32>, ModelError> {
    let (nx, ny, nz, classes) = scores.dim();
    if [nx, ny, nz] != [TILE_SIZE; 3] || classes == 0 || (raw_values && classes < 2) {
        return Err(ModelError::OutputShape {
            expected: format!(
                "[{TILE_SIZE}, {TILE_SIZE}, {TILE_SIZE}, {}]",
                if raw_values { ">=2" } else { ">=1" }
            ),
            found: vec![nx, ny, nz, classes],
        });
    }
    if raw_values {
        Ok(scores.index_axis(Axis(3), 1).to_owned())
    } else {
        Ok(scores.map_axis(Axis(3), argmax))
    }
}

fn argmax(lane: ArrayView1<f32>) -> f32 {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (i, &v) in lane.iter().enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best as f32
}
