use super::error::EngineError;
use crate::core::models::grid::Grid;
use crate::core::models::symmetry::SpaceGroup;
use crate::core::models::unit_cell::UnitCell;
use nalgebra::{Point3, Vector3};
use ndarray::Array3;
use tracing::debug;

#[cfg(feature = "parallel")]
use ndarray::Zip;

/// A density grid resampled onto an orthogonal lattice covering the bounding box of a unit cell.
#[derive(Debug, Clone, PartialEq)]
pub struct OrthogonalBox {
    /// P1 grid whose cell spans the bounding box.
    pub grid: Grid,
    /// Orthogonal position (Å) of grid point `(0, 0, 0)`.
    pub origin: Point3<f64>,
    pub spacing: f64,
}

/// Samples `raw` at `spacing` Å over the bounding box of its unit cell.
///
/// The box has `floor(size / spacing)` points per axis; each point takes the
/// trilinearly interpolated value of `raw` at `origin + spacing · index`.
pub fn resample_to_box(raw: &Grid, spacing: f64) -> Result<OrthogonalBox, EngineError> {
    let (origin, maximum) = raw.cell.bounding_box();
    let size = maximum - origin;
    let dims = [size.x, size.y, size.z].map(|len| (len / spacing).floor() as usize);
    if dims.contains(&0) {
        return Err(EngineError::Resampling(format!(
            "unit cell {} is smaller than one {spacing} Å grid step",
            raw.cell
        )));
    }
    debug!("Box size: {:.3} x {:.3} x {:.3} Å", size.x, size.y, size.z);
    debug!("Box points: {}x{}x{}", dims[0], dims[1], dims[2]);

    let mut data = Array3::<f32>::zeros(dims);
    let sample = |(i, j, k): (usize, usize, usize)| {
        let position = origin + Vector3::new(i as f64, j as f64, k as f64) * spacing;
        raw.interpolate_position(&position)
    };
    fill_indexed(&mut data, sample);

    let cell = UnitCell::orthorhombic(size.x, size.y, size.z)
        .ok_or_else(|| EngineError::Resampling(format!("degenerate bounding box {size:?}")))?;
    Ok(OrthogonalBox {
        grid: Grid::new(data, cell, SpaceGroup::p1()),
        origin,
        spacing,
    })
}

/// Maps a prediction on the orthogonal lattice back onto a grid over `cell` with `spacegroup` symmetry.
///
/// The prediction is treated as periodic with period `shape · spacing`, and
/// NaN values read as zero. One point per symmetry orbit of the output grid is
/// sampled at `orthogonal(point) − origin`, and the value is shared by the
/// whole orbit.
pub fn reinterpolate_to_cell(
    mut prediction: Array3<f32>,
    origin: &Point3<f64>,
    spacing: f64,
    cell: &UnitCell,
    spacegroup: &SpaceGroup,
) -> Result<Grid, EngineError> {
    prediction.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v });
    let (nx, ny, nz) = prediction.dim();
    let array_cell = UnitCell::orthorhombic(
        nx as f64 * spacing,
        ny as f64 * spacing,
        nz as f64 * spacing,
    )
    .ok_or_else(|| EngineError::Resampling("empty prediction array".to_string()))?;
    let source = Grid::new(prediction, array_cell, SpaceGroup::p1());

    let mut output = Grid::with_spacing(cell.clone(), spacegroup.clone(), spacing);
    debug!(
        "Output grid: {:?} with {} symmetry operations",
        output.dims(),
        spacegroup.operations().len()
    );
    output.fill_by_orbit(|fractional| {
        let position = cell.orthogonalize(&fractional) - origin.coords;
        source.interpolate_position(&position)
    });
    Ok(output)
}

#[cfg(feature = "parallel")]
fn fill_indexed(data: &mut Array3<f32>, sample: impl Fn((usize, usize, usize)) -> f32 + Sync) {
    Zip::indexed(data).par_for_each(|index, value| *value = sample(index));
}

#[cfg(not(feature = "parallel"))]
fn fill_indexed(data: &mut Array3<f32>, sample: impl Fn((usize, usize, usize)) -> f32) {
    for (index, value) in data.indexed_iter_mut() {
        *value = sample(index);
    }
}
