//! Fourier synthesis of density maps from amplitude/phase reflection columns.

use crate::core::io::mtz::{Mtz, MtzError, hkl_of};
use crate::core::models::grid::{Grid, good_grid_size};
use ndarray::{Array3, ArrayViewMut1, Axis};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use ndarray::Zip;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Mtz(#[from] MtzError),
    #[error("No reflections with defined '{amplitude}' and '{phase}' values")]
    NoReflections { amplitude: String, phase: String },
}

/// Selects the columns and sampling used for a Fourier synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct FphiColumns<'a> {
    pub amplitude: &'a str,
    pub phase: &'a str,
    /// When positive, the grid spacing is at most `d_min / sample_rate`.
    pub sample_rate: f64,
}

/// Computes the density map `ρ(x) = 1/V Σ F(h) exp(-2πi h·x)` from one amplitude and one phase column.
///
/// Every reflection is expanded by the space group operations and Friedel's law
/// into a full P1 reciprocal grid before a 3D FFT is taken. Reflections with a
/// missing amplitude or phase are skipped.
pub fn transform_f_phi_to_map(mtz: &Mtz, columns: &FphiColumns) -> Result<Grid, TransformError> {
    let (f_col, f_column) = mtz.column(columns.amplitude)?;
    let (phi_col, phi_column) = mtz.column(columns.phase)?;
    if f_column.kind != 'F' {
        warn!(
            "Column '{}' has type '{}', expected an amplitude (F)",
            f_column.label, f_column.kind
        );
    }
    if phi_column.kind != 'P' {
        warn!(
            "Column '{}' has type '{}', expected a phase (P)",
            phi_column.label, phi_column.kind
        );
    }
    let hkl_cols = mtz.miller_columns()?;
    let cell = mtz.cell_for_column(f_col).clone();
    let ops = mtz.spacegroup.operations();

    let reflections: Vec<([i32; 3], f32, f32)> = mtz
        .rows()
        .filter_map(|row| {
            let (f, phi) = (row[f_col], row[phi_col]);
            (!f.is_nan() && !phi.is_nan()).then(|| (hkl_of(row, hkl_cols), f, phi))
        })
        .collect();
    if reflections.is_empty() {
        return Err(TransformError::NoReflections {
            amplitude: columns.amplitude.to_string(),
            phase: columns.phase.to_string(),
        });
    }

    let mut max_index = [0i32; 3];
    let mut max_inv_d2 = 0.0f64;
    for (hkl, _, _) in &reflections {
        for op in ops {
            let equivalent = op.apply_to_hkl(*hkl);
            for i in 0..3 {
                max_index[i] = max_index[i].max(equivalent[i].abs());
            }
        }
        max_inv_d2 = max_inv_d2.max(cell.inverse_d_squared(*hkl));
    }

    let mut min_size = max_index.map(|m| 2 * m as usize + 1);
    if columns.sample_rate > 0.0 && max_inv_d2 > 0.0 {
        let d_min = 1.0 / max_inv_d2.sqrt();
        for (size, length) in min_size.iter_mut().zip([cell.a, cell.b, cell.c]) {
            *size = (*size).max((columns.sample_rate * length / d_min).ceil() as usize);
        }
    }
    let dims = good_grid_size(min_size, &mtz.spacegroup);
    info!(
        "Fourier synthesis of {} reflections on a {}x{}x{} grid",
        reflections.len(),
        dims[0],
        dims[1],
        dims[2]
    );

    let mut coefficients = Array3::from_elem(dims, Complex32::new(0.0, 0.0));
    let wrap = |index: [i32; 3]| -> [usize; 3] {
        std::array::from_fn(|i| index[i].rem_euclid(dims[i] as i32) as usize)
    };
    for (hkl, f, phi) in &reflections {
        let phi = f64::from(*phi).to_radians();
        for op in ops {
            let equivalent = op.apply_to_hkl(*hkl);
            let shifted = phi + op.phase_shift(*hkl);
            let value = Complex32::from_polar(*f, shifted as f32);
            coefficients[wrap(equivalent)] = value;
            coefficients[wrap(equivalent.map(|h| -h))] = value.conj();
        }
    }

    fft3_forward(&mut coefficients);

    let volume = cell.volume() as f32;
    let data = coefficients.mapv(|c| c.re / volume);
    debug!("Raw map computed in cell {}", cell);
    Ok(Grid::new(data, cell, mtz.spacegroup.clone()))
}

/// In-place forward 3D FFT, one axis at a time.
fn fft3_forward(data: &mut Array3<Complex32>) {
    let mut planner = FftPlanner::<f32>::new();
    for axis in 0..3 {
        let n = data.len_of(Axis(axis));
        let fft = planner.plan_fft_forward(n);
        transform_lanes(data, Axis(axis), &fft);
    }
}

#[cfg(feature = "parallel")]
fn transform_lanes(data: &mut Array3<Complex32>, axis: Axis, fft: &Arc<dyn Fft<f32>>) {
    Zip::from(data.lanes_mut(axis)).par_for_each(|mut lane| transform_lane(&mut lane, fft.as_ref()));
}

#[cfg(not(feature = "parallel"))]
fn transform_lanes(data: &mut Array3<Complex32>, axis: Axis, fft: &Arc<dyn Fft<f32>>) {
    for mut lane in data.lanes_mut(axis) {
        transform_lane(&mut lane, fft.as_ref());
    }
}

fn transform_lane(lane: &mut ArrayViewMut1<Complex32>, fft: &dyn Fft<f32>) {
    let mut buffer = lane.to_vec();
    fft.process(&mut buffer);
    for (dst, src) in lane.iter_mut().zip(buffer) {
        *dst = src;
    }
}
