use ndarray::{Array4, ArrayView3};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(
        "Failed to load model from {}: {message}. The file may be corrupted by an incomplete download; \
         reinstall it with `cartographer-install -m <kind> --reinstall`",
        .path.display()
    )]
    Load { path: PathBuf, message: String },

    #[error("The model file was not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output shape {found:?}, expected {expected}")]
    OutputShape { expected: String, found: Vec<usize> },

    #[error("Model support was not compiled in; rebuild with the `onnx` feature")]
    Unsupported,
}

/// A segmentation model evaluated on cubic density tiles.
///
/// `predict` receives one `n × n × n` tile and returns per-voxel class scores
/// with shape `[n, n, n, classes]`.
pub trait DensityModel {
    fn predict(&self, tile: ArrayView3<f32>) -> Result<Array4<f32>, ModelError>;
}

impl<M: DensityModel + ?Sized> DensityModel for &M {
    fn predict(&self, tile: ArrayView3<f32>) -> Result<Array4<f32>, ModelError> {
        (**self).predict(tile)
    }
}

impl<M: DensityModel + ?Sized> DensityModel for Box<M> {
    fn predict(&self, tile: ArrayView3<f32>) -> Result<Array4<f32>, ModelError> {
        (**self).predict(tile)
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;

#[cfg(feature = "onnx")]
mod onnx {
    use super::{DensityModel, ModelError};
    use crate::engine::tiling::TILE_SIZE;
    use ndarray::{Array4, ArrayView3};
    use std::path::Path;
    use tracing::{debug, info};
    use tract_onnx::prelude::*;

    type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

    /// An ONNX export of a tile segmentation network, run with `tract`.
    ///
    /// The network takes a `[1, 32, 32, 32, 1]` input and produces
    /// `[1, 32, 32, 32, classes]` scores.
    pub struct OnnxModel {
        plan: Plan,
    }

    impl std::fmt::Debug for OnnxModel {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("OnnxModel").finish_non_exhaustive()
        }
    }

    impl OnnxModel {
        pub fn load(path: &Path) -> Result<Self, ModelError> {
            info!("Loading model from file: {}", path.display());
            let shape = [1, TILE_SIZE, TILE_SIZE, TILE_SIZE, 1];
            let plan = tract_onnx::onnx()
                .model_for_path(path)
                .and_then(|model| model.with_input_fact(0, f32::fact(shape).into()))
                .and_then(|model| model.into_optimized())
                .and_then(|model| model.into_runnable())
                .map_err(|e| ModelError::Load {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
            debug!("Model plan ready");
            Ok(Self { plan })
        }
    }

    impl DensityModel for OnnxModel {
        fn predict(&self, tile: ArrayView3<f32>) -> Result<Array4<f32>, ModelError> {
            let (nx, ny, nz) = tile.dim();
            let values: Vec<f32> = tile.iter().copied().collect();
            let input = Tensor::from_shape(&[1, nx, ny, nz, 1], &values)
                .map_err(|e| ModelError::Inference(e.to_string()))?;
            let outputs = self
                .plan
                .run(tvec!(input.into()))
                .map_err(|e| ModelError::Inference(e.to_string()))?;
            let output = outputs
                .first()
                .ok_or_else(|| ModelError::Inference("model produced no outputs".to_string()))?;

            let shape = output.shape().to_vec();
            let classes = match shape.as_slice() {
                [1, x, y, z, c] if [*x, *y, *z] == [nx, ny, nz] => *c,
                _ => {
                    return Err(ModelError::OutputShape {
                        expected: format!("[1, {nx}, {ny}, {nz}, classes]"),
                        found: shape,
                    });
                }
            };
            let data = output
                .as_slice::<f32>()
                .map_err(|e| ModelError::Inference(e.to_string()))?;
            Array4::from_shape_vec((nx, ny, nz, classes), data.to_vec()).map_err(|_| {
                ModelError::OutputShape {
                    expected: format!("[1, {nx}, {ny}, {nz}, classes]"),
                    found: shape.clone(),
                }
            })
        }
    }
}

/// Loads the model stored at `path` with the runtime that matches its format.
pub fn load_model(path: &Path) -> Result<Box<dyn DensityModel>, ModelError> {
    if !path.is_file() {
        return Err(ModelError::NotFound(path.to_path_buf()));
    }
    load_onnx(path)
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path) -> Result<Box<dyn DensityModel>, ModelError> {
    Ok(Box::new(OnnxModel::load(path)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(_path: &Path) -> Result<Box<dyn DensityModel>, ModelError> {
    Err(ModelError::Unsupported)
}
