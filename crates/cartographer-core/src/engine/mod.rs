//! # Engine Module
//!
//! This module turns a density map into a model prediction: it resamples the
//! map onto an orthogonal lattice, evaluates a segmentation model on overlapping
//! cubic tiles, and maps the averaged result back onto the crystallographic cell.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Column labels, resolution cutoff, grid spacing and tile stride
//! - **Models** ([`model`]) - The [`model::DensityModel`] seam and the ONNX runtime behind it
//! - **Resampling** ([`resample`]) - Cell to orthogonal box and back, honouring space group symmetry
//! - **Tiling** ([`tiling`]) - Tile translations, accumulation and averaging
//! - **Progress Monitoring** ([`progress`]) - Phase and task events for front ends
//! - **Error Handling** ([`error`]) - Engine-specific error types and error propagation
//!
//! ## Key Capabilities
//!
//! - **Model-agnostic tiling** so any implementation of the model trait can be plugged in
//! - **Empty tile skipping** without invoking the model
//! - **Parallel resampling** when the `parallel` feature is enabled

pub mod config;
pub mod error;
pub mod model;
pub mod progress;
pub mod resample;
pub mod tiling;
