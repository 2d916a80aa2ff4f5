//! # Cartographer Core Library
//!
//! Predicts the location of nucleic acid features (phosphate, sugar, base) in
//! crystallographic density maps with trained segmentation models.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture that keeps data, logic and
//! user-facing procedures apart.
//!
//! - **[`core`]: The Foundation.** Stateless crystallographic data models (`UnitCell`,
//!   `SpaceGroup`, `Grid`), the MTZ and CCP4 map formats, and the Fourier synthesis
//!   that turns amplitude/phase columns into a density map.
//!
//! - **[`engine`]: The Logic Core.** Resampling onto an orthogonal lattice, tiled model
//!   evaluation with overlap averaging, and the model abstraction with its ONNX backend.
//!
//! - **[`workflows`]: The Public API.** Ties `core` and `engine` together into a complete
//!   prediction run that front ends call with a path, a model, a configuration and a
//!   progress reporter.

pub mod core;
pub mod engine;
pub mod workflows;
