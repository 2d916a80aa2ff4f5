//! # Workflows Module
//!
//! High-level entry points that run a complete prediction, from an input file
//! on disk to the predicted map and its intermediates.
//!
//! - **Prediction Workflow** ([`predict`]) - Load reflections or a map, run the
//!   model over the density, and return the predicted map on the original cell.

pub mod predict;
