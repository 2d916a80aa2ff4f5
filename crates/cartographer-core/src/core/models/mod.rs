//! # Core Models Module
//!
//! This module contains the fundamental data structures used to represent
//! crystallographic density in Cartographer.
//!
//! ## Overview
//!
//! The models describe the geometry a density map lives in and the map itself:
//!
//! - **Represent the lattice** - Unit cell parameters and the orthogonal/fractional transforms
//! - **Represent symmetry** - Space groups as explicit lists of symmetry operations
//! - **Represent density** - Periodic 3D grids with interpolation and symmetry-aware filling
//! - **Name trained models** - The segmentation targets a model can predict
//!
//! ## Key Components
//!
//! - [`unit_cell`] - Cell parameters, orthogonalization and resolution of reflections
//! - [`symmetry`] - Symmetry operation parsing and space group helpers
//! - [`grid`] - Density grids, grid sizing and symmetry expansion
//! - [`kind`] - The `phos`, `sugar` and `base` model categories
//!
//! ## Usage
//!
//! ```ignore
//! use cartographer::core::models::{grid::Grid, symmetry::SpaceGroup, unit_cell::UnitCell};
//!
//! let cell = UnitCell::new(40.0, 50.0, 60.0, 90.0, 90.0, 90.0).unwrap();
//! let mut grid = Grid::with_spacing(cell, SpaceGroup::p1(), 0.7);
//! grid.normalize();
//! ```

pub mod grid;
pub mod kind;
pub mod symmetry;
pub mod unit_cell;
