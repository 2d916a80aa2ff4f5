//! # Core Module
//!
//! This module provides the crystallographic building blocks that the prediction
//! engine works on: unit cells, symmetry, density grids, file formats and the
//! Fourier synthesis that turns reflection data into a map.
//!
//! ## Architecture
//!
//! - **Data Models** ([`models`]) - Unit cells, symmetry operations, space groups, density grids
//!   and the catalogue of trained model kinds
//! - **File I/O** ([`io`]) - Binary MTZ reflection files and CCP4 map files
//! - **Fourier Synthesis** ([`transform`]) - Amplitude/phase columns to a real-space map
//!
//! ## Key Capabilities
//!
//! - **Symmetry-aware grids** with periodic trilinear interpolation and orbit filling
//! - **Endian-aware binary readers** for both little and big endian files
//! - **Space group expansion** of reflections to P1 before the FFT

pub mod io;
pub mod models;
pub mod transform;
