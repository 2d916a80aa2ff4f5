//! Provides input/output functionality for crystallographic file formats.
//!
//! This module reads MTZ reflection files and reads and writes CCP4 density
//! maps. Both formats share the [`traits::CrystallographicFile`] interface so
//! callers can load either from a path with the same helpers.

pub mod ccp4;
pub mod mtz;
pub mod traits;
