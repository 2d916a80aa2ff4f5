//! Command line front ends for Cartographer: `cartographer` runs a prediction and
//! `cartographer-install` downloads the trained models.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod install;
pub mod locations;
pub mod logging;
pub mod utils;
