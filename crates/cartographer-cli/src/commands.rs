pub mod install;
pub mod predict;
