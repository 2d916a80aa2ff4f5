use cartographer::engine::config::{
    DEFAULT_AMPLITUDE_LABEL, DEFAULT_GRID_SPACING, DEFAULT_PHASE_LABEL, DEFAULT_STRIDE,
};

/// Where released models are published.
pub const DEFAULT_MODEL_BASE_URL: &str = "http://www.ysbl.york.ac.uk/jsd523";

pub struct DefaultsConfig {
    pub grid_spacing: f64,
    pub stride: usize,
    pub sample_rate: f64,
    pub intensity: String,
    pub phase: String,
    pub base_url: String,
    pub python: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            grid_spacing: DEFAULT_GRID_SPACING,
            stride: DEFAULT_STRIDE,
            sample_rate: 0.0,
            intensity: DEFAULT_AMPLITUDE_LABEL.to_string(),
            phase: DEFAULT_PHASE_LABEL.to_string(),
            base_url: DEFAULT_MODEL_BASE_URL.to_string(),
            python: "python3".to_string(),
        }
    }
}
