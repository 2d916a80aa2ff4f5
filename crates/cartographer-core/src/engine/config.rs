use super::tiling::TILE_SIZE;
use thiserror::Error;

pub const DEFAULT_GRID_SPACING: f64 = 0.7;
pub const DEFAULT_STRIDE: usize = 16;
pub const DEFAULT_AMPLITUDE_LABEL: &str = "FWT";
pub const DEFAULT_PHASE_LABEL: &str = "PHWT";

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How the input density is obtained from a reflection file.
#[derive(Debug, Clone, PartialEq)]
pub struct MapConfig {
    pub amplitude_label: String,
    pub phase_label: String,
    /// Reflections with `d` below this value (Å) are dropped before the transform.
    pub resolution_cutoff: Option<f64>,
    /// Minimum sampling of the raw map relative to the data resolution; `0` uses the reflection indices only.
    pub sample_rate: f64,
}

/// How the density is resampled, cut into tiles and recombined.
#[derive(Debug, Clone, PartialEq)]
pub struct TilingConfig {
    pub grid_spacing: f64,
    pub stride: usize,
    /// Accumulate the class-1 output channel instead of the arg-max class.
    pub raw_values: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionConfig {
    pub map: MapConfig,
    pub tiling: TilingConfig,
}

#[derive(Default)]
pub struct PredictionConfigBuilder {
    amplitude_label: Option<String>,
    phase_label: Option<String>,
    resolution_cutoff: Option<f64>,
    sample_rate: Option<f64>,
    grid_spacing: Option<f64>,
    stride: Option<usize>,
    raw_values: bool,
}

impl PredictionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn amplitude_label(mut self, label: impl Into<String>) -> Self {
        self.amplitude_label = Some(label.into());
        self
    }
    pub fn phase_label(mut self, label: impl Into<String>) -> Self {
        self.phase_label = Some(label.into());
        self
    }
    pub fn resolution_cutoff(mut self, cutoff: Option<f64>) -> Self {
        self.resolution_cutoff = cutoff;
        self
    }
    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = Some(rate);
        self
    }
    pub fn grid_spacing(mut self, spacing: f64) -> Self {
        self.grid_spacing = Some(spacing);
        self
    }
    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = Some(stride);
        self
    }
    pub fn raw_values(mut self, raw: bool) -> Self {
        self.raw_values = raw;
        self
    }

    pub fn build(self) -> Result<PredictionConfig, ConfigError> {
        let amplitude_label = self
            .amplitude_label
            .ok_or(ConfigError::MissingParameter("amplitude_label"))?;
        let phase_label = self
            .phase_label
            .ok_or(ConfigError::MissingParameter("phase_label"))?;
        let grid_spacing = self
            .grid_spacing
            .ok_or(ConfigError::MissingParameter("grid_spacing"))?;
        let stride = self.stride.ok_or(ConfigError::MissingParameter("stride"))?;
        let sample_rate = self.sample_rate.unwrap_or(0.0);

        if let Some(cutoff) = self.resolution_cutoff {
            if !(cutoff.is_finite() && cutoff > 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name: "resolution_cutoff",
                    reason: format!("expected a positive number of Å, got {cutoff}"),
                });
            }
        }
        if !(grid_spacing.is_finite() && grid_spacing > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "grid_spacing",
                reason: format!("expected a positive spacing, got {grid_spacing}"),
            });
        }
        if stride == 0 || TILE_SIZE % stride != 0 {
            return Err(ConfigError::InvalidParameter {
                name: "stride",
                reason: format!("must divide the tile size {TILE_SIZE}, got {stride}"),
            });
        }
        if !(sample_rate.is_finite() && sample_rate >= 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "sample_rate",
                reason: format!("expected a non-negative number, got {sample_rate}"),
            });
        }

        Ok(PredictionConfig {
            map: MapConfig {
                amplitude_label,
                phase_label,
                resolution_cutoff: self.resolution_cutoff,
                sample_rate,
            },
            tiling: TilingConfig {
                grid_spacing,
                stride,
                raw_values: self.raw_values,
            },
        })
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            map: MapConfig {
                amplitude_label: DEFAULT_AMPLITUDE_LABEL.to_string(),
                phase_label: DEFAULT_PHASE_LABEL.to_string(),
                resolution_cutoff: None,
                sample_rate: 0.0,
            },
            tiling: TilingConfig {
                grid_spacing: DEFAULT_GRID_SPACING,
                stride: DEFAULT_STRIDE,
                raw_values: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> PredictionConfigBuilder {
        PredictionConfigBuilder::new()
            .amplitude_label("FWT")
            .phase_label("PHWT")
            .grid_spacing(0.7)
            .stride(16)
    }

    #[test]
    fn build_with_all_parameters_matches_defaults() {
        let config = complete().build().unwrap();
        assert_eq!(config, PredictionConfig::default());
    }

    #[test]
    fn build_reports_first_missing_parameter() {
        let err = PredictionConfigBuilder::new()
            .phase_label("PHWT")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("amplitude_label"));

        let err = PredictionConfigBuilder::new()
            .amplitude_label("FWT")
            .phase_label("PHWT")
            .grid_spacing(0.7)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("stride"));
    }

    #[test]
    fn build_rejects_non_positive_resolution_cutoff() {
        for cutoff in [0.0, -2.0, f64::NAN] {
            let err = complete().resolution_cutoff(Some(cutoff)).build().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidParameter {
                    name: "resolution_cutoff",
                    ..
                }
            ));
        }
        let config = complete().resolution_cutoff(Some(2.5)).build().unwrap();
        assert_eq!(config.map.resolution_cutoff, Some(2.5));
    }

    #[test]
    fn build_rejects_stride_that_does_not_divide_tile() {
        for stride in [0, 12, 33] {
            assert!(complete().stride(stride).build().is_err());
        }
        assert_eq!(complete().stride(8).build().unwrap().tiling.stride, 8);
    }

    #[test]
    fn build_rejects_bad_spacing_and_sample_rate() {
        assert!(complete().grid_spacing(0.0).build().is_err());
        assert!(complete().sample_rate(-1.0).build().is_err());
        assert!(complete().raw_values(true).build().unwrap().tiling.raw_values);
    }
}
