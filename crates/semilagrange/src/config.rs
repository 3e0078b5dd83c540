use crate::constants::{CATMULL_ROM, CUBIC_HALO, POLE_CLAMP_EPSILON, SYNOPTIC_TIME_SCALE};
use crate::error::{AdvectionError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub grid: GridConfig,
    pub model: ModelConfig,
    pub advection: AdvectionConfig,
    pub ensemble: EnsembleConfig,
    pub initial: InitialStateConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub batch: usize,
    pub lat_size: usize,
    pub lon_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Prognostic channels; the first `common_channels` of them are forecast
    pub dynamic_channels: usize,
    pub forcing_channels: usize,
    pub common_channels: usize,
    pub hidden_multiplier: usize,
    pub num_substeps: usize,
    /// Forecast step in seconds
    pub base_dt: f64,
    /// Initial weight magnitude when no checkpoint is given
    pub weight_scale: f64,
    pub seed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvectionConfig {
    pub halo: usize,
    pub cubic_coefficient: f64,
    pub pole_epsilon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleConfig {
    /// Use the variational velocity predictor
    pub enable: bool,
    pub members: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialStateConfig {
    pub frequency: f64,
    pub amplitude: f64,
    pub seed: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig {
                batch: 1,
                lat_size: 32,
                lon_size: 64,
            },
            model: ModelConfig {
                dynamic_channels: 4,
                forcing_channels: 1,
                common_channels: 4,
                hidden_multiplier: 2,
                num_substeps: 3,
                base_dt: 21_600.0, // 6 hours
                weight_scale: 0.5,
                seed: 42,
                checkpoint: None,
            },
            advection: AdvectionConfig {
                halo: CUBIC_HALO,
                cubic_coefficient: CATMULL_ROM,
                pole_epsilon: POLE_CLAMP_EPSILON,
            },
            ensemble: EnsembleConfig {
                enable: false,
                members: 1,
                seed: 7,
            },
            initial: InitialStateConfig {
                frequency: 1.5,
                amplitude: 1.0,
                seed: 11,
            },
        }
    }
}

impl ForecastConfig {
    pub fn load_from_file(path: &str) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ForecastConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> std::result::Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let model = &self.model;
        let fail = |msg: String| Err(AdvectionError::InvalidConfig(msg));

        if self.grid.batch == 0 || self.grid.lat_size < 2 || self.grid.lon_size < 2 {
            return fail(format!(
                "grid must have batch >= 1 and at least 2x2 cells, got {:?}",
                self.grid
            ));
        }
        if self.grid.lon_size % 2 != 0 {
            return fail(format!("lon_size must be even, got {}", self.grid.lon_size));
        }
        if model.dynamic_channels == 0 || model.hidden_multiplier == 0 {
            return fail("dynamic_channels and hidden_multiplier must be positive".into());
        }
        if model.common_channels == 0 || model.common_channels > model.dynamic_channels {
            return fail(format!(
                "common_channels must be in 1..={}, got {}",
                model.dynamic_channels, model.common_channels
            ));
        }
        if model.num_substeps == 0 {
            return fail("num_substeps must be positive".into());
        }
        if !(model.base_dt.is_finite() && model.base_dt > 0.0) {
            return fail(format!("base_dt must be positive, got {}", model.base_dt));
        }
        let halo = self.advection.halo;
        if halo == 0 || halo > self.grid.lat_size || halo > self.grid.lon_size {
            return fail(format!("halo must be in 1..=grid size, got {}", halo));
        }
        if !(self.advection.pole_epsilon > 0.0 && self.advection.pole_epsilon < 1.0) {
            return fail(format!("pole_epsilon must be in (0, 1), got {}", self.advection.pole_epsilon));
        }
        if self.ensemble.members == 0 {
            return fail("ensemble.members must be positive".into());
        }
        Ok(())
    }

    /// Input channels: dynamic, forcings, then latitude and longitude
    pub fn input_channels(&self) -> usize {
        self.model.dynamic_channels + self.model.forcing_channels + 2
    }

    pub fn hidden_channels(&self) -> usize {
        self.model.hidden_multiplier * (self.model.dynamic_channels + self.model.forcing_channels)
    }

    /// Dimensionless sub-step: the forecast step as a fraction of the synoptic time scale
    pub fn substep_dt(&self) -> f64 {
        self.model.base_dt / SYNOPTIC_TIME_SCALE / self.model.num_substeps as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ForecastConfig::default().validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = ForecastConfig::default();
        config.model.checkpoint = Some("weights.toml".into());
        config.ensemble.enable = true;

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: ForecastConfig = toml::from_str(&text).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join("semilagrange_config_test.toml");
        let path = path.to_str().unwrap();
        let config = ForecastConfig::default();

        config.save_to_file(path).unwrap();
        let loaded = ForecastConfig::load_from_file(path).unwrap();
        std::fs::remove_file(path).ok();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_channel_counts() {
        let config = ForecastConfig::default();

        assert_eq!(config.input_channels(), 7);
        assert_eq!(config.hidden_channels(), 10);
    }

    #[test]
    fn test_substep_dt_is_dimensionless_fraction() {
        let config = ForecastConfig::default();
        let expected = 21_600.0 / 7.29212e5 / 3.0;

        assert!((config.substep_dt() - expected).abs() < 1e-15);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let mut odd = ForecastConfig::default();
        odd.grid.lon_size = 63;
        assert!(odd.validate().is_err());

        let mut too_many_common = ForecastConfig::default();
        too_many_common.model.common_channels = 5;
        assert!(too_many_common.validate().is_err());

        let mut no_substeps = ForecastConfig::default();
        no_substeps.model.num_substeps = 0;
        assert!(no_substeps.validate().is_err());

        let mut huge_halo = ForecastConfig::default();
        huge_halo.advection.halo = 100;
        assert!(huge_halo.validate().is_err());
    }
}
