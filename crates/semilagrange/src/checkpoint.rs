// Serializable model weights

use crate::config::ForecastConfig;
use crate::error::{AdvectionError, Result};
use crate::layers::{HaloConv3x3, PointwiseLinear};
use log::info;
use ndarray::{Array1, Array2, Array4};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Log-variance bias for a fresh variational predictor (σ ≈ 0.05)
const INITIAL_LOG_VAR: f64 = -6.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    /// Rows are output channels
    pub weight: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvWeights {
    /// [out][in][ky][kx]
    pub weight: Vec<Vec<Vec<Vec<f64>>>>,
    pub bias: Vec<f64>,
}

/// Every learned parameter of the forecaster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    pub input_proj: LinearWeights,
    pub velocity: LinearWeights,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_log_var: Option<LinearWeights>,
    pub reaction: LinearWeights,
    pub output_proj: ConvWeights,
}

impl ModelWeights {
    /// Fresh weights sized for `config`, reproducible from `config.model.seed`
    pub fn random(config: &ForecastConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.model.seed);
        let scale = config.model.weight_scale;
        let hidden = config.hidden_channels();

        let input_proj = PointwiseLinear::random(&mut rng, config.input_channels(), hidden, scale);
        let velocity = PointwiseLinear::random(&mut rng, hidden, 2 * hidden, scale);
        let velocity_log_var = config.ensemble.enable.then(|| {
            let mut weights = LinearWeights::from(&PointwiseLinear::random(&mut rng, hidden, 2 * hidden, scale));
            weights.bias.fill(INITIAL_LOG_VAR);
            weights
        });
        let reaction = PointwiseLinear::random(&mut rng, hidden, hidden, scale);
        let output_proj = HaloConv3x3::random(&mut rng, hidden, config.model.common_channels, scale);

        Self {
            input_proj: LinearWeights::from(&input_proj),
            velocity: LinearWeights::from(&velocity),
            velocity_log_var,
            reaction: LinearWeights::from(&reaction),
            output_proj: ConvWeights::from(&output_proj),
        }
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let weights: ModelWeights = toml::from_str(&content)?;
        info!("Loaded checkpoint from {}", path.as_ref().display());
        Ok(weights)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl From<&PointwiseLinear> for LinearWeights {
    fn from(layer: &PointwiseLinear) -> Self {
        Self {
            weight: layer.weight().outer_iter().map(|row| row.to_vec()).collect(),
            bias: layer.bias().to_vec(),
        }
    }
}

impl TryFrom<&LinearWeights> for PointwiseLinear {
    type Error = AdvectionError;

    fn try_from(weights: &LinearWeights) -> Result<Self> {
        let rows = weights.weight.len();
        let cols = weights.weight.first().map_or(0, Vec::len);
        if let Some(row) = weights.weight.iter().find(|row| row.len() != cols) {
            return Err(AdvectionError::shape("checkpoint weight row", cols, row.len()));
        }
        let flat: Vec<f64> = weights.weight.iter().flatten().copied().collect();
        let weight = Array2::from_shape_vec((rows, cols), flat)?;
        PointwiseLinear::new(weight, Array1::from(weights.bias.clone()))
    }
}

impl From<&HaloConv3x3> for ConvWeights {
    fn from(layer: &HaloConv3x3) -> Self {
        let weight: Vec<Vec<Vec<Vec<f64>>>> = layer
            .weight()
            .outer_iter()
            .map(|per_out| {
                per_out
                    .outer_iter()
                    .map(|kernel| kernel.outer_iter().map(|row| row.to_vec()).collect())
                    .collect()
            })
            .collect();
        Self {
            weight,
            bias: layer.bias().to_vec(),
        }
    }
}

impl TryFrom<&ConvWeights> for HaloConv3x3 {
    type Error = AdvectionError;

    fn try_from(weights: &ConvWeights) -> Result<Self> {
        let out_channels = weights.weight.len();
        let in_channels = weights.weight.first().map_or(0, Vec::len);
        let mut flat = Vec::with_capacity(out_channels * in_channels * 9);
        for per_out in &weights.weight {
            if per_out.len() != in_channels {
                return Err(AdvectionError::shape("checkpoint conv inputs", in_channels, per_out.len()));
            }
            for kernel in per_out {
                if kernel.len() != 3 || kernel.iter().any(|row| row.len() != 3) {
                    return Err(AdvectionError::shape("checkpoint conv kernel", "3x3", format!("{:?}", kernel)));
                }
                flat.extend(kernel.iter().flatten().copied());
            }
        }
        let weight = Array4::from_shape_vec((out_channels, in_channels, 3, 3), flat)?;
        HaloConv3x3::new(weight, Array1::from(weights.bias.clone()))
    }
}
