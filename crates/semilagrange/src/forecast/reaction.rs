// Local tendency applied after each advection sub-step

use crate::error::{AdvectionError, Result};
use crate::layers::PointwiseLinear;
use ndarray::Array4;

pub trait DiffusionReaction: Send + Sync {
    /// Rate of change of the latent state, same shape as `state`
    fn tendency(&self, state: &Array4<f64>) -> Result<Array4<f64>>;

    fn channels(&self) -> usize;
}

/// Channel mixing at each cell, hidden -> hidden
#[derive(Debug, Clone)]
pub struct PointwiseReaction {
    layer: PointwiseLinear,
}

impl PointwiseReaction {
    pub fn new(layer: PointwiseLinear) -> Result<Self> {
        if layer.in_channels() != layer.out_channels() {
            return Err(AdvectionError::shape(
                "reaction outputs",
                layer.in_channels(),
                layer.out_channels(),
            ));
        }
        Ok(Self { layer })
    }
}

impl DiffusionReaction for PointwiseReaction {
    fn tendency(&self, state: &Array4<f64>) -> Result<Array4<f64>> {
        self.layer.apply(state)
    }

    fn channels(&self) -> usize {
        self.layer.in_channels()
    }
}
