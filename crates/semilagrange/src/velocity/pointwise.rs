// Deterministic velocity predictors

use super::{VelocityField, VelocityPrediction};
use crate::error::{AdvectionError, Result};
use crate::layers::PointwiseLinear;
use ndarray::Array4;

/// Same (u, v) at every cell and channel
#[derive(Debug, Clone, Copy)]
pub struct UniformVelocity {
    pub u: f64,
    pub v: f64,
}

impl UniformVelocity {
    pub fn new(u: f64, v: f64) -> Self {
        Self { u, v }
    }
}

impl VelocityField for UniformVelocity {
    fn predict(&self, features: &Array4<f64>) -> Result<VelocityPrediction> {
        VelocityPrediction::new(
            Array4::from_elem(features.raw_dim(), self.u),
            Array4::from_elem(features.raw_dim(), self.v),
        )
    }
}

/// Learned per-cell map from C feature channels to 2C velocity channels
#[derive(Debug, Clone)]
pub struct PointwiseVelocity {
    layer: PointwiseLinear,
}

impl PointwiseVelocity {
    pub fn new(layer: PointwiseLinear) -> Result<Self> {
        if layer.out_channels() != 2 * layer.in_channels() {
            return Err(AdvectionError::shape(
                "velocity layer outputs",
                2 * layer.in_channels(),
                layer.out_channels(),
            ));
        }
        Ok(Self { layer })
    }

    pub fn layer(&self) -> &PointwiseLinear {
        &self.layer
    }
}

impl VelocityField for PointwiseVelocity {
    fn predict(&self, features: &Array4<f64>) -> Result<VelocityPrediction> {
        let stacked = self.layer.apply(features)?;
        VelocityPrediction::from_stacked(&stacked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2, array};

    #[test]
    fn test_uniform_fills_every_cell() {
        let features = Array4::zeros((2, 3, 4, 8));
        let velocity = UniformVelocity::new(0.5, -0.25).predict(&features).unwrap();

        assert!(velocity.u.iter().all(|&u| u == 0.5));
        assert!(velocity.v.iter().all(|&v| v == -0.25));
    }

    #[test]
    fn test_pointwise_rows_map_to_named_components() {
        // Rows 0..2 drive u, rows 2..4 drive v
        let weight = array![[1.0, 0.0], [0.0, 1.0], [2.0, 0.0], [0.0, 3.0]];
        let layer = PointwiseLinear::new(weight, Array1::zeros(4)).unwrap();
        let predictor = PointwiseVelocity::new(layer).unwrap();
        let features = Array4::from_shape_fn((1, 2, 2, 2), |(_, c, _, _)| (c + 1) as f64);

        let velocity = predictor.predict(&features).unwrap();

        assert_eq!(velocity.u[[0, 0, 1, 1]], 1.0);
        assert_eq!(velocity.u[[0, 1, 1, 1]], 2.0);
        assert_eq!(velocity.v[[0, 0, 1, 1]], 2.0);
        assert_eq!(velocity.v[[0, 1, 1, 1]], 6.0);
    }

    #[test]
    fn test_pointwise_requires_doubled_outputs() {
        let layer = PointwiseLinear::new(Array2::zeros((3, 2)), Array1::zeros(3)).unwrap();
        assert!(PointwiseVelocity::new(layer).is_err());
    }
}
