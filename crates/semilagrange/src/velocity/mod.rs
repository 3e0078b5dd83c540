// Velocity predictors consumed by the advection step

pub mod gaussian;
pub mod pointwise;

pub use gaussian::GaussianVelocity;
pub use pointwise::{PointwiseVelocity, UniformVelocity};

use crate::error::{AdvectionError, Result};
use ndarray::{Array4, Axis, s};

/// Angular speed in the rotated local frame at every arrival cell
#[derive(Debug, Clone)]
pub struct VelocityPrediction {
    /// Along-longitude component, (batch, channel, lat, lon)
    pub u: Array4<f64>,
    /// Along-latitude component, same shape as `u`
    pub v: Array4<f64>,
}

impl VelocityPrediction {
    pub fn new(u: Array4<f64>, v: Array4<f64>) -> Result<Self> {
        if u.dim() != v.dim() {
            return Err(AdvectionError::shape(
                "meridional velocity",
                format!("{:?}", u.dim()),
                format!("{:?}", v.dim()),
            ));
        }
        Ok(Self { u, v })
    }

    /// Split a stacked (batch, 2C, lat, lon) tensor: the first C channels are u, the rest v
    pub fn from_stacked(stacked: &Array4<f64>) -> Result<Self> {
        let channels = stacked.len_of(Axis(1));
        if channels % 2 != 0 {
            return Err(AdvectionError::shape("stacked velocity channels", "an even count", channels));
        }
        let half = channels / 2;
        Ok(Self {
            u: stacked.slice(s![.., ..half, .., ..]).to_owned(),
            v: stacked.slice(s![.., half.., .., ..]).to_owned(),
        })
    }

    pub fn channels(&self) -> usize {
        self.u.len_of(Axis(1))
    }

    /// Largest angular speed magnitude, for logging and CFL checks
    pub fn peak_speed(&self) -> f64 {
        self.u
            .iter()
            .zip(self.v.iter())
            .fold(0.0, |peak: f64, (u, v)| peak.max(u.hypot(*v)))
    }
}

/// Deterministic predictor: features -> velocity
pub trait VelocityField: Send + Sync {
    fn predict(&self, features: &Array4<f64>) -> Result<VelocityPrediction>;
}

/// Variational predictor: features -> velocity plus an auxiliary regularization scalar
pub trait VariationalVelocityField: Send + Sync {
    fn predict(&self, features: &Array4<f64>) -> Result<(VelocityPrediction, f64)>;
}

/// Predictor variant, chosen once when the advection step is built
pub enum VelocityModel {
    Deterministic(Box<dyn VelocityField>),
    Variational(Box<dyn VariationalVelocityField>),
}

impl VelocityModel {
    pub fn deterministic(field: impl VelocityField + 'static) -> Self {
        Self::Deterministic(Box::new(field))
    }

    pub fn variational(field: impl VariationalVelocityField + 'static) -> Self {
        Self::Variational(Box::new(field))
    }

    pub fn is_variational(&self) -> bool {
        matches!(self, Self::Variational(_))
    }

    /// Run the predictor; the auxiliary loss is `None` for the deterministic variant
    pub fn predict(&self, features: &Array4<f64>) -> Result<(VelocityPrediction, Option<f64>)> {
        match self {
            Self::Deterministic(field) => Ok((field.predict(features)?, None)),
            Self::Variational(field) => {
                let (velocity, aux_loss) = field.predict(features)?;
                Ok((velocity, Some(aux_loss)))
            }
        }
    }
}
