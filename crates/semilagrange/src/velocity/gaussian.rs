// Variational velocity predictor with a Gaussian posterior

use super::{VariationalVelocityField, VelocityPrediction};
use crate::error::{AdvectionError, Result};
use crate::layers::PointwiseLinear;
use ndarray::{Array4, Zip};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

const LOG_VAR_LIMIT: f64 = 10.0;

/// Predicts a mean and log-variance per velocity channel and draws one reparameterised sample.
///
/// The noise stream is seeded per member, so repeated calls with the same input agree.
#[derive(Debug, Clone)]
pub struct GaussianVelocity {
    mean: PointwiseLinear,
    log_var: PointwiseLinear,
    seed: u64,
}

impl GaussianVelocity {
    pub fn new(mean: PointwiseLinear, log_var: PointwiseLinear, seed: u64) -> Result<Self> {
        if mean.out_channels() != 2 * mean.in_channels() {
            return Err(AdvectionError::shape(
                "velocity mean outputs",
                2 * mean.in_channels(),
                mean.out_channels(),
            ));
        }
        if mean.weight().dim() != log_var.weight().dim() {
            return Err(AdvectionError::shape(
                "velocity log-variance weights",
                format!("{:?}", mean.weight().dim()),
                format!("{:?}", log_var.weight().dim()),
            ));
        }
        Ok(Self { mean, log_var, seed })
    }

    /// Same weights, different noise stream (one per ensemble member)
    pub fn with_seed(&self, seed: u64) -> Self {
        Self {
            seed,
            ..self.clone()
        }
    }

    pub fn mean(&self) -> &PointwiseLinear {
        &self.mean
    }

    pub fn log_var(&self) -> &PointwiseLinear {
        &self.log_var
    }
}

impl VariationalVelocityField for GaussianVelocity {
    fn predict(&self, features: &Array4<f64>) -> Result<(VelocityPrediction, f64)> {
        let mu = self.mean.apply(features)?;
        let log_var = self
            .log_var
            .apply(features)?
            .mapv_into(|x| x.clamp(-LOG_VAR_LIMIT, LOG_VAR_LIMIT));

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut sample = Array4::<f64>::zeros(mu.raw_dim());
        // Sequential so the noise order is fixed
        Zip::from(&mut sample)
            .and(&mu)
            .and(&log_var)
            .for_each(|s, &m, &lv| {
                let eps: f64 = rng.sample(StandardNormal);
                *s = m + (0.5 * lv).exp() * eps;
            });

        // KL(N(mu, sigma²) || N(0, 1)), averaged over elements
        let count = mu.len().max(1) as f64;
        let kl = Zip::from(&mu)
            .and(&log_var)
            .fold(0.0, |acc, &m, &lv| acc + 0.5 * (m * m + lv.exp() - lv - 1.0))
            / count;

        Ok((VelocityPrediction::from_stacked(&sample)?, kl))
    }
}
