// Ensemble rollouts, one forecaster per member

use super::model::{Forecast, Forecaster};
use crate::checkpoint::ModelWeights;
use crate::config::ForecastConfig;
use crate::error::{AdvectionError, Result};
use log::{info, warn};
use ndarray::Array4;
use rayon::prelude::*;

/// Roll out every ensemble member from the same initial state.
///
/// Members run in parallel; the result is in member order regardless of scheduling.
/// A deterministic predictor has nothing to perturb, so it always yields a single member.
pub fn run_ensemble(
    config: &ForecastConfig,
    weights: &ModelWeights,
    x: &Array4<f64>,
    steps: usize,
) -> Result<Vec<Vec<Forecast>>> {
    let members = if config.ensemble.enable {
        config.ensemble.members
    } else {
        if config.ensemble.members > 1 {
            warn!(
                "Ensemble of {} members requested without the variational predictor, running one",
                config.ensemble.members
            );
        }
        1
    };
    info!("Rolling out {} member(s) for {} step(s)", members, steps);

    (0..members)
        .into_par_iter()
        .map(|member| Forecaster::from_weights(config, weights, member)?.rollout(x, steps))
        .collect()
}

/// Member average of the forecasts at `step`
pub fn ensemble_mean(members: &[Vec<Forecast>], step: usize) -> Result<Array4<f64>> {
    let mut states = members.iter().map(|rollout| {
        rollout
            .get(step)
            .map(|forecast| &forecast.state)
            .ok_or_else(|| AdvectionError::shape("rollout length", step + 1, rollout.len()))
    });

    let mut sum = match states.next() {
        Some(first) => first?.clone(),
        None => return Err(AdvectionError::shape("ensemble members", ">= 1", 0)),
    };
    for state in states {
        let state = state?;
        if state.dim() != sum.dim() {
            return Err(AdvectionError::shape(
                "member state",
                format!("{:?}", sum.dim()),
                format!("{:?}", state.dim()),
            ));
        }
        sum += state;
    }
    Ok(sum / members.len() as f64)
}
