// Forecast driver: builds the initial state, runs the ensemble and reports each step

use crate::stats::{FieldStats, ensemble_spread};
use log::{error, info};
use semilagrange::checkpoint::ModelWeights;
use semilagrange::forecast::{ensemble_mean, run_ensemble};
use semilagrange::synthetic::initial_state;
use semilagrange::{AdvectionError, ForecastConfig, LatLonGrid};

#[derive(Debug, Clone)]
pub struct StepReport {
    /// 1-based forecast step
    pub step: usize,
    /// Statistics of the ensemble-mean state
    pub stats: FieldStats,
    pub spread: f64,
    /// Auxiliary loss averaged over members
    pub aux_loss: Option<f64>,
}

/// Load the checkpoint named in the config, or draw fresh weights from the model seed
pub fn load_weights(config: &ForecastConfig) -> Result<ModelWeights, AdvectionError> {
    match &config.model.checkpoint {
        Some(path) => ModelWeights::load_from_file(path),
        None => {
            info!("No checkpoint configured, using random weights (seed {})", config.model.seed);
            Ok(ModelWeights::random(config))
        }
    }
}

/// Run `steps` forecast steps and log the ensemble statistics of each
pub fn run(config: &ForecastConfig, steps: usize) -> Result<Vec<StepReport>, AdvectionError> {
    config.validate()?;
    let weights = load_weights(config)?;

    let grid = LatLonGrid::regular(config.grid.batch, config.grid.lat_size, config.grid.lon_size)?;
    let x = initial_state(config, &grid)?;
    info!(
        "Initial state {:?}, dt = {:.4e} x {} sub-steps",
        x.dim(),
        config.substep_dt(),
        config.model.num_substeps
    );

    let members = run_ensemble(config, &weights, &x, steps)?;

    let mut reports = Vec::with_capacity(steps);
    for step in 0..steps {
        let mean = ensemble_mean(&members, step)?;
        let states: Vec<_> = members.iter().map(|rollout| &rollout[step].state).collect();
        let aux: Vec<f64> = members.iter().filter_map(|rollout| rollout[step].aux_loss).collect();

        let report = StepReport {
            step: step + 1,
            stats: FieldStats::of(&mean),
            spread: ensemble_spread(&states, &mean),
            aux_loss: (!aux.is_empty()).then(|| aux.iter().sum::<f64>() / aux.len() as f64),
        };
        log_report(&report);
        reports.push(report);
    }
    Ok(reports)
}

fn log_report(report: &StepReport) {
    let stats = &report.stats;
    info!(
        "Step {:>3}: min {:+.4} max {:+.4} mean {:+.4} rms {:.4} spread {:.4}{}",
        report.step,
        stats.min,
        stats.max,
        stats.mean,
        stats.rms,
        report.spread,
        report.aux_loss.map(|loss| format!(" aux {:.4e}", loss)).unwrap_or_default()
    );
    if !stats.is_finite() {
        error!("Step {}: {} non-finite values in the forecast", report.step, stats.non_finite);
    }
}
