// Latent-space forecaster built around the advection step

use super::reaction::{DiffusionReaction, PointwiseReaction};
use crate::advection::NeuralSemiLagrangian;
use crate::checkpoint::ModelWeights;
use crate::config::ForecastConfig;
use crate::error::{AdvectionError, Result};
use crate::field::{BicubicSampler, GeoCyclicPadding, PaddedResampler};
use crate::grid::LatLonGrid;
use crate::layers::{HaloConv3x3, PointwiseLinear};
use crate::velocity::{GaussianVelocity, PointwiseVelocity, VelocityModel};
use log::{debug, trace};
use ndarray::{Array4, Axis, concatenate, s};

/// One forecast step
#[derive(Debug, Clone)]
pub struct Forecast {
    /// Predicted common channels, (batch, common, lat, lon)
    pub state: Array4<f64>,
    /// Variational loss summed over sub-steps; `None` for a deterministic predictor
    pub aux_loss: Option<f64>,
}

pub struct Forecaster {
    input_proj: PointwiseLinear,
    advection: NeuralSemiLagrangian,
    reaction: Box<dyn DiffusionReaction>,
    output_proj: HaloConv3x3,
    input_channels: usize,
    common_channels: usize,
    num_substeps: usize,
    dt: f64,
}

impl Forecaster {
    /// Assemble a forecaster from its parts, checking every layer against `config`
    pub fn new(
        config: &ForecastConfig,
        input_proj: PointwiseLinear,
        velocity: VelocityModel,
        reaction: Box<dyn DiffusionReaction>,
        output_proj: HaloConv3x3,
    ) -> Result<Self> {
        config.validate()?;
        let hidden = config.hidden_channels();
        let common = config.model.common_channels;

        if input_proj.in_channels() != config.input_channels() {
            return Err(AdvectionError::shape(
                "input projection inputs",
                config.input_channels(),
                input_proj.in_channels(),
            ));
        }
        if input_proj.out_channels() != hidden {
            return Err(AdvectionError::shape("input projection outputs", hidden, input_proj.out_channels()));
        }
        if reaction.channels() != hidden {
            return Err(AdvectionError::shape("reaction channels", hidden, reaction.channels()));
        }
        if (output_proj.in_channels(), output_proj.out_channels()) != (hidden, common) {
            return Err(AdvectionError::shape(
                "output projection",
                format!("{} -> {}", hidden, common),
                format!("{} -> {}", output_proj.in_channels(), output_proj.out_channels()),
            ));
        }

        let advection_config = &config.advection;
        let resampler = PaddedResampler::new(
            GeoCyclicPadding,
            advection_config.halo,
            BicubicSampler::new(advection_config.cubic_coefficient),
        );
        let advection = NeuralSemiLagrangian::with_resampler(hidden, velocity, resampler)
            .with_pole_epsilon(advection_config.pole_epsilon);

        Ok(Self {
            input_proj,
            advection,
            reaction,
            output_proj,
            input_channels: config.input_channels(),
            common_channels: common,
            num_substeps: config.model.num_substeps,
            dt: config.substep_dt(),
        })
    }

    /// Build ensemble member `member` from checkpoint weights.
    ///
    /// With the ensemble enabled every member shares the weights and draws its own
    /// velocity noise, seeded from `ensemble.seed + member`.
    pub fn from_weights(config: &ForecastConfig, weights: &ModelWeights, member: usize) -> Result<Self> {
        let hidden = config.hidden_channels();
        let mean = PointwiseLinear::try_from(&weights.velocity)?;
        if mean.in_channels() != hidden {
            return Err(AdvectionError::shape("velocity inputs", hidden, mean.in_channels()));
        }

        let velocity = if config.ensemble.enable {
            let log_var = weights.velocity_log_var.as_ref().ok_or_else(|| {
                AdvectionError::InvalidConfig("ensemble enabled but the checkpoint has no velocity_log_var".into())
            })?;
            let seed = config.ensemble.seed.wrapping_add(member as u64);
            VelocityModel::variational(GaussianVelocity::new(mean, PointwiseLinear::try_from(log_var)?, seed)?)
        } else {
            VelocityModel::deterministic(PointwiseVelocity::new(mean)?)
        };

        let reaction = PointwiseReaction::new(PointwiseLinear::try_from(&weights.reaction)?)?;
        Self::new(
            config,
            PointwiseLinear::try_from(&weights.input_proj)?,
            velocity,
            Box::new(reaction),
            HaloConv3x3::try_from(&weights.output_proj)?,
        )
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn num_substeps(&self) -> usize {
        self.num_substeps
    }

    pub fn is_variational(&self) -> bool {
        self.advection.is_variational()
    }

    /// Advance the common channels by one forecast step
    ///
    /// # Arguments
    /// * `x` - Input laid out as `[dynamic | forcings | lat, lon]`, (batch, channel, lat, lon)
    ///
    /// # Returns
    /// `x[:, :common]` plus the projected latent increment
    pub fn forward(&self, x: &Array4<f64>) -> Result<Forecast> {
        let channels = x.dim().1;
        if channels != self.input_channels {
            return Err(AdvectionError::shape("forecaster inputs", self.input_channels, channels));
        }
        let grid = LatLonGrid::from_static_channels(x)?;

        let z0 = self.input_proj.apply(x)?;
        let mut z = z0.clone();
        let mut aux_loss = None;
        for substep in 0..self.num_substeps {
            let advected = self.advection.advect(&z, &grid, self.dt)?;
            let rate = self.reaction.tendency(&advected.features)?;
            z = z + &advected.features + &(rate * self.dt);

            if let Some(loss) = advected.aux_loss {
                *aux_loss.get_or_insert(0.0) += loss;
            }
            trace!("Sub-step {} of {} done", substep + 1, self.num_substeps);
        }

        let residual = self.output_proj.apply(&(z - &z0))?;
        let state = &x.slice(s![.., ..self.common_channels, .., ..]) + &residual;
        debug!("Forecast step done, aux loss {:?}", aux_loss);

        Ok(Forecast { state, aux_loss })
    }

    /// Input for the next step: the forecast replaces the common channels, the rest are carried over
    pub fn next_input(&self, x: &Array4<f64>, state: &Array4<f64>) -> Result<Array4<f64>> {
        let carried = x.slice(s![.., self.common_channels.., .., ..]);
        Ok(concatenate(Axis(1), &[state.view(), carried])?)
    }

    /// Autoregressive rollout of `steps` forecast steps from `x`
    pub fn rollout(&self, x: &Array4<f64>, steps: usize) -> Result<Vec<Forecast>> {
        let mut input = x.clone();
        let mut forecasts = Vec::with_capacity(steps);
        for _ in 0..steps {
            let forecast = self.forward(&input)?;
            input = self.next_input(&input, &forecast.state)?;
            forecasts.push(forecast);
        }
        Ok(forecasts)
    }
}
