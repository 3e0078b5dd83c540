// Synthetic initial states for driving the forecaster without a dataset

use crate::config::ForecastConfig;
use crate::error::Result;
use crate::geometry::LatLon;
use crate::grid::LatLonGrid;
use glam::DVec3;
use ndarray::{Array4, Axis, Zip, concatenate};
use noise::{NoiseFn, Perlin};

/// Shift in noise space between consecutive channels
const CHANNEL_OFFSET: f64 = 7.31;

/// Perlin noise sampled on the unit sphere, so fields have no seam and no pole singularity
#[derive(Debug, Clone)]
pub struct SphericalNoise {
    perlin: Perlin,
    frequency: f64,
    amplitude: f64,
}

impl SphericalNoise {
    pub fn new(seed: u32, frequency: f64, amplitude: f64) -> Self {
        Self {
            perlin: Perlin::new(seed),
            frequency,
            amplitude,
        }
    }

    pub fn sample(&self, dir: DVec3) -> f64 {
        let p = dir * self.frequency;
        self.perlin.get([p.x, p.y, p.z]) * self.amplitude
    }

    /// One independent noise layer per channel, evaluated at every grid cell
    pub fn field(&self, grid: &LatLonGrid, channels: usize) -> Array4<f64> {
        let (batch, height, width) = grid.dim();
        let mut out = Array4::zeros((batch, channels, height, width));
        for (channel, mut plane) in out.axis_iter_mut(Axis(1)).enumerate() {
            let offset = DVec3::new(0.0, 0.0, CHANNEL_OFFSET * channel as f64);
            Zip::from(&mut plane)
                .and(grid.lat())
                .and(grid.lon())
                .par_for_each(|value, &lat, &lon| {
                    let dir = LatLon::new(lat, lon).to_unit_vector();
                    let p = dir * self.frequency + offset;
                    *value = self.perlin.get([p.x, p.y, p.z]) * self.amplitude;
                });
        }
        out
    }
}

/// Append the latitude and longitude planes to a prognostic field
///
/// # Returns
/// Model input laid out as `[prognostic | lat, lon]`
pub fn stack_inputs(prognostic: &Array4<f64>, grid: &LatLonGrid) -> Result<Array4<f64>> {
    let (batch, _, height, width) = prognostic.dim();
    let (lat, lon) = grid.expand_channels((batch, 1, height, width))?;
    Ok(concatenate(Axis(1), &[prognostic.view(), lat.view(), lon.view()])?)
}

/// Noise-driven dynamic and forcing channels on `grid`, ready for `Forecaster::forward`
pub fn initial_state(config: &ForecastConfig, grid: &LatLonGrid) -> Result<Array4<f64>> {
    let initial = &config.initial;
    let noise = SphericalNoise::new(initial.seed, initial.frequency, initial.amplitude);
    let channels = config.model.dynamic_channels + config.model.forcing_channels;
    stack_inputs(&noise.field(grid, channels), grid)
}
