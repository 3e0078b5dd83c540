// Neural semi-Lagrangian advection on a latitude/longitude grid

use crate::constants::POLE_CLAMP_EPSILON;
use crate::error::{AdvectionError, Result};
use crate::field::{GeoCyclicPadding, HaloPadding, PaddedResampler};
use crate::geometry::{LatLon, SamplingGrid, to_standard};
use crate::grid::LatLonGrid;
use crate::velocity::{VelocityModel, VelocityPrediction};
use log::debug;
use ndarray::{Array4, Zip};

/// Output of one advection step
#[derive(Debug, Clone)]
pub struct Advected {
    pub features: Array4<f64>,
    /// Regularization term from a variational predictor, passed through untouched
    pub aux_loss: Option<f64>,
}

/// Departure points in standard coordinates, one per (batch, channel, lat, lon)
#[derive(Debug, Clone)]
pub struct DeparturePoints {
    pub lat: Array4<f64>,
    pub lon: Array4<f64>,
}

pub struct NeuralSemiLagrangian<P: HaloPadding = GeoCyclicPadding> {
    channels: usize,
    velocity: VelocityModel,
    resampler: PaddedResampler<P>,
    pole_epsilon: f64,
}

impl NeuralSemiLagrangian<GeoCyclicPadding> {
    pub fn new(channels: usize, velocity: VelocityModel) -> Self {
        Self::with_resampler(channels, velocity, PaddedResampler::default())
    }
}

impl<P: HaloPadding> NeuralSemiLagrangian<P> {
    pub fn with_resampler(channels: usize, velocity: VelocityModel, resampler: PaddedResampler<P>) -> Self {
        Self {
            channels,
            velocity,
            resampler,
            pole_epsilon: POLE_CLAMP_EPSILON,
        }
    }

    pub fn with_pole_epsilon(mut self, epsilon: f64) -> Self {
        self.pole_epsilon = epsilon;
        self
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_variational(&self) -> bool {
        self.velocity.is_variational()
    }

    /// Advect every channel of `features` along its own predicted velocity
    ///
    /// # Arguments
    /// * `features` - Field to transport, (batch, channel, lat, lon)
    /// * `grid` - Physical coordinates of the cells
    /// * `dt` - Dimensionless time step
    ///
    /// # Returns
    /// Field of the same shape sampled at the departure points, plus the predictor's auxiliary loss
    pub fn advect(&self, features: &Array4<f64>, grid: &LatLonGrid, dt: f64) -> Result<Advected> {
        let shape = features.dim();
        if shape.1 != self.channels {
            return Err(AdvectionError::shape("advected channels", self.channels, shape.1));
        }

        let (velocity, aux_loss) = self.velocity.predict(features)?;
        for (what, component) in [("predicted velocity u", &velocity.u), ("predicted velocity v", &velocity.v)] {
            if component.dim() != shape {
                return Err(AdvectionError::shape(
                    what,
                    format!("{:?}", shape),
                    format!("{:?}", component.dim()),
                ));
            }
        }
        debug!(
            "Advecting {} channels with dt = {:.3e}, peak speed {:.3e}",
            self.channels,
            dt,
            velocity.peak_speed()
        );

        let departures = self.departure_points(&velocity, grid, dt)?;
        let coords = grid.extent()?.sampling_grid(&departures.lat, &departures.lon)?;
        let features = self.resampler.resample(features, &coords)?;

        Ok(Advected { features, aux_loss })
    }

    /// Trace every cell back over `dt` through the frame rotated onto it
    pub fn departure_points(
        &self,
        velocity: &VelocityPrediction,
        grid: &LatLonGrid,
        dt: f64,
    ) -> Result<DeparturePoints> {
        let shape = velocity.u.dim();
        let (lat_grid, lon_grid) = grid.expand_channels(shape)?;

        let mut lat = Array4::zeros(shape);
        let mut lon = Array4::zeros(shape);
        let epsilon = self.pole_epsilon;
        Zip::from(&mut lat)
            .and(&mut lon)
            .and(&velocity.u)
            .and(&velocity.v)
            .and(&lat_grid)
            .and(&lon_grid)
            .par_for_each(|lat, lon, &u, &v, &lat_p, &lon_p| {
                // Upstream offset in the rotated frame
                let offset = LatLon::new(-v * dt, -u * dt);
                let departure = to_standard(offset, LatLon::new(lat_p, lon_p), epsilon);
                *lat = departure.lat;
                *lon = departure.lon;
            });

        Ok(DeparturePoints { lat, lon })
    }

    /// Normalized sampling coordinates for a predicted velocity, before the padding rescale
    pub fn sampling_grid(&self, velocity: &VelocityPrediction, grid: &LatLonGrid, dt: f64) -> Result<SamplingGrid> {
        let departures = self.departure_points(velocity, grid, dt)?;
        grid.extent()?.sampling_grid(&departures.lat, &departures.lon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::velocity::{GaussianVelocity, UniformVelocity, VelocityField};
    use crate::layers::PointwiseLinear;
    use ndarray::{Array1, Array2};
    use rstest::rstest;
    use std::f64::consts::TAU;

    fn zonal_field(grid: &LatLonGrid, channels: usize) -> Array4<f64> {
        let (batch, height, width) = grid.dim();
        Array4::from_shape_fn((batch, channels, height, width), |(b, c, i, j)| {
            (grid.lon()[[b, i, j]] + c as f64).sin() * grid.lat()[[b, i, j]].cos()
        })
    }

    #[rstest]
    #[case(4, 8)]
    #[case(9, 16)]
    fn test_zero_velocity_is_identity(#[case] height: usize, #[case] width: usize) {
        let grid = LatLonGrid::regular(2, height, width).unwrap();
        let features = zonal_field(&grid, 3);
        let step = NeuralSemiLagrangian::new(3, VelocityModel::deterministic(UniformVelocity::new(0.0, 0.0)));

        let advected = step.advect(&features, &grid, 0.5).unwrap();

        assert!(advected.aux_loss.is_none());
        for (a, b) in advected.features.iter().zip(features.iter()) {
            assert!((a - b).abs() < 1e-9, "got {}, expected {}", a, b);
        }
    }

    #[test]
    fn test_output_keeps_channel_count() {
        let grid = LatLonGrid::regular(1, 6, 12).unwrap();
        let features = zonal_field(&grid, 5);
        let step = NeuralSemiLagrangian::new(5, VelocityModel::deterministic(UniformVelocity::new(0.3, -0.2)));

        let advected = step.advect(&features, &grid, 0.1).unwrap();
        assert_eq!(advected.features.dim(), features.dim());
    }

    #[test]
    fn test_channel_mismatch_is_fatal() {
        let grid = LatLonGrid::regular(1, 4, 8).unwrap();
        let features = zonal_field(&grid, 2);
        let step = NeuralSemiLagrangian::new(3, VelocityModel::deterministic(UniformVelocity::new(0.0, 0.0)));

        let result = step.advect(&features, &grid, 0.1);
        assert!(matches!(result, Err(AdvectionError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_grid_mismatch_is_fatal() {
        let grid = LatLonGrid::regular(1, 4, 8).unwrap();
        let other = LatLonGrid::regular(1, 6, 8).unwrap();
        let features = zonal_field(&grid, 2);
        let step = NeuralSemiLagrangian::new(2, VelocityModel::deterministic(UniformVelocity::new(0.0, 0.0)));

        assert!(step.advect(&features, &other, 0.1).is_err());
    }

    #[test]
    fn test_departure_is_upstream() {
        let grid = LatLonGrid::regular(1, 4, 8).unwrap();
        let step = NeuralSemiLagrangian::new(1, VelocityModel::deterministic(UniformVelocity::new(1.0, 0.5)));
        let features = Array4::zeros((1, 1, 4, 8));
        let (velocity, _) = step.velocity.predict(&features).unwrap();

        let departures = step.departure_points(&velocity, &grid, 0.1).unwrap();

        // Eastward, northward wind: departure lies west and south of the arrival cell
        let arrival_lon = grid.lon()[[0, 1, 3]];
        assert!(departures.lon[[0, 0, 1, 3]] < arrival_lon);
        assert!(departures.lat[[0, 0, 1, 3]] < grid.lat()[[0, 1, 3]]);
    }

    #[test]
    fn test_sampling_grid_in_range() {
        let grid = LatLonGrid::regular(1, 6, 12).unwrap();
        let step = NeuralSemiLagrangian::new(1, VelocityModel::deterministic(UniformVelocity::new(4.0, -7.0)));
        let features = Array4::zeros((1, 1, 6, 12));
        let (velocity, _) = step.velocity.predict(&features).unwrap();

        let coords = step.sampling_grid(&velocity, &grid, 0.3).unwrap();
        assert!(coords.x.iter().chain(coords.y.iter()).all(|c| (-1.0..=1.0).contains(c)));
    }

    #[test]
    fn test_longitude_shift_by_full_turn_is_invisible() {
        let grid = LatLonGrid::regular(1, 6, 12).unwrap();
        let shifted = grid.with_longitude_offset(TAU);
        let features = zonal_field(&grid, 2);
        let step = NeuralSemiLagrangian::new(2, VelocityModel::deterministic(UniformVelocity::new(0.8, 0.3)));

        let a = step.advect(&features, &grid, 0.1).unwrap();
        let b = step.advect(&features, &shifted, 0.1).unwrap();

        for (x, y) in a.features.iter().zip(b.features.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_variational_loss_is_passed_through() {
        let channels = 2;
        let mean = PointwiseLinear::new(Array2::zeros((4, 2)), Array1::from_elem(4, 1.0)).unwrap();
        let log_var = PointwiseLinear::new(Array2::zeros((4, 2)), Array1::zeros(4)).unwrap();
        let predictor = GaussianVelocity::new(mean, log_var, 5).unwrap();
        let step = NeuralSemiLagrangian::new(channels, VelocityModel::variational(predictor));
        let grid = LatLonGrid::regular(1, 4, 8).unwrap();
        let features = zonal_field(&grid, channels);

        let advected = step.advect(&features, &grid, 0.01).unwrap();

        assert!(step.is_variational());
        assert!((advected.aux_loss.unwrap() - 0.5).abs() < 1e-12);
    }

    /// Returns a `v` component with twice the channels of `u`
    struct LopsidedVelocity;

    impl VelocityField for LopsidedVelocity {
        fn predict(&self, features: &Array4<f64>) -> Result<VelocityPrediction> {
            let (b, c, h, w) = features.dim();
            Ok(VelocityPrediction {
                u: Array4::zeros((b, c, h, w)),
                v: Array4::zeros((b, 2 * c, h, w)),
            })
        }
    }

    #[test]
    fn test_mismatched_v_component_rejected() {
        let step = NeuralSemiLagrangian::new(1, VelocityModel::deterministic(LopsidedVelocity));
        let grid = LatLonGrid::regular(1, 4, 8).unwrap();
        let features = zonal_field(&grid, 1);

        let result = step.advect(&features, &grid, 0.01);

        assert!(matches!(result, Err(AdvectionError::ShapeMismatch { what, .. }) if what == "predicted velocity v"));
    }
}
