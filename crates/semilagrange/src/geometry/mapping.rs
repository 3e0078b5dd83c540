// Departure coordinates -> normalized sampling coordinates with the geocyclic wrap

use super::rotation::LatLon;
use crate::error::{AdvectionError, Result};
use ndarray::{Array4, Zip};

/// Physical bounds of the sampled domain.
///
/// Normalized coordinate -1 maps to the minimum and +1 to the maximum. For a global grid built
/// with [`crate::LatLonGrid::extent`] these are cell edges: the longitude seam and the two poles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridExtent {
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
}

/// Normalized sampling coordinate, x along longitude and y along latitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
}

/// Per-element sampling coordinates for a whole feature tensor
#[derive(Debug, Clone)]
pub struct SamplingGrid {
    pub x: Array4<f64>,
    pub y: Array4<f64>,
}

impl GridExtent {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Result<Self> {
        let extent = Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        };
        extent.validate()?;
        Ok(extent)
    }

    pub fn min_lat(&self) -> f64 {
        self.min_lat
    }

    pub fn max_lat(&self) -> f64 {
        self.max_lat
    }

    pub fn min_lon(&self) -> f64 {
        self.min_lon
    }

    pub fn max_lon(&self) -> f64 {
        self.max_lon
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    fn validate(&self) -> Result<()> {
        let lat_span = self.lat_span();
        let lon_span = self.lon_span();
        if !(lat_span.is_finite() && lat_span > 0.0) {
            return Err(AdvectionError::DegenerateGrid(format!(
                "latitude extent [{}, {}] has no width",
                self.min_lat, self.max_lat
            )));
        }
        if !(lon_span.is_finite() && lon_span > 0.0) {
            return Err(AdvectionError::DegenerateGrid(format!(
                "longitude extent [{}, {}] has no width",
                self.min_lon, self.max_lon
            )));
        }
        Ok(())
    }

    /// Map a departure point to normalized sampling space
    ///
    /// # Arguments
    /// * `departure` - Departure point in standard coordinates
    ///
    /// # Returns
    /// Sampling coordinate in [-1, 1]², wrapped in longitude and folded across the poles
    pub fn map(&self, departure: LatLon) -> SamplePoint {
        let lon_span = self.lon_span();
        let lat_span = self.lat_span();
        // Reduce by the periods in physical units first; normalizing a huge
        // departure before the wrap overflows to infinity
        let lon = (departure.lon - self.min_lon).rem_euclid(lon_span);
        let lat = (departure.lat - self.min_lat).rem_euclid(2.0 * lat_span);
        geocyclic_wrap(2.0 * lon / lon_span - 1.0, 2.0 * lat / lat_span - 1.0)
    }

    /// Elementwise [`GridExtent::map`] over departure tensors
    pub fn sampling_grid(&self, lat_dep: &Array4<f64>, lon_dep: &Array4<f64>) -> Result<SamplingGrid> {
        if lat_dep.dim() != lon_dep.dim() {
            return Err(AdvectionError::shape(
                "departure longitude",
                format!("{:?}", lat_dep.dim()),
                format!("{:?}", lon_dep.dim()),
            ));
        }

        let mut x = Array4::zeros(lat_dep.raw_dim());
        let mut y = Array4::zeros(lat_dep.raw_dim());
        Zip::from(&mut x)
            .and(&mut y)
            .and(lat_dep)
            .and(lon_dep)
            .par_for_each(|x, y, &lat, &lon| {
                let point = self.map(LatLon::new(lat, lon));
                *x = point.x;
                *y = point.y;
            });

        Ok(SamplingGrid { x, y })
    }
}

/// Apply longitude periodicity and the pole-crossing correction to raw normalized coordinates
pub fn geocyclic_wrap(x: f64, y: f64) -> SamplePoint {
    // Periodic in longitude
    let mut x = (x + 1.0).rem_euclid(2.0) - 1.0;

    // Two pole crossings cancel, so fold latitude with period 4 before mirroring
    let mut y = (y + 1.0).rem_euclid(4.0) - 1.0;

    if y > 1.0 {
        // Continuing through a pole lands half a turn away in longitude;
        // the shift direction follows the pre-mirror sign of x
        x = if x <= 0.0 { x + 1.0 } else { x - 1.0 };
        y = 2.0 - y;
    }

    SamplePoint { x, y }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    fn global_extent() -> GridExtent {
        GridExtent::new(-FRAC_PI_2, FRAC_PI_2, -PI / 8.0, TAU - PI / 8.0).unwrap()
    }

    #[rstest]
    #[case(0.5, 0.5, 0.5, 0.5)] // inside, untouched
    #[case(1.25, 0.0, -0.75, 0.0)] // past the east edge
    #[case(-1.5, 0.0, 0.5, 0.0)] // past the west edge
    #[case(-0.5, 1.2, 0.5, 0.8)] // over the north pole, shift east
    #[case(0.5, 1.2, -0.5, 0.8)] // over the north pole, shift west
    #[case(0.0, -1.3, 1.0, -0.7)] // over the south pole, x == 0 shifts east
    #[case(0.3, 3.5, 0.3, -0.5)] // crossed both poles
    fn test_geocyclic_wrap(
        #[case] x: f64,
        #[case] y: f64,
        #[case] expected_x: f64,
        #[case] expected_y: f64,
    ) {
        let point = geocyclic_wrap(x, y);

        assert!((point.x - expected_x).abs() < 1e-12, "x was {}, expected {}", point.x, expected_x);
        assert!((point.y - expected_y).abs() < 1e-12, "y was {}, expected {}", point.y, expected_y);
    }

    #[test]
    fn test_mirror_matches_single_reflection() {
        for i in 0..=40 {
            let y = 1.0 + i as f64 * 0.05;
            assert!((geocyclic_wrap(0.1, y).y - (2.0 - y)).abs() < 1e-12);
            assert!((geocyclic_wrap(0.1, -y).y - (-(2.0 - y))).abs() < 1e-12);
        }
    }

    #[test]
    fn test_wrap_always_in_range() {
        let mut x = -97.3;
        while x < 97.3 {
            let mut y = -41.7;
            while y < 41.7 {
                let point = geocyclic_wrap(x, y);
                assert!((-1.0..=1.0).contains(&point.x), "x out of range for ({}, {})", x, y);
                assert!((-1.0..=1.0).contains(&point.y), "y out of range for ({}, {})", x, y);
                y += 0.37;
            }
            x += 0.53;
        }
    }

    #[test]
    fn test_map_seam_is_periodic() {
        let extent = global_extent();
        let a = extent.map(LatLon::new(0.3, 0.2));
        let b = extent.map(LatLon::new(0.3, 0.2 + TAU));

        assert!((a.x - b.x).abs() < 1e-12);
        assert!((a.y - b.y).abs() < 1e-12);
    }

    #[test]
    fn test_map_pole_mirror_points_to_antipode() {
        let extent = global_extent();
        // 10° past the north pole along lon = 0 is 80° N along lon = π
        let beyond = extent.map(LatLon::new(FRAC_PI_2 + 10f64.to_radians(), 0.0));
        let antipode = extent.map(LatLon::new(FRAC_PI_2 - 10f64.to_radians(), PI));

        assert!((beyond.x - antipode.x).abs() < 1e-12);
        assert!((beyond.y - antipode.y).abs() < 1e-12);
    }

    #[rstest]
    #[case(f64::MAX, f64::MAX)]
    #[case(-f64::MAX, f64::MAX)]
    #[case(f64::MAX, f64::MIN)]
    #[case(1e300, -1e300)]
    #[case(-3.0e17, 7.5e16)]
    fn test_map_huge_departures_in_range(#[case] lat: f64, #[case] lon: f64) {
        let point = global_extent().map(LatLon::new(lat, lon));

        assert!((-1.0..=1.0).contains(&point.x), "x = {}", point.x);
        assert!((-1.0..=1.0).contains(&point.y), "y = {}", point.y);
    }

    #[test]
    fn test_map_matches_normalized_wrap() {
        let extent = global_extent();
        for (lat, lon) in [(0.3, 0.2), (2.1, -4.0), (-5.0, 9.5), (11.0, 30.0)] {
            let x = 2.0 * (lon - extent.min_lon()) / extent.lon_span() - 1.0;
            let y = 2.0 * (lat - extent.min_lat()) / extent.lat_span() - 1.0;
            let expected = geocyclic_wrap(x, y);

            let point = extent.map(LatLon::new(lat, lon));

            assert!((point.x - expected.x).abs() < 1e-9, "x at ({}, {})", lat, lon);
            assert!((point.y - expected.y).abs() < 1e-9, "y at ({}, {})", lat, lon);
        }
    }

    #[test]
    fn test_extent_keeps_validated_bounds() {
        let extent = global_extent();

        assert_eq!(extent.min_lat(), -FRAC_PI_2);
        assert_eq!(extent.max_lat(), FRAC_PI_2);
        assert!((extent.lon_span() - TAU).abs() < 1e-12);
        assert!((extent.lat_span() - PI).abs() < 1e-12);
    }

    #[rstest]
    #[case(0.0, 0.0, 1.0, 2.0)]
    #[case(-0.5, 0.5, 1.0, 1.0)]
    #[case(0.0, 1.0, f64::NAN, 2.0)]
    fn test_degenerate_extent_rejected(
        #[case] min_lat: f64,
        #[case] max_lat: f64,
        #[case] min_lon: f64,
        #[case] max_lon: f64,
    ) {
        let result = GridExtent::new(min_lat, max_lat, min_lon, max_lon);
        assert!(matches!(result, Err(AdvectionError::DegenerateGrid(_))));
    }
}
