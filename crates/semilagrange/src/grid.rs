// Physical latitude/longitude coordinates of a rectangular grid

use crate::error::{AdvectionError, Result};
use crate::geometry::GridExtent;
use log::warn;
use ndarray::{Array3, Array4, Axis, Zip, s};
use std::f64::consts::{FRAC_PI_2, PI, TAU};

const GLOBAL_TOLERANCE: f64 = 1e-6;

/// Latitude and longitude (radians) of every cell, shaped (batch, lat, lon).
///
/// Latitude must increase along the lat axis and longitude along the lon axis.
#[derive(Debug, Clone)]
pub struct LatLonGrid {
    lat: Array3<f64>,
    lon: Array3<f64>,
}

impl LatLonGrid {
    pub fn new(lat: Array3<f64>, lon: Array3<f64>) -> Result<Self> {
        if lat.dim() != lon.dim() {
            return Err(AdvectionError::shape(
                "longitude grid",
                format!("{:?}", lat.dim()),
                format!("{:?}", lon.dim()),
            ));
        }
        let (_, height, width) = lat.dim();
        if height < 2 || width < 2 {
            return Err(AdvectionError::DegenerateGrid(format!(
                "need at least 2x2 cells, got {}x{}",
                height, width
            )));
        }

        let lat_ascending = Zip::from(lat.slice(s![.., 1.., ..]))
            .and(lat.slice(s![.., ..-1, ..]))
            .all(|&next, &prev| next > prev);
        if !lat_ascending {
            return Err(AdvectionError::DegenerateGrid(
                "latitude must strictly increase along the lat axis".into(),
            ));
        }
        let lon_ascending = Zip::from(lon.slice(s![.., .., 1..]))
            .and(lon.slice(s![.., .., ..-1]))
            .all(|&next, &prev| next > prev);
        if !lon_ascending {
            return Err(AdvectionError::DegenerateGrid(
                "longitude must strictly increase along the lon axis".into(),
            ));
        }

        let grid = Self { lat, lon };
        grid.warn_if_not_global()?;
        Ok(grid)
    }

    /// Global cell-centred grid: latitudes at the centres of `lat_size` equal bands,
    /// longitudes starting at 0 with spacing 2π / `lon_size`
    pub fn regular(batch: usize, lat_size: usize, lon_size: usize) -> Result<Self> {
        let dlat = PI / lat_size as f64;
        let dlon = TAU / lon_size as f64;
        let lat = Array3::from_shape_fn((batch, lat_size, lon_size), |(_, i, _)| {
            -FRAC_PI_2 + dlat * (i as f64 + 0.5)
        });
        let lon = Array3::from_shape_fn((batch, lat_size, lon_size), |(_, _, j)| dlon * j as f64);
        Self::new(lat, lon)
    }

    /// Read the grid from the two trailing static channels (lat, then lon) of an input tensor
    pub fn from_static_channels(input: &Array4<f64>) -> Result<Self> {
        let channels = input.dim().1;
        if channels < 2 {
            return Err(AdvectionError::shape("static channels", ">= 2 channels", channels));
        }
        let lat = input.index_axis(Axis(1), channels - 2).to_owned();
        let lon = input.index_axis(Axis(1), channels - 1).to_owned();
        Self::new(lat, lon)
    }

    pub fn lat(&self) -> &Array3<f64> {
        &self.lat
    }

    pub fn lon(&self) -> &Array3<f64> {
        &self.lon
    }

    /// (batch, lat, lon)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.lat.dim()
    }

    /// Same grid with every longitude moved by `offset` radians
    pub fn with_longitude_offset(&self, offset: f64) -> Self {
        Self {
            lat: self.lat.clone(),
            lon: &self.lon + offset,
        }
    }

    /// Cell-edge extent of the grid.
    ///
    /// Extrema are taken over the whole tensor and widened by half a cell spacing, so that for a
    /// global grid the normalized edges are the longitude seam and the poles.
    pub fn extent(&self) -> Result<GridExtent> {
        let (_, height, width) = self.dim();
        let (min_lat, max_lat) = min_max(&self.lat);
        let (min_lon, max_lon) = min_max(&self.lon);

        let half_lat = 0.5 * (max_lat - min_lat) / (height - 1) as f64;
        let half_lon = 0.5 * (max_lon - min_lon) / (width - 1) as f64;

        GridExtent::new(
            min_lat - half_lat,
            max_lat + half_lat,
            min_lon - half_lon,
            max_lon + half_lon,
        )
    }

    /// Explicitly broadcast (batch, lat, lon) to (batch, channels, lat, lon)
    ///
    /// # Arguments
    /// * `shape` - Target feature shape; the grid batch must match it or be 1
    ///
    /// # Returns
    /// Latitude and longitude, one copy per channel
    pub fn expand_channels(
        &self,
        shape: (usize, usize, usize, usize),
    ) -> Result<(Array4<f64>, Array4<f64>)> {
        let (batch, _, height, width) = shape;
        let (grid_batch, grid_height, grid_width) = self.dim();
        if (grid_height, grid_width) != (height, width) || (grid_batch != batch && grid_batch != 1) {
            return Err(AdvectionError::shape(
                "grid vs features",
                format!("({} or 1, {}, {})", batch, height, width),
                format!("{:?}", self.dim()),
            ));
        }

        let expand = |plane: &Array3<f64>| {
            plane
                .view()
                .insert_axis(Axis(1))
                .broadcast(shape)
                .map(|view| view.to_owned())
                .ok_or_else(|| {
                    AdvectionError::shape("grid broadcast", format!("{:?}", shape), format!("{:?}", plane.dim()))
                })
        };
        Ok((expand(&self.lat)?, expand(&self.lon)?))
    }

    fn warn_if_not_global(&self) -> Result<()> {
        let extent = self.extent()?;
        if (extent.min_lat() + FRAC_PI_2).abs() > GLOBAL_TOLERANCE
            || (extent.max_lat() - FRAC_PI_2).abs() > GLOBAL_TOLERANCE
        {
            warn!(
                "Latitude edges [{:.6}, {:.6}] do not reach the poles; pole folding assumes a global grid",
                extent.min_lat(), extent.max_lat()
            );
        }
        let lon_span = extent.lon_span();
        if (lon_span - TAU).abs() > GLOBAL_TOLERANCE {
            warn!("Longitude span {:.6} is not 2π; the seam wrap will not be periodic", lon_span);
        }
        Ok(())
    }
}

fn min_max(values: &Array3<f64>) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}
