// Bicubic resampling of a halo-padded feature field

use super::padding::{GeoCyclicPadding, HaloPadding};
use super::sampler::BicubicSampler;
use crate::constants::CUBIC_HALO;
use crate::error::{AdvectionError, Result};
use crate::geometry::SamplingGrid;
use ndarray::{Array4, Zip, s};

/// Pads the source once, then samples every (batch, channel) plane at its own coordinates
pub struct PaddedResampler<P: HaloPadding = GeoCyclicPadding> {
    padding: P,
    halo: usize,
    sampler: BicubicSampler,
}

impl Default for PaddedResampler<GeoCyclicPadding> {
    fn default() -> Self {
        Self::new(GeoCyclicPadding, CUBIC_HALO, BicubicSampler::default())
    }
}

impl<P: HaloPadding> PaddedResampler<P> {
    pub fn new(padding: P, halo: usize, sampler: BicubicSampler) -> Self {
        Self {
            padding,
            halo,
            sampler,
        }
    }

    pub fn halo(&self) -> usize {
        self.halo
    }

    /// Rescale factors taking normalized coordinates over the unpadded field to the padded one.
    ///
    /// A normalized coordinate spans the unpadded field edge to edge (`n` pixels) while the
    /// sampler spans the padded field centre to centre (`n + 2·halo - 1` pixels).
    pub fn coordinate_scale(&self, height: usize, width: usize) -> (f64, f64) {
        let span = |n: usize| n as f64 / (n + 2 * self.halo - 1) as f64;
        (span(width), span(height))
    }

    /// Resample `features` at the given per-element coordinates
    ///
    /// # Arguments
    /// * `features` - Source field (batch, channel, lat, lon)
    /// * `coords` - Normalized coordinates with the same shape as `features`
    ///
    /// # Returns
    /// New field of the same shape
    pub fn resample(&self, features: &Array4<f64>, coords: &SamplingGrid) -> Result<Array4<f64>> {
        let shape = features.dim();
        if coords.x.dim() != shape || coords.y.dim() != shape {
            return Err(AdvectionError::shape(
                "sampling grid",
                format!("{:?}", shape),
                format!("{:?} / {:?}", coords.x.dim(), coords.y.dim()),
            ));
        }

        let padded = self.padding.pad(features, self.halo)?;
        let (scale_x, scale_y) = self.coordinate_scale(shape.2, shape.3);

        let mut out = Array4::zeros(features.raw_dim());
        Zip::indexed(&mut out)
            .and(&coords.x)
            .and(&coords.y)
            .par_for_each(|(b, c, _, _), value, &x, &y| {
                let plane = padded.slice(s![b, c, .., ..]);
                *value = self.sampler.sample_point(&plane, x * scale_x, y * scale_y);
            });
        Ok(out)
    }
}
