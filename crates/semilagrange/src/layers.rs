// Fixed-weight layers shared by the predictors and the forecaster

use crate::constants::CONV_HALO;
use crate::error::{AdvectionError, Result};
use crate::field::{GeoCyclicPadding, HaloPadding};
use ndarray::{Array1, Array2, Array4, Axis, Zip, s};
use rand::Rng;
use rand::distr::Uniform;

/// Per-cell linear map across channels (a 1x1 convolution)
#[derive(Debug, Clone, PartialEq)]
pub struct PointwiseLinear {
    /// (out_channels, in_channels)
    weight: Array2<f64>,
    bias: Array1<f64>,
}

impl PointwiseLinear {
    pub fn new(weight: Array2<f64>, bias: Array1<f64>) -> Result<Self> {
        if weight.nrows() != bias.len() {
            return Err(AdvectionError::shape("pointwise bias", weight.nrows(), bias.len()));
        }
        Ok(Self { weight, bias })
    }

    /// Uniform weights in ±scale/√in_channels, zero bias
    pub fn random<R: Rng>(rng: &mut R, in_channels: usize, out_channels: usize, scale: f64) -> Self {
        let bound = scale / (in_channels.max(1) as f64).sqrt();
        let weight = uniform_array(rng, (out_channels, in_channels), bound);
        Self {
            weight,
            bias: Array1::zeros(out_channels),
        }
    }

    pub fn zeros(in_channels: usize, out_channels: usize) -> Self {
        Self {
            weight: Array2::zeros((out_channels, in_channels)),
            bias: Array1::zeros(out_channels),
        }
    }

    pub fn in_channels(&self) -> usize {
        self.weight.ncols()
    }

    pub fn out_channels(&self) -> usize {
        self.weight.nrows()
    }

    pub fn weight(&self) -> &Array2<f64> {
        &self.weight
    }

    pub fn bias(&self) -> &Array1<f64> {
        &self.bias
    }

    pub fn apply(&self, input: &Array4<f64>) -> Result<Array4<f64>> {
        let (batch, channels, height, width) = input.dim();
        if channels != self.in_channels() {
            return Err(AdvectionError::shape("pointwise input channels", self.in_channels(), channels));
        }

        let mut out = Array4::zeros((batch, self.out_channels(), height, width));
        for (sample, mut target) in input.outer_iter().zip(out.outer_iter_mut()) {
            let flat = sample.to_shape((channels, height * width))?;
            let mixed = self.weight.dot(&flat) + &self.bias.view().insert_axis(Axis(1));
            target.assign(&mixed.into_shape_with_order((self.out_channels(), height, width))?);
        }
        Ok(out)
    }
}

/// 3x3 convolution over a geo-cyclically padded field
#[derive(Debug, Clone, PartialEq)]
pub struct HaloConv3x3 {
    /// (out_channels, in_channels, 3, 3)
    weight: Array4<f64>,
    bias: Array1<f64>,
}

impl HaloConv3x3 {
    pub fn new(weight: Array4<f64>, bias: Array1<f64>) -> Result<Self> {
        let (out_channels, _, kh, kw) = weight.dim();
        if (kh, kw) != (3, 3) {
            return Err(AdvectionError::shape("conv kernel", "3x3", format!("{}x{}", kh, kw)));
        }
        if out_channels != bias.len() {
            return Err(AdvectionError::shape("conv bias", out_channels, bias.len()));
        }
        Ok(Self { weight, bias })
    }

    pub fn random<R: Rng>(rng: &mut R, in_channels: usize, out_channels: usize, scale: f64) -> Self {
        let bound = scale / ((in_channels.max(1) * 9) as f64).sqrt();
        Self {
            weight: uniform_array(rng, (out_channels, in_channels, 3, 3), bound),
            bias: Array1::zeros(out_channels),
        }
    }

    pub fn in_channels(&self) -> usize {
        self.weight.dim().1
    }

    pub fn out_channels(&self) -> usize {
        self.weight.dim().0
    }

    pub fn weight(&self) -> &Array4<f64> {
        &self.weight
    }

    pub fn bias(&self) -> &Array1<f64> {
        &self.bias
    }

    pub fn apply(&self, input: &Array4<f64>) -> Result<Array4<f64>> {
        let (batch, channels, height, width) = input.dim();
        if channels != self.in_channels() {
            return Err(AdvectionError::shape("conv input channels", self.in_channels(), channels));
        }

        let padded = GeoCyclicPadding.pad(input, CONV_HALO)?;
        let mut out = Array4::zeros((batch, self.out_channels(), height, width));
        Zip::indexed(&mut out).par_for_each(|(b, o, i, j), value| {
            let window = padded.slice(s![b, .., i..i + 3, j..j + 3]);
            let kernel = self.weight.index_axis(Axis(0), o);
            *value = self.bias[o] + Zip::from(&kernel).and(&window).fold(0.0, |acc, &w, &x| acc + w * x);
        });
        Ok(out)
    }
}

fn uniform_array<R: Rng, Sh: ndarray::ShapeBuilder<Dim = D>, D: ndarray::Dimension>(
    rng: &mut R,
    shape: Sh,
    bound: f64,
) -> ndarray::Array<f64, D> {
    match Uniform::new_inclusive(-bound, bound) {
        Ok(dist) => ndarray::Array::from_shape_simple_fn(shape, || rng.sample(&dist)),
        // Negative or non-finite bound: start from silence
        Err(_) => ndarray::Array::zeros(shape),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_pointwise_mixes_channels() {
        let layer = PointwiseLinear::new(array![[1.0, 2.0], [0.0, -1.0], [0.5, 0.5]], array![0.0, 1.0, 0.0]).unwrap();
        let input = Array4::from_shape_fn((2, 2, 3, 4), |(b, c, i, j)| (b + c + i + j) as f64);

        let out = layer.apply(&input).unwrap();

        assert_eq!(out.dim(), (2, 3, 3, 4));
        let (x0, x1) = (input[[1, 0, 2, 3]], input[[1, 1, 2, 3]]);
        assert!((out[[1, 0, 2, 3]] - (x0 + 2.0 * x1)).abs() < 1e-12);
        assert!((out[[1, 1, 2, 3]] - (1.0 - x1)).abs() < 1e-12);
        assert!((out[[1, 2, 2, 3]] - 0.5 * (x0 + x1)).abs() < 1e-12);
    }

    #[test]
    fn test_pointwise_rejects_wrong_channels() {
        let layer = PointwiseLinear::zeros(3, 2);
        let input = Array4::zeros((1, 2, 3, 4));
        assert!(matches!(layer.apply(&input), Err(AdvectionError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_random_weights_are_bounded_and_seeded() {
        let a = PointwiseLinear::random(&mut StdRng::seed_from_u64(7), 4, 6, 0.5);
        let b = PointwiseLinear::random(&mut StdRng::seed_from_u64(7), 4, 6, 0.5);

        assert_eq!(a, b);
        assert!(a.weight().iter().all(|w| w.abs() <= 0.25));
    }

    #[test]
    fn test_conv_centre_tap_is_identity() {
        let mut weight = Array4::zeros((1, 1, 3, 3));
        weight[[0, 0, 1, 1]] = 1.0;
        let conv = HaloConv3x3::new(weight, array![0.5]).unwrap();
        let input = Array4::from_shape_fn((1, 1, 4, 8), |(_, _, i, j)| (i * 8 + j) as f64);

        let out = conv.apply(&input).unwrap();
        for (o, x) in out.iter().zip(input.iter()) {
            assert!((o - (x + 0.5)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_conv_west_tap_wraps_longitude() {
        let mut weight = Array4::zeros((1, 1, 3, 3));
        weight[[0, 0, 1, 0]] = 1.0;
        let conv = HaloConv3x3::new(weight, array![0.0]).unwrap();
        let input = Array4::from_shape_fn((1, 1, 4, 8), |(_, _, i, j)| (i * 8 + j) as f64);

        let out = conv.apply(&input).unwrap();
        assert_eq!(out[[0, 0, 2, 0]], input[[0, 0, 2, 7]]);
        assert_eq!(out[[0, 0, 2, 5]], input[[0, 0, 2, 4]]);
    }

    #[test]
    fn test_conv_rejects_non_square_kernel() {
        let result = HaloConv3x3::new(Array4::zeros((1, 1, 3, 5)), array![0.0]);
        assert!(result.is_err());
    }
}
