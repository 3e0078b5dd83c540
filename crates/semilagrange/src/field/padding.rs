// Halo padding consistent with the sphere's topology

use crate::error::{AdvectionError, Result};
use ndarray::Array4;

/// Pads the two spatial axes of a (batch, channel, lat, lon) tensor by `halo` cells on each side
pub trait HaloPadding: Send + Sync {
    fn pad(&self, field: &Array4<f64>, halo: usize) -> Result<Array4<f64>>;
}

/// Periodic in longitude; across a pole the halo continues on the far meridian.
///
/// A halo row `k` cells beyond a pole copies row `k - 1` counted inward from that pole,
/// rolled by half the longitudes. This requires an even longitude count.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoCyclicPadding;

impl GeoCyclicPadding {
    /// Source (row, column) in the unpadded field for padded cell (row, col)
    fn source_index(row: isize, col: isize, height: isize, width: isize) -> (usize, usize) {
        let (src_row, roll) = if row < 0 {
            (-1 - row, width / 2)
        } else if row >= height {
            (2 * height - 1 - row, width / 2)
        } else {
            (row, 0)
        };
        let src_col = (col + roll).rem_euclid(width);
        (src_row as usize, src_col as usize)
    }
}

impl HaloPadding for GeoCyclicPadding {
    fn pad(&self, field: &Array4<f64>, halo: usize) -> Result<Array4<f64>> {
        let (batch, channels, height, width) = field.dim();
        if halo > height || halo > width {
            return Err(AdvectionError::shape(
                "padding halo",
                format!("<= {}", height.min(width)),
                halo,
            ));
        }
        if width % 2 != 0 {
            return Err(AdvectionError::DegenerateGrid(format!(
                "pole folding needs an even longitude count, got {}",
                width
            )));
        }

        let h = halo as isize;
        let padded = Array4::from_shape_fn(
            (batch, channels, height + 2 * halo, width + 2 * halo),
            |(b, c, row, col)| {
                let (src_row, src_col) = Self::source_index(
                    row as isize - h,
                    col as isize - h,
                    height as isize,
                    width as isize,
                );
                field[[b, c, src_row, src_col]]
            },
        );
        Ok(padded)
    }
}
