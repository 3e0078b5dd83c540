// Summary statistics of forecast fields for the step log

use ndarray::Array4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub rms: f64,
    /// NaN or infinite entries, excluded from the other statistics
    pub non_finite: usize,
}

impl FieldStats {
    pub fn of(field: &Array4<f64>) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut non_finite = 0;

        for &value in field.iter() {
            if !value.is_finite() {
                non_finite += 1;
                continue;
            }
            min = min.min(value);
            max = max.max(value);
            sum += value;
            sum_sq += value * value;
        }

        let count = field.len() - non_finite;
        if count == 0 {
            return Self {
                min: f64::NAN,
                max: f64::NAN,
                mean: f64::NAN,
                rms: f64::NAN,
                non_finite,
            };
        }
        Self {
            min,
            max,
            mean: sum / count as f64,
            rms: (sum_sq / count as f64).sqrt(),
            non_finite,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.non_finite == 0
    }
}

/// Root-mean-square distance of each member from the ensemble mean
pub fn ensemble_spread(members: &[&Array4<f64>], mean: &Array4<f64>) -> f64 {
    if members.is_empty() || mean.is_empty() {
        return 0.0;
    }
    let total: f64 = members
        .iter()
        .map(|member| (*member - mean).mapv(|d| d * d).sum())
        .sum();
    (total / (members.len() * mean.len()) as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(vec![1.0, 2.0, 3.0, 4.0], 1.0, 4.0, 2.5)]
    #[case(vec![-2.0, -2.0, -2.0, -2.0], -2.0, -2.0, -2.0)]
    #[case(vec![0.0, f64::NAN, 6.0, f64::INFINITY], 0.0, 6.0, 3.0)]
    fn test_stats(#[case] values: Vec<f64>, #[case] min: f64, #[case] max: f64, #[case] mean: f64) {
        let field = Array4::from_shape_vec((1, 1, 2, 2), values).unwrap();

        let stats = FieldStats::of(&field);

        assert_eq!(stats.min, min);
        assert_eq!(stats.max, max);
        assert!((stats.mean - mean).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_counted() {
        let field = Array4::from_shape_vec((1, 1, 1, 3), vec![1.0, f64::NAN, f64::NEG_INFINITY]).unwrap();

        let stats = FieldStats::of(&field);

        assert_eq!(stats.non_finite, 2);
        assert!(!stats.is_finite());
    }

    #[test]
    fn test_all_nan_field() {
        let field = Array4::from_elem((1, 1, 2, 2), f64::NAN);
        let stats = FieldStats::of(&field);

        assert_eq!(stats.non_finite, 4);
        assert!(stats.mean.is_nan());
    }

    #[test]
    fn test_spread_of_symmetric_members() {
        let low = Array4::from_elem((1, 1, 2, 2), -1.0);
        let high = Array4::from_elem((1, 1, 2, 2), 1.0);
        let mean = Array4::zeros((1, 1, 2, 2));

        assert!((ensemble_spread(&[&low, &high], &mean) - 1.0).abs() < 1e-12);
        assert_eq!(ensemble_spread(&[], &mean), 0.0);
    }
}
