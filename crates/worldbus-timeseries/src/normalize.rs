//! One-shot per-row normalization applied when a dataset is loaded.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::TimeSeriesError;

/// Number of standard deviations kept by clip-and-scale.
const CLIP_SIGMAS: f64 = 4.0;

/// Largest magnitude fed to `exp` by the logistic guard.
#[must_use]
pub fn sigmoid_cutoff() -> f64 {
    f64::MAX.ln() - 1.0
}

/// Per-row normalization switches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Normalization {
    /// Center each row on its mean and divide by its standard deviation.
    pub z_transform: bool,
    /// Center, clip to four standard deviations, rescale into `[0, 1]`.
    pub clip_and_scale: bool,
    /// Squash each (optionally z-transformed) row through a logistic.
    pub sigmoid: bool,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            z_transform: true,
            clip_and_scale: false,
            sigmoid: true,
        }
    }
}

impl Normalization {
    /// Leave the dataset untouched.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            z_transform: false,
            clip_and_scale: false,
            sigmoid: false,
        }
    }

    pub fn validate(&self) -> Result<(), TimeSeriesError> {
        if self.clip_and_scale && self.sigmoid {
            return Err(TimeSeriesError::Configuration(
                "clip_and_scale and sigmoid are mutually exclusive",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn is_identity(&self) -> bool {
        !(self.z_transform || self.clip_and_scale || self.sigmoid)
    }

    /// Normalize every row of `dataset` in place.
    pub fn apply(&self, dataset: &mut Dataset) -> Result<(), TimeSeriesError> {
        self.validate()?;
        if self.is_identity() {
            return Ok(());
        }
        for row in 0..dataset.rows() {
            self.apply_row(dataset.row_mut(row));
        }
        Ok(())
    }

    /// Normalize a single row in place; `NaN` marks undefined entries.
    pub fn apply_row(&self, row: &mut [f64]) {
        let Some((mean, std)) = nan_moments(row) else {
            return;
        };
        // Zero spread has nothing to scale; infinite entries poison the moments.
        let scalable = std != 0.0 && std.is_finite();

        if scalable && self.clip_and_scale {
            let bound = std * CLIP_SIGMAS;
            for value in row.iter_mut() {
                let centered = (*value - mean).clamp(-bound, bound);
                *value = (centered / bound + 1.0) * 0.5;
            }
        } else if scalable && self.z_transform {
            for value in row.iter_mut() {
                *value = (*value - mean) / std;
            }
        }

        if self.sigmoid {
            for value in row.iter_mut() {
                *value = sigmoid(*value);
            }
        }
    }
}

/// Mean and population standard deviation over the defined entries, or `None`
/// when every entry is undefined.
#[must_use]
pub fn nan_moments(row: &[f64]) -> Option<(f64, f64)> {
    let (count, sum) = row
        .iter()
        .filter(|value| !value.is_nan())
        .fold((0usize, 0.0_f64), |(count, sum), value| (count + 1, sum + value));
    if count == 0 {
        return None;
    }
    let mean = sum / count as f64;
    let variance = row
        .iter()
        .filter(|value| !value.is_nan())
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / count as f64;
    Some((mean, variance.sqrt()))
}

/// Clamp `x` into `[-cutoff, cutoff]`, keeping its sign; `NaN` passes through.
#[must_use]
pub fn sigmoid_guard(x: f64) -> f64 {
    let cutoff = sigmoid_cutoff();
    if x.is_nan() { x } else { x.clamp(-cutoff, cutoff) }
}

/// Logistic function that never overflows `exp`.
#[must_use]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-sigmoid_guard(x)).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn z_only() -> Normalization {
        Normalization {
            z_transform: true,
            clip_and_scale: false,
            sigmoid: false,
        }
    }

    #[test]
    fn z_transform_centers_and_scales() {
        let mut row = [1.0, 2.0, 3.0];
        Normalization {
            z_transform: true,
            clip_and_scale: false,
            sigmoid: false,
        }
        .apply_row(&mut row);
        let std = (2.0f64 / 3.0).sqrt();
        assert_abs_diff_eq!(row[0], -1.0 / std, epsilon = 1e-12);
        assert_abs_diff_eq!(row[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(row[2], 1.0 / std, epsilon = 1e-12);
    }

    #[test]
    fn undefined_entries_are_ignored_and_kept() {
        let mut row = [1.0, f64::NAN, 3.0];
        Normalization {
            z_transform: true,
            clip_and_scale: false,
            sigmoid: false,
        }
        .apply_row(&mut row);
        assert_abs_diff_eq!(row[0], -1.0, epsilon = 1e-12);
        assert!(row[1].is_nan());
        assert_abs_diff_eq!(row[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn flat_rows_are_only_squashed() {
        let mut empty = [f64::NAN; 4];
        Normalization::default().apply_row(&mut empty);
        assert!(empty.iter().all(|v| v.is_nan()));

        let mut flat = [5.0; 4];
        Normalization::default().apply_row(&mut flat);
        assert_eq!(flat, [sigmoid(5.0); 4]);

        let mut unscaled = [5.0; 3];
        z_only().apply_row(&mut unscaled);
        assert_eq!(unscaled, [5.0; 3]);
    }

    #[test]
    fn sigmoid_bounds_rows_without_spread() {
        let sigmoid_only = Normalization {
            z_transform: false,
            clip_and_scale: false,
            sigmoid: true,
        };
        let rows = [
            vec![5.0; 3],
            vec![1.0, f64::INFINITY, 3.0],
            vec![f64::NEG_INFINITY, 0.0],
        ];
        for mut row in rows {
            sigmoid_only.apply_row(&mut row);
            assert!(row.iter().all(|v| (0.0..=1.0).contains(v)), "{row:?}");
        }

        let mut spiky = [1.0, f64::INFINITY, 3.0];
        Normalization::default().apply_row(&mut spiky);
        assert!(spiky.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_abs_diff_eq!(spiky[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn clip_and_scale_lands_in_unit_interval() {
        let mut row: Vec<f64> = (0..40).map(f64::from).collect();
        row.push(10_000.0);
        Normalization {
            z_transform: false,
            clip_and_scale: true,
            sigmoid: false,
        }
        .apply_row(&mut row);
        assert!(row.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_abs_diff_eq!(row[40], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn guard_keeps_extremes_finite() {
        assert_abs_diff_eq!(sigmoid(f64::INFINITY), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sigmoid(f64::NEG_INFINITY), 0.0, epsilon = 1e-12);
        assert!(sigmoid(-1e308).is_finite());
        assert!(sigmoid(f64::NAN).is_nan());
        assert_eq!(sigmoid_guard(-1e308), -sigmoid_cutoff());
        assert_eq!(sigmoid_guard(1e308), sigmoid_cutoff());
    }

    #[test]
    fn guard_is_identity_on_bounded_rows() {
        let row = [1e-9, 0.25, 0.5, 0.75, 1.0 - 1e-9];
        for value in row {
            let once = sigmoid_guard(value);
            assert_abs_diff_eq!(once, value, epsilon = f64::EPSILON);
            assert_abs_diff_eq!(sigmoid_guard(once), once, epsilon = f64::EPSILON);
        }
    }

    #[test]
    fn clip_and_sigmoid_conflict() {
        let both = Normalization {
            z_transform: false,
            clip_and_scale: true,
            sigmoid: true,
        };
        assert!(matches!(
            both.validate(),
            Err(TimeSeriesError::Configuration(_))
        ));
    }
}
