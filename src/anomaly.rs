//! # Anomaly
//!
//! $$
//! z(t,y,x)=\frac{X(t,y,x)-\mu_{m(t)}(y,x)}{\sigma_{m(t)}(y,x)}
//! $$
//!
use std::collections::BTreeSet;

use ndarray::Array3;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray::Zip;
use tracing::debug;
use tracing::warn;

use crate::field::ClimateField;

/// Per calendar month mean and standard deviation of a field, shape `(12, y, x)`.
///
/// Index 0 is January. The standard deviation uses divisor `n` and missing
/// samples are skipped; a month without samples is `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyClimatology {
  mean: Array3<f64>,
  std: Array3<f64>,
}

impl MonthlyClimatology {
  pub fn compute(field: &ClimateField) -> Self {
    let (_, ny, nx) = field.shape();
    let months = field.months();

    let mut mean = Array3::from_elem((12, ny, nx), f64::NAN);
    let mut std = Array3::from_elem((12, ny, nx), f64::NAN);

    let covered: BTreeSet<u32> = months.iter().copied().collect();
    if covered.len() < 12 {
      warn!(
        variable = %field.variable(),
        months = covered.len(),
        "climatology covers fewer than 12 calendar months"
      );
    }

    for month in covered {
      let steps: Vec<usize> = months
        .iter()
        .enumerate()
        .filter(|(_, m)| **m == month)
        .map(|(i, _)| i)
        .collect();
      let slab = field.values().select(Axis(0), &steps);
      let k = (month - 1) as usize;

      Zip::from(mean.index_axis_mut(Axis(0), k))
        .and(std.index_axis_mut(Axis(0), k))
        .and(slab.lanes(Axis(0)))
        .for_each(|mu, sd, lane| {
          let (m, s) = nan_mean_std(lane);
          *mu = m;
          *sd = s;
        });

      debug!(variable = %field.variable(), month, years = steps.len(), "monthly climatology");
    }

    Self { mean, std }
  }

  /// Climatological mean for a 1-indexed calendar month.
  pub fn mean(&self, month: u32) -> ArrayView2<'_, f64> {
    self.mean.index_axis(Axis(0), month_index(month))
  }

  /// Climatological standard deviation for a 1-indexed calendar month.
  pub fn std(&self, month: u32) -> ArrayView2<'_, f64> {
    self.std.index_axis(Axis(0), month_index(month))
  }

  /// Z-scores of `field` against this climatology.
  ///
  /// Points whose monthly standard deviation is zero or undefined become `NaN`.
  pub fn standardize(&self, field: &ClimateField) -> ClimateField {
    let mut out = field.values().clone();

    for (t, month) in field.months().into_iter().enumerate() {
      let k = month_index(month);
      Zip::from(out.index_axis_mut(Axis(0), t))
        .and(self.mean.index_axis(Axis(0), k))
        .and(self.std.index_axis(Axis(0), k))
        .for_each(|v, &mu, &sd| {
          *v = if sd > 0.0 && sd.is_finite() {
            (*v - mu) / sd
          } else {
            f64::NAN
          };
        });
    }

    field.with_values(out)
  }
}

fn month_index(month: u32) -> usize {
  assert!(
    (1..=12).contains(&month),
    "month must be in 1..=12, got {month}"
  );
  (month - 1) as usize
}

fn nan_mean_std(lane: ArrayView1<f64>) -> (f64, f64) {
  let valid: Vec<f64> = lane.iter().copied().filter(|v| !v.is_nan()).collect();
  if valid.is_empty() {
    return (f64::NAN, f64::NAN);
  }

  let n = valid.len() as f64;
  let mean = valid.iter().sum::<f64>() / n;
  // rounding in the mean leaves a tiny spread on constant samples
  if valid.iter().all(|&v| v == valid[0]) {
    return (mean, 0.0);
  }
  let var = valid.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
  (mean, var.sqrt())
}

/// Removes the monthly climatology from `field` and scales by the monthly spread.
///
/// The output has the same variable, time axis and shape as the input.
pub fn calc_standardized_anomalies(field: &ClimateField) -> ClimateField {
  MonthlyClimatology::compute(field).standardize(field)
}
