//! # Ecdf
//!
//! $$
//! \hat F_n(v)=\frac{1}{n}\sum_{i=1}^n \mathbf 1\{x_i\le v\}
//! $$
//!
use ndarray::stack;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Array3;
use ndarray::ArrayView1;
use ndarray::Axis;
use ordered_float::OrderedFloat;
use tracing::debug;

use crate::error::DroughtError;
use crate::field::ClimateField;
use crate::field::Variable;

/// Empirical distribution function of a finite sample.
///
/// Ties share one value and the largest sample maps to exactly `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ecdf {
  sorted: Vec<f64>,
}

impl Ecdf {
  /// Builds the step function from the non-missing entries of `sample`.
  pub fn new(sample: &[f64]) -> Self {
    let mut sorted: Vec<f64> = sample.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by_key(|v| OrderedFloat(*v));
    Self { sorted }
  }

  pub fn len(&self) -> usize {
    self.sorted.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sorted.is_empty()
  }

  /// `#{x <= v} / n`; `NaN` for a missing argument or an empty sample.
  pub fn eval(&self, v: f64) -> f64 {
    if v.is_nan() || self.sorted.is_empty() {
      return f64::NAN;
    }
    let count = self.sorted.partition_point(|x| *x <= v);
    count as f64 / self.sorted.len() as f64
  }

  pub fn eval_many(&self, values: ArrayView1<f64>) -> Array1<f64> {
    values.mapv(|v| self.eval(v))
  }
}

/// ECDF-transformed anomalies of the three variables on a common support.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformMarginals {
  pub tws: ClimateField,
  pub precip: ClimateField,
  pub et: ClimateField,
  /// `true` where all three anomalies were present.
  pub mask: Array3<bool>,
  /// Number of `true` entries in `mask`.
  pub n_valid: usize,
}

impl UniformMarginals {
  pub fn field(&self, variable: Variable) -> &ClimateField {
    match variable {
      Variable::Tws => &self.tws,
      Variable::Precip => &self.precip,
      Variable::Et => &self.et,
    }
  }

  /// Paired observations `(n_valid, 3)` in `(time, y, x)` order, columns tws, precip, et.
  pub fn paired(&self) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((self.n_valid, Variable::ALL.len()));
    for (j, variable) in Variable::ALL.iter().enumerate() {
      let values = self.field(*variable).values();
      let column = values
        .iter()
        .zip(self.mask.iter())
        .filter(|(_, &keep)| keep)
        .map(|(&v, _)| v);
      for (i, v) in column.enumerate() {
        out[[i, j]] = v;
      }
    }
    out
  }
}

/// ECDF of each anomaly field restricted to the points where all three are valid.
///
/// The fields are flattened over `(time, y, x)` and stacked along a variable
/// axis. A point missing in any variable is dropped from every variable, so
/// the three ECDFs are built on the same paired support. Dropped points are
/// `NaN` in the output, which keeps the input layout.
pub fn compute_ecdf_consistent(
  tws: &ClimateField,
  precip: &ClimateField,
  et: &ClimateField,
) -> Result<UniformMarginals, DroughtError> {
  tws.ensure_aligned(precip)?;
  tws.ensure_aligned(et)?;

  let (nt, ny, nx) = tws.shape();
  let flat = |f: &ClimateField| Array1::from_iter(f.values().iter().copied());
  let stacked = stack![Axis(0), flat(tws), flat(precip), flat(et)];

  let common_mask = stacked.map_axis(Axis(0), |col| col.iter().all(|v| !v.is_nan()));
  let n_valid = common_mask.iter().filter(|&&keep| keep).count();
  debug!(
    points = common_mask.len(),
    valid = n_valid,
    dropped = common_mask.len() - n_valid,
    "common validity mask"
  );

  let mut cdfs = Vec::with_capacity(Variable::ALL.len());
  for row in stacked.axis_iter(Axis(0)) {
    let valid: Vec<f64> = row
      .iter()
      .zip(common_mask.iter())
      .filter(|(_, &keep)| keep)
      .map(|(&v, _)| v)
      .collect();
    let ecdf = Ecdf::new(&valid);

    let cdf: Vec<f64> = row
      .iter()
      .zip(common_mask.iter())
      .map(|(&v, &keep)| if keep { ecdf.eval(v) } else { f64::NAN })
      .collect();
    cdfs.push(unstack(cdf, (nt, ny, nx))?);
  }

  let mask = unstack(common_mask.to_vec(), (nt, ny, nx))?;
  let [tws_cdf, precip_cdf, et_cdf]: [Array3<f64>; 3] =
    cdfs.try_into().map_err(|got: Vec<Array3<f64>>| DroughtError::ShapeMismatch {
      what: "stacked variables".to_string(),
      expected: vec![Variable::ALL.len()],
      got: vec![got.len()],
    })?;

  Ok(UniformMarginals {
    tws: tws.with_values(tws_cdf),
    precip: precip.with_values(precip_cdf),
    et: et.with_values(et_cdf),
    mask,
    n_valid,
  })
}

fn unstack<T>(flat: Vec<T>, shape: (usize, usize, usize)) -> Result<Array3<T>, DroughtError> {
  let len = flat.len();
  Array3::from_shape_vec(shape, flat).map_err(|_| DroughtError::ShapeMismatch {
    what: "unstacked points".to_string(),
    expected: vec![shape.0, shape.1, shape.2],
    got: vec![len],
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use ndarray::Array3;

  use super::*;
  use crate::field::monthly_axis;

  fn field(variable: Variable, values: Array3<f64>) -> ClimateField {
    let n = values.len_of(Axis(0));
    ClimateField::new(variable, monthly_axis(2010, 1, n), values).unwrap()
  }

  #[test]
  fn ecdf_uses_inclusive_count_over_n() {
    let ecdf = Ecdf::new(&[3.0, 1.0, 5.0, 2.0, 4.0]);
    assert_abs_diff_eq!(ecdf.eval(3.0), 0.6, epsilon = 1e-15);
    assert_abs_diff_eq!(ecdf.eval(1.0), 0.2, epsilon = 1e-15);
    assert_eq!(ecdf.eval(5.0), 1.0);
    assert_eq!(ecdf.eval(0.5), 0.0);
    assert_eq!(ecdf.eval(7.0), 1.0);
  }

  #[test]
  fn ecdf_ties_share_a_value() {
    let ecdf = Ecdf::new(&[2.0, 1.0, 2.0, 3.0]);
    let out = ecdf.eval_many(array![1.0, 2.0, 2.0, 3.0].view());
    assert_eq!(out.to_vec(), vec![0.25, 0.75, 0.75, 1.0]);
  }

  #[test]
  fn ecdf_ignores_missing_samples_and_arguments() {
    let ecdf = Ecdf::new(&[f64::NAN, 1.0, 2.0]);
    assert_eq!(ecdf.len(), 2);
    assert_eq!(ecdf.eval(1.0), 0.5);
    assert!(ecdf.eval(f64::NAN).is_nan());
    assert!(Ecdf::new(&[]).eval(0.0).is_nan());
  }

  #[test]
  fn point_missing_in_one_variable_is_dropped_from_all() {
    let tws = field(Variable::Tws, Array3::from_shape_vec((3, 1, 1), vec![1.0, f64::NAN, 3.0]).unwrap());
    // Without the mask, the middle precip/et values would shift the ranks.
    let precip = field(Variable::Precip, Array3::from_shape_vec((3, 1, 1), vec![10.0, 0.0, 20.0]).unwrap());
    let et = field(Variable::Et, Array3::from_shape_vec((3, 1, 1), vec![7.0, 9.0, 5.0]).unwrap());

    let u = compute_ecdf_consistent(&tws, &precip, &et).unwrap();
    assert_eq!(u.n_valid, 2);
    assert_eq!(u.mask.iter().copied().collect::<Vec<_>>(), vec![true, false, true]);

    for v in Variable::ALL {
      assert!(u.field(v).values()[[1, 0, 0]].is_nan(), "{v} kept the masked point");
    }
    assert_eq!(u.tws.values()[[0, 0, 0]], 0.5);
    assert_eq!(u.tws.values()[[2, 0, 0]], 1.0);
    assert_eq!(u.precip.values()[[0, 0, 0]], 0.5);
    assert_eq!(u.precip.values()[[2, 0, 0]], 1.0);
    assert_eq!(u.et.values()[[0, 0, 0]], 1.0);
    assert_eq!(u.et.values()[[2, 0, 0]], 0.5);

    let paired = u.paired();
    assert_eq!(paired, array![[0.5, 0.5, 1.0], [1.0, 1.0, 0.5]]);
  }

  #[test]
  fn marginals_are_in_unit_interval_and_monotone() {
    let tws = field(
      Variable::Tws,
      Array3::from_shape_fn((24, 2, 2), |(t, y, x)| ((t * 7 + y * 3 + x) % 11) as f64 - 5.0),
    );
    let precip = field(
      Variable::Precip,
      Array3::from_shape_fn((24, 2, 2), |(t, y, x)| (t as f64 * 0.3 + y as f64 - x as f64).cos()),
    );
    let et = field(
      Variable::Et,
      Array3::from_shape_fn((24, 2, 2), |(t, _, x)| if t == 4 && x == 1 { f64::NAN } else { t as f64 }),
    );

    let u = compute_ecdf_consistent(&tws, &precip, &et).unwrap();
    assert_eq!(u.n_valid, 24 * 4 - 2);
    assert_eq!(u.tws.shape(), tws.shape());

    let mut pairs: Vec<(f64, f64)> = tws
      .values()
      .iter()
      .zip(u.tws.values().iter())
      .zip(u.mask.iter())
      .filter(|(_, &keep)| keep)
      .map(|((&a, &c), _)| (a, c))
      .collect();
    assert!(pairs.iter().all(|(_, c)| (0.0..=1.0).contains(c)));
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
    assert!(pairs.windows(2).all(|w| w[0].1 <= w[1].1));
    assert_eq!(pairs.last().unwrap().1, 1.0);
  }

  #[test]
  fn misaligned_fields_are_rejected() {
    let tws = field(Variable::Tws, Array3::zeros((4, 1, 1)));
    let precip = field(Variable::Precip, Array3::zeros((4, 1, 2)));
    let et = field(Variable::Et, Array3::zeros((4, 1, 1)));
    assert!(matches!(
      compute_ecdf_consistent(&tws, &precip, &et),
      Err(DroughtError::ShapeMismatch { .. })
    ));
  }
}
