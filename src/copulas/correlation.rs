//! # Correlation
//!
//! $$
//! \tau_b=\frac{n_c-n_d}{\sqrt{(n_0-n_1)(n_0-n_2)}}
//! $$
//!
use std::cmp::Ordering;

use anyhow::bail;
use anyhow::Result;
use ndarray::Array2;

/// Kendall's tau-b matrix of the columns of `data`.
///
/// Fails when a pair has no defined tau, e.g. a constant column.
pub fn kendall_tau(data: &Array2<f64>) -> Result<Array2<f64>> {
  let cols = data.ncols();
  let mut tau_matrix = Array2::<f64>::eye(cols);
  let columns: Vec<Vec<f64>> = data.columns().into_iter().map(|c| c.to_vec()).collect();

  for (i, column) in columns.iter().enumerate() {
    if column.windows(2).all(|w| w[0] == w[1]) {
      bail!("column {i} is constant");
    }
  }

  for i in 0..cols {
    for j in (i + 1)..cols {
      let (tau, _) = kendalls::tau_b_with_comparator(&columns[i], &columns[j], |a, b| {
        a.partial_cmp(b).unwrap_or(Ordering::Greater)
      })?;
      if !tau.is_finite() {
        bail!("Kendall's tau between columns {i} and {j} is undefined");
      }
      tau_matrix[[i, j]] = tau;
      tau_matrix[[j, i]] = tau;
    }
  }

  Ok(tau_matrix)
}

/// Mean of the off-diagonal entries of a tau matrix.
pub fn mean_pairwise_tau(tau: &Array2<f64>) -> f64 {
  let d = tau.nrows();
  if d < 2 {
    return 0.0;
  }
  let mut sum = 0.0;
  for i in 0..d {
    for j in (i + 1)..d {
      sum += tau[[i, j]];
    }
  }
  sum / (d * (d - 1) / 2) as f64
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn kendall_tau_of_monotone_columns() {
    let data = array![
      [0.1, 0.9, 0.2],
      [0.2, 0.8, 0.1],
      [0.3, 0.7, 0.4],
      [0.4, 0.6, 0.3]
    ];
    let tau = kendall_tau(&data).unwrap();
    assert_abs_diff_eq!(tau[[0, 0]], 1.0);
    assert_abs_diff_eq!(tau[[0, 1]], -1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(tau[[1, 0]], -1.0, epsilon = 1e-12);
    // pairs of (col 0, col 2): 4 concordant, 2 discordant
    assert_abs_diff_eq!(tau[[0, 2]], 1.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(tau[[1, 2]], -1.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(mean_pairwise_tau(&tau), -1.0 / 3.0, epsilon = 1e-12);
  }

  #[test]
  fn constant_column_has_no_tau() {
    let data = array![[0.5, 0.1], [0.5, 0.2], [0.5, 0.3]];
    assert!(kendall_tau(&data).is_err());
  }
}
