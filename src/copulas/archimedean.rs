//! # Archimedean
//!
//! $$
//! C_\theta(u)=\psi_\theta\left(\sum_{i=1}^d \varphi_\theta(u_i)\right),\quad \psi_\theta=\varphi_\theta^{-1}
//! $$
//!
use anyhow::bail;
use anyhow::Result;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use tracing::debug;

use super::correlation::kendall_tau;
use super::correlation::mean_pairwise_tau;
use super::maximize_log_lik;
use super::CopulaOptions;

/// One-parameter Archimedean generator family.
///
/// The parameter lives on `(lower_bound, inf)` and is optimized as
/// `theta = lower_bound + exp(x)`.
pub trait Generator {
  fn name(&self) -> &'static str;

  fn lower_bound(&self) -> f64;

  /// Moment estimate of theta from Kendall's tau, used as the start point.
  fn theta_from_tau(&self, tau: f64) -> Result<f64>;

  /// `phi(u)`
  fn generator(&self, u: f64, theta: f64) -> f64;

  /// `psi(t)`
  fn inverse_generator(&self, t: f64, theta: f64) -> f64;

  /// Log density of one observation.
  fn log_density(&self, row: ArrayView1<f64>, theta: f64) -> f64;
}

pub(crate) fn log_pdf<G: Generator>(g: &G, u: &Array2<f64>, theta: f64) -> Array1<f64> {
  u.map_axis(Axis(1), |row| g.log_density(row, theta))
}

pub(crate) fn cdf<G: Generator>(g: &G, u: &Array2<f64>, theta: f64) -> Array1<f64> {
  u.map_axis(Axis(1), |row| {
    let t: f64 = row.iter().map(|&v| g.generator(v, theta)).sum();
    g.inverse_generator(t, theta)
  })
}

/// Maximum likelihood estimate of theta.
pub(crate) fn fit_theta<G: Generator>(g: &G, u: &Array2<f64>, options: &CopulaOptions) -> Result<f64> {
  let tau = mean_pairwise_tau(&kendall_tau(u)?);
  let lower = g.lower_bound();
  let theta0 = g.theta_from_tau(tau)?.max(lower + 1e-2);
  debug!(copula = g.name(), tau, theta0, "start point from Kendall's tau");

  let to_theta = |x: f64| lower + x.exp();
  let (best, ll) = maximize_log_lik(
    |x: &[f64]| log_pdf(g, u, to_theta(x[0])).sum(),
    vec![(theta0 - lower).ln()],
    0.5,
    options,
  )?;

  let theta = to_theta(best[0]);
  if !theta.is_finite() {
    bail!("{} parameter diverged", g.name());
  }
  debug!(copula = g.name(), theta, log_lik = ll, "archimedean copula fit");
  Ok(theta)
}

/// Stirling numbers of the second kind `S(n, k)` for `k = 0..=n`.
pub(crate) fn stirling2_row(n: usize) -> Vec<f64> {
  let mut row = vec![1.0];
  for m in 1..=n {
    let mut next = vec![0.0; m + 1];
    for k in 1..=m {
      let carry = if k < m { k as f64 * row[k] } else { 0.0 };
      next[k] = carry + row[k - 1];
    }
    row = next;
  }
  row
}

/// Polylogarithm of negative integer order, `Li_{-n}(z)` for `z < 1`.
pub(crate) fn polylog_neg(n: usize, z: f64) -> f64 {
  let w = z / (1.0 - z);
  let s = stirling2_row(n + 1);
  let mut factorial = 1.0;
  let mut total = 0.0;
  for k in 0..=n {
    if k > 0 {
      factorial *= k as f64;
    }
    total += factorial * s[k + 1] * w.powi(k as i32 + 1);
  }
  total
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn stirling_numbers() {
    assert_eq!(stirling2_row(0), vec![1.0]);
    assert_eq!(stirling2_row(3), vec![0.0, 1.0, 3.0, 1.0]);
    assert_eq!(stirling2_row(4), vec![0.0, 1.0, 7.0, 6.0, 1.0]);
  }

  #[test]
  fn polylog_closed_forms() {
    let z: f64 = 0.3;
    assert_abs_diff_eq!(polylog_neg(0, z), z / (1.0 - z), epsilon = 1e-14);
    assert_abs_diff_eq!(polylog_neg(1, z), z / (1.0 - z).powi(2), epsilon = 1e-14);
    assert_abs_diff_eq!(polylog_neg(2, z), z * (1.0 + z) / (1.0 - z).powi(3), epsilon = 1e-14);
  }

  /// Mixed partial derivative of the CDF by central differences.
  pub(crate) fn numeric_density<G: Generator>(g: &G, point: [f64; 3], theta: f64) -> f64 {
    let h = 1e-3;
    let mut total = 0.0;
    for mask in 0..8u32 {
      let mut p = point;
      let mut sign = 1.0;
      for (i, v) in p.iter_mut().enumerate() {
        if mask & (1 << i) != 0 {
          *v += h;
        } else {
          *v -= h;
          sign = -sign;
        }
      }
      let c = cdf(g, &array![[p[0], p[1], p[2]]], theta)[0];
      total += sign * c;
    }
    total / (8.0 * h * h * h)
  }
}

#[cfg(test)]
pub(crate) use tests::numeric_density;
