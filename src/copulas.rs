//! # Copulas
//!
//! $$
//! F_{X_1,\dots,X_d}(x)=C\left(F_1(x_1),\dots,F_d(x_d)\right)
//! $$
//!
use std::fmt;
use std::fmt::Debug;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use ndarray_stats::QuantileExt;
use ordered_float::OrderedFloat;
use tracing::debug;

pub mod archimedean;
pub mod clayton;
pub mod correlation;
pub mod frank;
pub mod gaussian;
pub mod gumbel;

pub use clayton::ClaytonCopula;
pub use frank::FrankCopula;
pub use gaussian::GaussianCopula;
pub use gumbel::GumbelCopula;

/// The parametric families the selector chooses from.
///
/// The declaration order is the enumeration order of the selector and its
/// tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CopulaFamily {
  Gaussian,
  Clayton,
  Frank,
  Gumbel,
}

impl CopulaFamily {
  pub const ALL: [CopulaFamily; 4] = [
    CopulaFamily::Gaussian,
    CopulaFamily::Clayton,
    CopulaFamily::Frank,
    CopulaFamily::Gumbel,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      CopulaFamily::Gaussian => "Gaussian",
      CopulaFamily::Clayton => "Clayton",
      CopulaFamily::Frank => "Frank",
      CopulaFamily::Gumbel => "Gumbel",
    }
  }

  /// An unfitted copula of this family.
  pub fn build(&self, dim: usize, options: CopulaOptions) -> Box<dyn Copula> {
    match self {
      CopulaFamily::Gaussian => Box::new(GaussianCopula::new(dim, options)),
      CopulaFamily::Clayton => Box::new(ClaytonCopula::new(dim, options)),
      CopulaFamily::Frank => Box::new(FrankCopula::new(dim, options)),
      CopulaFamily::Gumbel => Box::new(GumbelCopula::new(dim, options)),
    }
  }
}

impl fmt::Display for CopulaFamily {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Numerical settings shared by the families.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CopulaOptions {
  /// Iteration cap of the likelihood maximization.
  pub max_iters: u64,
  /// Standard deviation tolerance of the Nelder-Mead simplex costs.
  pub tolerance: f64,
  /// Lattice points of the Gaussian CDF integration.
  pub cdf_points: usize,
}

impl Default for CopulaOptions {
  fn default() -> Self {
    Self {
      max_iters: 500,
      tolerance: 1e-8,
      cdf_points: 2000,
    }
  }
}

/// A `d`-dimensional copula fitted by maximum likelihood.
///
/// Observations are `(n, d)` matrices with rows in `[0, 1]^d`.
pub trait Copula: Debug + Send + Sync {
  fn family(&self) -> CopulaFamily;

  fn dim(&self) -> usize;

  /// Fitted dependence parameters, `None` before `fit`.
  fn params(&self) -> Option<Array1<f64>>;

  /// Number of free parameters entering AIC and BIC.
  fn n_params(&self) -> usize;

  fn fit(&mut self, u: &Array2<f64>) -> Result<()>;

  fn log_pdf(&self, u: &Array2<f64>) -> Result<Array1<f64>>;

  fn pdf(&self, u: &Array2<f64>) -> Result<Array1<f64>> {
    Ok(self.log_pdf(u)?.mapv(f64::exp))
  }

  fn cdf(&self, u: &Array2<f64>) -> Result<Array1<f64>>;

  /// Sum of the log density over the rows of `u`.
  fn log_lik(&self, u: &Array2<f64>) -> Result<f64> {
    let ll = self.log_pdf(u)?.sum();
    if !ll.is_finite() {
      bail!("{} log-likelihood is not finite ({ll})", self.family());
    }
    Ok(ll)
  }
}

/// Checks shape and range of copula observations.
pub(crate) fn check_observations(u: &Array2<f64>, dim: usize) -> Result<()> {
  if u.ncols() != dim {
    bail!("expected {dim} columns, got {}", u.ncols());
  }
  if u.is_empty() {
    return Ok(());
  }

  let lo = *u.min()?;
  let hi = *u.max()?;
  if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) {
    bail!("observations must lie in [0, 1], got range [{lo}, {hi}]");
  }

  Ok(())
}

/// Checks that `u` can carry a likelihood fit.
pub(crate) fn check_fit_data(u: &Array2<f64>, dim: usize) -> Result<()> {
  check_observations(u, dim)?;
  if u.nrows() < 2 {
    bail!("need at least 2 observations, got {}", u.nrows());
  }
  Ok(())
}

/// Column-wise ranks scaled to `rank / (n + 1)`, ties get their average rank.
pub fn pseudo_obs(u: &Array2<f64>) -> Array2<f64> {
  let n = u.nrows();
  let scale = n as f64 + 1.0;
  let mut out = Array2::<f64>::zeros(u.raw_dim());

  for (j, col) in u.axis_iter(Axis(1)).enumerate() {
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| OrderedFloat(col[i]));

    let mut start = 0;
    while start < n {
      let mut end = start + 1;
      while end < n && col[order[end]] == col[order[start]] {
        end += 1;
      }
      // 1-based ranks start+1..=end
      let rank = (start + end + 1) as f64 / 2.0;
      for &i in &order[start..end] {
        out[[i, j]] = rank / scale;
      }
      start = end;
    }
  }

  out
}

struct NegLogLik<F> {
  log_lik: F,
}

impl<F> CostFunction for NegLogLik<F>
where
  F: Fn(&[f64]) -> f64,
{
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let ll = (self.log_lik)(x);
    Ok(if ll.is_finite() { -ll } else { f64::INFINITY })
  }
}

/// Maximizes `log_lik` over an unconstrained parameter vector with Nelder-Mead.
///
/// Returns the best parameters and the log-likelihood there.
pub(crate) fn maximize_log_lik<F>(
  log_lik: F,
  x0: Vec<f64>,
  step: f64,
  options: &CopulaOptions,
) -> Result<(Vec<f64>, f64)>
where
  F: Fn(&[f64]) -> f64,
{
  let mut simplex = Vec::with_capacity(x0.len() + 1);
  simplex.push(x0.clone());
  for i in 0..x0.len() {
    let mut point = x0.clone();
    point[i] += step;
    simplex.push(point);
  }

  let solver = NelderMead::new(simplex).with_sd_tolerance(options.tolerance)?;
  let res = Executor::new(NegLogLik { log_lik }, solver)
    .configure(|state| state.max_iters(options.max_iters))
    .run()?;

  let best = res
    .state
    .best_param
    .ok_or_else(|| anyhow!("optimizer returned no parameters"))?;
  let cost = res.state.best_cost;
  debug!(iters = res.state.iter, cost, "likelihood maximization");

  if !cost.is_finite() {
    bail!("likelihood is not finite at any visited parameter");
  }

  Ok((best, -cost))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn pseudo_obs_average_ties() {
    let u = array![[0.3, 1.0], [0.1, 1.0], [0.3, 2.0], [0.9, 0.0]];
    let p = pseudo_obs(&u);
    // column 0 ranks: 0.1 -> 1, 0.3 -> 2.5 (tied), 0.9 -> 4
    assert_abs_diff_eq!(p[[1, 0]], 1.0 / 5.0, epsilon = 1e-15);
    assert_abs_diff_eq!(p[[0, 0]], 2.5 / 5.0, epsilon = 1e-15);
    assert_abs_diff_eq!(p[[2, 0]], 2.5 / 5.0, epsilon = 1e-15);
    assert_abs_diff_eq!(p[[3, 0]], 4.0 / 5.0, epsilon = 1e-15);
    // column 1 ranks: 0 -> 1, 1 -> 2.5, 2 -> 4
    assert_abs_diff_eq!(p[[3, 1]], 0.2, epsilon = 1e-15);
    assert_abs_diff_eq!(p[[0, 1]], 0.5, epsilon = 1e-15);
    assert_abs_diff_eq!(p[[2, 1]], 0.8, epsilon = 1e-15);
    assert!(p.iter().all(|&v| v > 0.0 && v < 1.0));
  }

  #[test]
  fn observations_outside_unit_cube_are_rejected() {
    assert!(check_observations(&array![[0.2, 1.2, 0.5]], 3).is_err());
    assert!(check_observations(&array![[0.2, f64::NAN, 0.5]], 3).is_err());
    assert!(check_observations(&array![[0.2, 0.5]], 3).is_err());
    assert!(check_observations(&array![[0.0, 1.0, 0.5]], 3).is_ok());
    assert!(check_fit_data(&array![[0.1, 0.2, 0.3]], 3).is_err());
  }

  #[test]
  fn nelder_mead_maximizes_concave_function() {
    let (x, ll) = maximize_log_lik(
      |x: &[f64]| -(x[0] - 1.5).powi(2) - 2.0,
      vec![0.0],
      0.5,
      &CopulaOptions::default(),
    )
    .unwrap();
    assert_abs_diff_eq!(x[0], 1.5, epsilon = 1e-3);
    assert_abs_diff_eq!(ll, -2.0, epsilon = 1e-6);
  }

  #[test]
  fn families_build_unfitted_copulas_in_enumeration_order() {
    let built: Vec<CopulaFamily> = CopulaFamily::ALL
      .iter()
      .map(|f| f.build(3, CopulaOptions::default()).family())
      .collect();
    assert_eq!(built, CopulaFamily::ALL.to_vec());
    assert!(CopulaFamily::Gaussian < CopulaFamily::Gumbel);
    for family in CopulaFamily::ALL {
      let c = family.build(3, CopulaOptions::default());
      assert!(c.params().is_none());
      assert_eq!(c.dim(), 3);
    }
  }
}
