//! # Gaussian
//!
//! $$
//! c_R(u)=|R|^{-1/2}\exp\left(-\tfrac12 z^\top(R^{-1}-I)z\right),\quad z_i=\Phi^{-1}(u_i)
//! $$
//!
use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Axis;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::Normal;
use tracing::debug;

use super::check_fit_data;
use super::check_observations;
use super::correlation::kendall_tau;
use super::maximize_log_lik;
use super::Copula;
use super::CopulaFamily;
use super::CopulaOptions;

const EPS: f64 = 1e-12;

/// Cholesky factor, inverse and log-determinant of a correlation matrix.
#[derive(Debug, Clone)]
struct CorrFactor {
  chol_lower: Array2<f64>,
  inv: Array2<f64>,
  log_det: f64,
}

impl CorrFactor {
  fn new(corr: &Array2<f64>) -> Result<Self> {
    let d = corr.nrows();
    if d != corr.ncols() {
      bail!("correlation matrix must be square");
    }

    let corr_na = nalgebra::DMatrix::from_fn(d, d, |i, j| corr[[i, j]]);
    let chol = corr_na
      .clone()
      .cholesky()
      .ok_or_else(|| anyhow!("correlation matrix is not positive definite"))?;
    let l = chol.l();
    let log_det = 2.0 * (0..d).map(|i| l[(i, i)].ln()).sum::<f64>();
    let inv = chol.inverse();

    Ok(Self {
      chol_lower: Array2::from_shape_fn((d, d), |(i, j)| l[(i, j)]),
      inv: Array2::from_shape_fn((d, d), |(i, j)| inv[(i, j)]),
      log_det,
    })
  }
}

/// Gaussian copula with an unstructured correlation matrix.
///
/// Parameters are the strictly lower triangular correlations in row order,
/// `d(d-1)/2` of them.
#[derive(Debug, Clone)]
pub struct GaussianCopula {
  dim: usize,
  options: CopulaOptions,
  corr: Option<Array2<f64>>,
  factor: Option<CorrFactor>,
}

impl GaussianCopula {
  pub fn new(dim: usize, options: CopulaOptions) -> Self {
    Self {
      dim,
      options,
      corr: None,
      factor: None,
    }
  }

  pub fn with_corr(corr: Array2<f64>, options: CopulaOptions) -> Result<Self> {
    let mut copula = Self::new(corr.nrows(), options);
    copula.set_corr(corr)?;
    Ok(copula)
  }

  pub fn correlation(&self) -> Option<&Array2<f64>> {
    self.corr.as_ref()
  }

  fn set_corr(&mut self, corr: Array2<f64>) -> Result<()> {
    self.factor = Some(CorrFactor::new(&corr)?);
    self.dim = corr.nrows();
    self.corr = Some(corr);
    Ok(())
  }

  fn require_fitted(&self) -> Result<&CorrFactor> {
    self
      .factor
      .as_ref()
      .ok_or_else(|| anyhow!("fit the copula or provide a correlation matrix first"))
  }

  fn off_diagonal(&self, corr: &Array2<f64>) -> Array1<f64> {
    let mut out = Vec::with_capacity(self.n_params());
    for i in 1..self.dim {
      for j in 0..i {
        out.push(corr[[i, j]]);
      }
    }
    Array1::from(out)
  }

  fn corr_from_off_diagonal(&self, rho: &[f64]) -> Array2<f64> {
    let mut corr = Array2::<f64>::eye(self.dim);
    let mut k = 0;
    for i in 1..self.dim {
      for j in 0..i {
        corr[[i, j]] = rho[k];
        corr[[j, i]] = rho[k];
        k += 1;
      }
    }
    corr
  }
}

pub(crate) fn std_normal() -> Normal {
  Normal::new(0.0, 1.0).expect("standard normal parameters are valid")
}

/// Normal scores `Phi^-1(u)` with `u` clamped away from 0 and 1.
fn transform_to_normal(u: &Array2<f64>) -> Array2<f64> {
  let n = std_normal();
  u.mapv(|v| n.inverse_cdf(v.clamp(EPS, 1.0 - EPS)))
}

/// `sum_i z_i z_i^T` over the rows of `z`.
fn scatter(z: &Array2<f64>) -> Array2<f64> {
  z.t().dot(z)
}

/// Log-likelihood from the scatter matrix of the normal scores.
fn log_lik_from_scatter(factor: &CorrFactor, s: &Array2<f64>, n: usize) -> f64 {
  let d = s.nrows();
  let mut trace = 0.0;
  for i in 0..d {
    for j in 0..d {
      let delta = if i == j { 1.0 } else { 0.0 };
      trace += (factor.inv[[i, j]] - delta) * s[[j, i]];
    }
  }
  -0.5 * (n as f64 * factor.log_det + trace)
}

/// Deterministic Richtmyer lattice weights `sqrt(p)` for the first primes.
fn lattice_generators(k: usize) -> Vec<f64> {
  let mut primes = Vec::with_capacity(k);
  let mut candidate = 2u64;
  while primes.len() < k {
    if (2..candidate).take_while(|p| p * p <= candidate).all(|p| candidate % p != 0) {
      primes.push((candidate as f64).sqrt());
    }
    candidate += 1;
  }
  primes
}

impl Copula for GaussianCopula {
  fn family(&self) -> CopulaFamily {
    CopulaFamily::Gaussian
  }

  fn dim(&self) -> usize {
    self.dim
  }

  fn params(&self) -> Option<Array1<f64>> {
    self.corr.as_ref().map(|c| self.off_diagonal(c))
  }

  fn n_params(&self) -> usize {
    self.dim * (self.dim.saturating_sub(1)) / 2
  }

  fn fit(&mut self, u: &Array2<f64>) -> Result<()> {
    check_fit_data(u, self.dim)?;

    // Kendall's tau on uniforms, map to Gaussian rho as the start point.
    let tau = kendall_tau(u)?;
    let rho0 = tau.mapv(|t| (std::f64::consts::PI * 0.5 * t).sin());
    let x0: Vec<f64> = self
      .off_diagonal(&rho0)
      .iter()
      .map(|r| r.clamp(-0.95, 0.95).atanh())
      .collect();

    let z = transform_to_normal(u);
    let s = scatter(&z);
    let n = u.nrows();

    let (best, ll) = maximize_log_lik(
      |x: &[f64]| {
        let rho: Vec<f64> = x.iter().map(|v| v.tanh()).collect();
        match CorrFactor::new(&self.corr_from_off_diagonal(&rho)) {
          Ok(factor) => log_lik_from_scatter(&factor, &s, n),
          Err(_) => f64::NEG_INFINITY,
        }
      },
      x0,
      0.1,
      &self.options,
    )?;

    let rho: Vec<f64> = best.iter().map(|v| v.tanh()).collect();
    debug!(?rho, log_lik = ll, "gaussian copula fit");
    let corr = self.corr_from_off_diagonal(&rho);
    self.set_corr(corr)
  }

  fn log_pdf(&self, u: &Array2<f64>) -> Result<Array1<f64>> {
    let factor = self.require_fitted()?;
    check_observations(u, self.dim)?;

    let z = transform_to_normal(u);
    let mut out = Array1::<f64>::zeros(z.nrows());
    for (i, row) in z.axis_iter(Axis(0)).enumerate() {
      let q = factor.inv.dot(&row) - &row;
      out[i] = -0.5 * (factor.log_det + row.dot(&q));
    }
    Ok(out)
  }

  /// Genz separation-of-variables integral on a rank-1 lattice.
  fn cdf(&self, u: &Array2<f64>) -> Result<Array1<f64>> {
    let factor = self.require_fitted()?;
    check_observations(u, self.dim)?;

    let d = self.dim;
    let l = &factor.chol_lower;
    let n = std_normal();
    let m = self.options.cdf_points.max(1);
    let alpha = lattice_generators(d.saturating_sub(1));
    let z = transform_to_normal(u);

    let mut out = Array1::<f64>::zeros(z.nrows());
    let mut y = vec![0.0; d];
    for (r, b) in z.axis_iter(Axis(0)).enumerate() {
      let e0 = n.cdf(b[0] / l[[0, 0]]);
      let mut total = 0.0;
      for k in 1..=m {
        let mut e = e0;
        let mut f = e0;
        for i in 1..d {
          let w = (k as f64 * alpha[i - 1]).fract();
          y[i - 1] = n.inverse_cdf((w * e).clamp(EPS, 1.0 - EPS));
          let shift: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
          e = n.cdf((b[i] - shift) / l[[i, i]]);
          f *= e;
        }
        total += f;
      }
      out[r] = total / m as f64;
    }

    Ok(out)
  }
}
