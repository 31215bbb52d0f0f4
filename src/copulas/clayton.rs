//! # Clayton
//!
//! $$
//! c_\theta(u)=\prod_{k=0}^{d-1}(1+k\theta)\prod_{i=1}^d u_i^{-(1+\theta)}
//! \left(1-d+\sum_{i=1}^d u_i^{-\theta}\right)^{-(d+1/\theta)}
//! $$
//!
use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;

use super::archimedean;
use super::archimedean::Generator;
use super::check_fit_data;
use super::check_observations;
use super::Copula;
use super::CopulaFamily;
use super::CopulaOptions;

/// Clayton copula, lower tail dependent, `theta > 0`.
#[derive(Debug, Clone)]
pub struct ClaytonCopula {
  dim: usize,
  options: CopulaOptions,
  theta: Option<f64>,
}

impl ClaytonCopula {
  pub fn new(dim: usize, options: CopulaOptions) -> Self {
    Self {
      dim,
      options,
      theta: None,
    }
  }

  pub fn with_theta(dim: usize, theta: f64) -> Result<Self> {
    if !(theta > 0.0 && theta.is_finite()) {
      bail!("Clayton theta must be in (0, inf), got {theta}");
    }
    Ok(Self {
      dim,
      options: CopulaOptions::default(),
      theta: Some(theta),
    })
  }

  pub fn theta(&self) -> Option<f64> {
    self.theta
  }

  fn require_theta(&self) -> Result<f64> {
    self.theta.ok_or_else(|| anyhow!("fit the copula first"))
  }
}

impl Generator for ClaytonCopula {
  fn name(&self) -> &'static str {
    "Clayton"
  }

  fn lower_bound(&self) -> f64 {
    0.0
  }

  fn theta_from_tau(&self, tau: f64) -> Result<f64> {
    if tau >= 1.0 {
      bail!("Kendall's tau of {tau} implies perfect dependence");
    }
    Ok(2.0 * tau / (1.0 - tau))
  }

  fn generator(&self, u: f64, theta: f64) -> f64 {
    u.powf(-theta) - 1.0
  }

  fn inverse_generator(&self, t: f64, theta: f64) -> f64 {
    (1.0 + t).powf(-1.0 / theta)
  }

  fn log_density(&self, row: ArrayView1<f64>, theta: f64) -> f64 {
    let d = row.len() as f64;
    let mut log_norm = 0.0;
    for k in 0..row.len() {
      log_norm += (1.0 + k as f64 * theta).ln();
    }
    let sum_log_u: f64 = row.iter().map(|u| u.ln()).sum();
    // ln(1 + sum(u^-theta - 1)), exact for small theta
    let log_s = row.iter().map(|u| (-theta * u.ln()).exp_m1()).sum::<f64>().ln_1p();
    // log_s / theta tends to -sum(ln u) as theta -> 0
    let scaled = if log_s > 0.0 { log_s / theta } else { -sum_log_u };
    log_norm - (1.0 + theta) * sum_log_u - d * log_s - scaled
  }
}

impl Copula for ClaytonCopula {
  fn family(&self) -> CopulaFamily {
    CopulaFamily::Clayton
  }

  fn dim(&self) -> usize {
    self.dim
  }

  fn params(&self) -> Option<Array1<f64>> {
    self.theta.map(|t| Array1::from(vec![t]))
  }

  fn n_params(&self) -> usize {
    1
  }

  fn fit(&mut self, u: &Array2<f64>) -> Result<()> {
    check_fit_data(u, self.dim)?;
    self.theta = Some(archimedean::fit_theta(&*self, u, &self.options)?);
    Ok(())
  }

  fn log_pdf(&self, u: &Array2<f64>) -> Result<Array1<f64>> {
    let theta = self.require_theta()?;
    check_observations(u, self.dim)?;
    Ok(archimedean::log_pdf(self, u, theta))
  }

  fn cdf(&self, u: &Array2<f64>) -> Result<Array1<f64>> {
    let theta = self.require_theta()?;
    check_observations(u, self.dim)?;
    Ok(archimedean::cdf(self, u, theta))
  }
}


#[cfg(test)]
pub(crate) use tests::sample_clayton;
