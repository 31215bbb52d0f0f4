//! # Gumbel
//!
//! $$
//! C_\theta(u)=\exp\left(-\Big(\sum_{i=1}^d(-\ln u_i)^\theta\Big)^{1/\theta}\right),\quad \theta\ge 1
//! $$
//!
//! The density uses the expansion
//! $\psi^{(k)}(t)=\psi(t)\sum_{j=1}^k c_{k,j}\,t^{j\alpha-k}$ with $\alpha=1/\theta$.
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

/// Gumbel copula, upper tail dependent, `theta >= 1`.
#[derive(Debug, Clone)]
pub struct GumbelCopula {
  dim: usize,
  options: CopulaOptions,
  theta: Option<f64>,
}

impl GumbelCopula {
  pub fn new(dim: usize, options: CopulaOptions) -> Self {
    Self {
      dim,
      options,
      theta: None,
    }
  }

  pub fn with_theta(dim: usize, theta: f64) -> Result<Self> {
    if !(theta >= 1.0 && theta.is_finite()) {
      bail!("Gumbel theta must be in [1, inf), got {theta}");
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

/// Coefficients `c_{d,j}`, `j = 1..=d`, of the `d`-th generator derivative.
fn derivative_coefficients(d: usize, alpha: f64) -> Vec<f64> {
  // index j, slot 0 unused
  let mut c = vec![0.0; d + 1];
  c[1] = -alpha;
  for k in 1..d {
    let mut next = vec![0.0; d + 1];
    for j in 1..=k + 1 {
      let keep = if j <= k { c[j] * (j as f64 * alpha - k as f64) } else { 0.0 };
      next[j] = keep - alpha * c[j - 1];
    }
    c = next;
  }
  c
}

impl Generator for GumbelCopula {
  fn name(&self) -> &'static str {
    "Gumbel"
  }

  fn lower_bound(&self) -> f64 {
    1.0
  }

  fn theta_from_tau(&self, tau: f64) -> Result<f64> {
    if tau >= 1.0 {
      bail!("Kendall's tau of {tau} implies perfect dependence");
    }
    Ok(1.0 / (1.0 - tau))
  }

  fn generator(&self, u: f64, theta: f64) -> f64 {
    (-u.ln()).powf(theta)
  }

  fn inverse_generator(&self, t: f64, theta: f64) -> f64 {
    (-t.powf(1.0 / theta)).exp()
  }

  fn log_density(&self, row: ArrayView1<f64>, theta: f64) -> f64 {
    let d = row.len();
    let alpha = 1.0 / theta;
    let t: f64 = row.iter().map(|&u| self.generator(u, theta)).sum();

    let coefficients = derivative_coefficients(d, alpha);
    let sign = if d % 2 == 0 { 1.0 } else { -1.0 };
    let series: f64 = (1..=d)
      .map(|j| coefficients[j] * t.powf(j as f64 * alpha - d as f64))
      .sum::<f64>()
      * sign;
    if !(series > 0.0) {
      return f64::NEG_INFINITY;
    }

    let jacobian: f64 = row
      .iter()
      .map(|&u| theta.ln() + (theta - 1.0) * (-u.ln()).ln() - u.ln())
      .sum();
    series.ln() - t.powf(alpha) + jacobian
  }
}

impl Copula for GumbelCopula {
  fn family(&self) -> CopulaFamily {
    CopulaFamily::Gumbel
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
