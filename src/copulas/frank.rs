//! # Frank
//!
//! $$
//! \varphi_\theta(u)=-\ln\frac{e^{-\theta u}-1}{e^{-\theta}-1},\qquad
//! c_\theta(u)=\theta^{d-1}\,\mathrm{Li}_{-(d-1)}(h)\prod_{i=1}^d\frac{e^{-\theta u_i}}{1-e^{-\theta u_i}},\quad
//! h=\frac{\prod_i(1-e^{-\theta u_i})}{(1-e^{-\theta})^{d-1}}
//! $$
//!
use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use gauss_quad::GaussLegendre;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use roots::find_root_brent;
use roots::SimpleConvergency;

use super::archimedean;
use super::archimedean::Generator;
use super::check_fit_data;
use super::check_observations;
use super::Copula;
use super::CopulaFamily;
use super::CopulaOptions;

const THETA_MIN: f64 = 1e-4;
const THETA_MAX: f64 = 1e3;

/// Frank copula, radially symmetric, `theta > 0` in three or more dimensions.
#[derive(Debug, Clone)]
pub struct FrankCopula {
  dim: usize,
  options: CopulaOptions,
  theta: Option<f64>,
}

impl FrankCopula {
  pub fn new(dim: usize, options: CopulaOptions) -> Self {
    Self {
      dim,
      options,
      theta: None,
    }
  }

  pub fn with_theta(dim: usize, theta: f64) -> Result<Self> {
    if !(theta > 0.0 && theta.is_finite()) {
      bail!("Frank theta must be in (0, inf), got {theta}");
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

/// Kendall's tau of the Frank copula, `1 - 4 (1 - D_1(theta)) / theta`.
pub fn frank_tau(theta: f64) -> Result<f64> {
  let quad = GaussLegendre::new(40).map_err(|e| anyhow!("Gauss-Legendre rule: {e:?}"))?;
  // integrand is below 1e-20 past 50
  let upper = theta.min(50.0);
  let integral = quad.integrate(0.0, upper, |t: f64| if t == 0.0 { 1.0 } else { t / t.exp_m1() });
  let debye = integral / theta;
  Ok(1.0 - 4.0 * (1.0 - debye) / theta)
}

impl Generator for FrankCopula {
  fn name(&self) -> &'static str {
    "Frank"
  }

  fn lower_bound(&self) -> f64 {
    0.0
  }

  fn theta_from_tau(&self, tau: f64) -> Result<f64> {
    if tau <= frank_tau(THETA_MIN)? {
      return Ok(THETA_MIN);
    }
    if tau >= frank_tau(THETA_MAX)? {
      return Ok(THETA_MAX);
    }

    let mut convergency = SimpleConvergency {
      eps: 1e-10,
      max_iter: 100,
    };
    let theta = find_root_brent(
      THETA_MIN,
      THETA_MAX,
      |theta: f64| frank_tau(theta).unwrap_or(f64::NAN) - tau,
      &mut convergency,
    )
    .map_err(|e| anyhow!("Frank tau inversion failed: {e:?}"))?;
    Ok(theta)
  }

  fn generator(&self, u: f64, theta: f64) -> f64 {
    -((-theta * u).exp_m1() / (-theta).exp_m1()).ln()
  }

  fn inverse_generator(&self, t: f64, theta: f64) -> f64 {
    -((-t).exp() * (-theta).exp_m1()).ln_1p() / theta
  }

  fn log_density(&self, row: ArrayView1<f64>, theta: f64) -> f64 {
    let d = row.len();
    let log_a = (-(-theta).exp_m1()).ln();
    let sum_log: f64 = row.iter().map(|&u| (-(-theta * u).exp_m1()).ln()).sum();
    let h = (sum_log - (d - 1) as f64 * log_a).exp();
    let sum_u: f64 = row.sum();

    (d - 1) as f64 * theta.ln() + archimedean::polylog_neg(d - 1, h).ln() - theta * sum_u - sum_log
  }
}

impl Copula for FrankCopula {
  fn family(&self) -> CopulaFamily {
    CopulaFamily::Frank
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
mod tests {
  use approx::assert_abs_diff_eq;
  use approx::assert_relative_eq;
  use ndarray::array;
  use rand::rngs::StdRng;
  use rand::Rng;
  use rand::SeedableRng;
  use rand_distr::Distribution;
  use rand_distr::Exp;

  use super::*;
  use crate::copulas::archimedean::numeric_density;
  use crate::copulas::pseudo_obs;

  /// Marshall-Olkin sampling with a logarithmic series frailty.
  fn sample_frank(theta: f64, n: usize, d: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let exp = Exp::new(1.0).unwrap();
    let p = -(-theta).exp_m1();
    let norm = -1.0 / (1.0 - p).ln();
    let c = FrankCopula::with_theta(d, theta).unwrap();

    let mut data = Array2::<f64>::zeros((n, d));
    for i in 0..n {
      let target: f64 = rng.gen();
      let mut k = 1.0;
      let mut pk = norm * p;
      let mut acc = pk;
      while acc < target && pk > f64::MIN_POSITIVE {
        pk *= p * k / (k + 1.0);
        k += 1.0;
        acc += pk;
      }
      for j in 0..d {
        let e: f64 = exp.sample(&mut rng);
        data[[i, j]] = c.inverse_generator(e / k, theta);
      }
    }
    data
  }

  #[test]
  fn tau_of_known_thetas() {
    // tabulated values of the Frank copula
    assert_abs_diff_eq!(frank_tau(1.0).unwrap(), 0.1100, epsilon = 1e-3);
    assert_abs_diff_eq!(frank_tau(5.0).unwrap(), 0.4567, epsilon = 1e-3);
    assert_abs_diff_eq!(frank_tau(10.0).unwrap(), 0.6657, epsilon = 1e-3);
  }

  #[test]
  fn tau_inversion_round_trips() {
    let c = FrankCopula::new(3, CopulaOptions::default());
    let theta = c.theta_from_tau(frank_tau(5.0).unwrap()).unwrap();
    assert_abs_diff_eq!(theta, 5.0, epsilon = 1e-6);
    assert_eq!(c.theta_from_tau(-0.2).unwrap(), THETA_MIN);
  }

  #[test]
  fn density_is_mixed_derivative_of_cdf() {
    let c = FrankCopula::with_theta(3, 4.0).unwrap();
    for point in [[0.3, 0.5, 0.7], [0.1, 0.2, 0.15], [0.9, 0.8, 0.6]] {
      let pdf = c.pdf(&array![[point[0], point[1], point[2]]]).unwrap()[0];
      assert_relative_eq!(pdf, numeric_density(&c, point, 4.0), max_relative = 1e-3);
    }
  }

  #[test]
  fn small_theta_is_close_to_independence() {
    let c = FrankCopula::with_theta(3, 1e-6).unwrap();
    let u = array![[0.3, 0.5, 0.7]];
    assert_abs_diff_eq!(c.pdf(&u).unwrap()[0], 1.0, epsilon = 1e-5);
    assert_abs_diff_eq!(c.cdf(&u).unwrap()[0], 0.3 * 0.5 * 0.7, epsilon = 1e-5);
  }

  #[test]
  fn fit_recovers_theta() {
    let u = pseudo_obs(&sample_frank(6.0, 1500, 3, 5));
    let mut c = FrankCopula::new(3, CopulaOptions::default());
    c.fit(&u).unwrap();
    assert_abs_diff_eq!(c.theta().unwrap(), 6.0, epsilon = 0.8);
  }
}
