//! # Selection
//!
//! $$
//! \mathrm{AIC}=-2\ell+2k,\qquad \mathrm{BIC}=-2\ell+k\ln n
//! $$
//!
//! Every candidate family is fitted by maximum likelihood on the same paired
//! observations. A family that fails to fit is recorded with
//! $\ell=-\infty$ and infinite criteria, and the selection goes on.
//!
use std::collections::BTreeMap;
use std::sync::Arc;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::copulas::pseudo_obs;
use crate::copulas::Copula;
use crate::copulas::CopulaFamily;
use crate::copulas::CopulaOptions;
use crate::error::DroughtError;

/// Settings of the copula selector, built with the `with_*` methods and
/// checked by [`SelectorConfig::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorConfig {
  /// Candidate families.
  families: Vec<CopulaFamily>,
  /// Re-rank the observations to `rank / (n + 1)` before fitting.
  to_pseudo_obs: bool,
  max_iters: u64,
  tolerance: f64,
  cdf_points: usize,
}

impl Default for SelectorConfig {
  fn default() -> Self {
    let options = CopulaOptions::default();
    Self {
      families: CopulaFamily::ALL.to_vec(),
      to_pseudo_obs: true,
      max_iters: options.max_iters,
      tolerance: options.tolerance,
      cdf_points: options.cdf_points,
    }
  }
}

impl SelectorConfig {
  /// Restricts the candidate families.
  ///
  /// The order given here does not matter: equal AICs always go to the
  /// earliest family in `CopulaFamily` order.
  pub fn with_families(mut self, families: Vec<CopulaFamily>) -> Self {
    self.families = families;
    self
  }

  pub fn with_pseudo_obs(mut self, to_pseudo_obs: bool) -> Self {
    self.to_pseudo_obs = to_pseudo_obs;
    self
  }

  /// Sets the Nelder-Mead iteration cap.
  pub fn with_max_iters(mut self, max_iters: u64) -> Self {
    self.max_iters = max_iters;
    self
  }

  /// Sets the Nelder-Mead simplex tolerance.
  pub fn with_tolerance(mut self, tolerance: f64) -> Self {
    self.tolerance = tolerance;
    self
  }

  /// Sets the lattice size of the Gaussian CDF.
  pub fn with_cdf_points(mut self, cdf_points: usize) -> Self {
    self.cdf_points = cdf_points;
    self
  }

  pub fn families(&self) -> &[CopulaFamily] {
    &self.families
  }

  pub fn to_pseudo_obs(&self) -> bool {
    self.to_pseudo_obs
  }

  pub fn max_iters(&self) -> u64 {
    self.max_iters
  }

  pub fn tolerance(&self) -> f64 {
    self.tolerance
  }

  pub fn cdf_points(&self) -> usize {
    self.cdf_points
  }

  /// Numerical options handed to each family.
  pub fn options(&self) -> CopulaOptions {
    CopulaOptions {
      max_iters: self.max_iters,
      tolerance: self.tolerance,
      cdf_points: self.cdf_points,
    }
  }

  /// Validates this configuration.
  ///
  /// Returns an error for an empty or repeated family list, a zero
  /// iteration cap or lattice size, or a non-positive tolerance.
  pub fn validate(&self) -> Result<(), DroughtError> {
    if self.families.is_empty() {
      return Err(invalid("at least one copula family is required"));
    }
    for (i, family) in self.families.iter().enumerate() {
      if self.families[..i].contains(family) {
        return Err(invalid(&format!("copula family {family} is listed twice")));
      }
    }
    if self.max_iters == 0 {
      return Err(invalid("max_iters must be at least 1"));
    }
    if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
      return Err(invalid(&format!(
        "tolerance must be finite and positive, got {}",
        self.tolerance
      )));
    }
    if self.cdf_points == 0 {
      return Err(invalid("cdf_points must be at least 1"));
    }
    Ok(())
  }
}

fn invalid(reason: &str) -> DroughtError {
  DroughtError::InvalidConfig {
    reason: reason.to_string(),
  }
}

/// Outcome of fitting one family.
#[derive(Debug, Clone)]
pub struct FamilyFit {
  pub family: CopulaFamily,
  pub log_likelihood: f64,
  pub aic: f64,
  pub bic: f64,
  /// Fitted parameters, `None` when the fit failed.
  pub params: Option<Array1<f64>>,
  /// Fitted model, `None` when the fit failed.
  pub copula: Option<Arc<dyn Copula>>,
  /// Why the fit failed.
  pub error: Option<String>,
}

impl FamilyFit {
  fn failed(family: CopulaFamily, error: String) -> Self {
    Self {
      family,
      log_likelihood: f64::NEG_INFINITY,
      aic: f64::INFINITY,
      bic: f64::INFINITY,
      params: None,
      copula: None,
      error: Some(error),
    }
  }

  pub fn is_fitted(&self) -> bool {
    self.copula.is_some()
  }

  /// Number of fitted parameters, `0` for a failed fit.
  pub fn n_params(&self) -> usize {
    self.params.as_ref().map_or(0, |p| p.len())
  }
}

/// `(AIC, BIC)` of a log-likelihood with `k` parameters on `n` observations.
pub fn information_criteria(log_likelihood: f64, k: usize, n: usize) -> (f64, f64) {
  let k = k as f64;
  let aic = -2.0 * log_likelihood + 2.0 * k;
  let bic = -2.0 * log_likelihood + (n as f64).ln() * k;
  (aic, bic)
}

/// Family with the smallest AIC; ties go to the earliest family.
pub fn min_aic_family(results: &BTreeMap<CopulaFamily, FamilyFit>) -> Option<CopulaFamily> {
  let mut best: Option<&FamilyFit> = None;
  for fit in results.values() {
    match best {
      Some(b) if !(fit.aic < b.aic) => {}
      _ => best = Some(fit),
    }
  }
  best.map(|fit| fit.family)
}

/// Per-family results of one selection run.
#[derive(Debug, Clone)]
pub struct CopulaSelection {
  /// Number of paired observations the families were fitted on.
  pub n_obs: usize,
  pub best: CopulaFamily,
  pub results: BTreeMap<CopulaFamily, FamilyFit>,
}

impl CopulaSelection {
  pub fn best_fit(&self) -> Option<&FamilyFit> {
    self.results.get(&self.best)
  }

  /// The selected model, `None` if every family failed.
  pub fn best_copula(&self) -> Option<&Arc<dyn Copula>> {
    self.best_fit().and_then(|fit| fit.copula.as_ref())
  }
}

/// Fits the configured families to three paired uniform series and selects by AIC.
///
/// Rows with a missing value in any series are dropped first.
pub fn fit_best_copula(
  tws: ArrayView1<f64>,
  precip: ArrayView1<f64>,
  et: ArrayView1<f64>,
  config: &SelectorConfig,
) -> Result<CopulaSelection, DroughtError> {
  for (what, len) in [("precip", precip.len()), ("et", et.len())] {
    if len != tws.len() {
      return Err(DroughtError::ShapeMismatch {
        what: format!("{what} uniform series"),
        expected: vec![tws.len()],
        got: vec![len],
      });
    }
  }

  let rows: Vec<[f64; 3]> = tws
    .iter()
    .zip(precip.iter())
    .zip(et.iter())
    .map(|((&a, &b), &c)| [a, b, c])
    .filter(|row| row.iter().all(|v| !v.is_nan()))
    .collect();
  if rows.len() < tws.len() {
    debug!(dropped = tws.len() - rows.len(), "dropped rows with missing values");
  }

  let mut u = Array2::<f64>::zeros((rows.len(), 3));
  for (mut dst, row) in u.axis_iter_mut(Axis(0)).zip(rows.iter()) {
    dst.assign(&ArrayView1::from(&row[..]));
  }

  select_copula(&u, config)
}

/// Fits the configured families to an `(n, d)` observation matrix and selects by AIC.
pub fn select_copula(u: &Array2<f64>, config: &SelectorConfig) -> Result<CopulaSelection, DroughtError> {
  config.validate()?;
  let options = config.options();
  let candidates = config
    .families()
    .iter()
    .map(|family| family.build(u.ncols(), options))
    .collect();
  select_from_candidates(u, candidates, config)
}

/// Fits the given unfitted copulas and selects the one with the smallest AIC.
///
/// The family list of `config` is ignored; the other settings apply.
pub fn select_from_candidates(
  u: &Array2<f64>,
  candidates: Vec<Box<dyn Copula>>,
  config: &SelectorConfig,
) -> Result<CopulaSelection, DroughtError> {
  config.validate()?;
  if candidates.is_empty() {
    return Err(invalid("at least one candidate copula is required"));
  }
  for candidate in &candidates {
    if candidate.dim() != u.ncols() {
      return Err(DroughtError::ShapeMismatch {
        what: format!("{} copula observations", candidate.family()),
        expected: vec![u.nrows(), candidate.dim()],
        got: vec![u.nrows(), u.ncols()],
      });
    }
  }

  let n_obs = u.nrows();
  let data = if config.to_pseudo_obs() { pseudo_obs(u) } else { u.clone() };

  let mut results = BTreeMap::new();
  for candidate in candidates {
    let family = candidate.family();
    if results.contains_key(&family) {
      return Err(invalid(&format!("copula family {family} is listed twice")));
    }

    let fit = match fit_family(candidate, &data) {
      Ok(fit) => {
        info!(
          "{family} Copula: Log-Likelihood={:.2}, AIC={:.2}, BIC={:.2}",
          fit.log_likelihood, fit.aic, fit.bic
        );
        fit
      }
      Err(e) => {
        warn!("Error fitting {family} copula: {e:#}");
        FamilyFit::failed(family, format!("{e:#}"))
      }
    };
    results.insert(family, fit);
  }

  let Some(best) = min_aic_family(&results) else {
    return Err(invalid("no copula family was evaluated"));
  };
  if results.values().all(|fit| !fit.is_fitted()) {
    warn!(n_obs, "every copula family failed to fit, falling back to {best}");
  } else {
    info!("Best copula (by AIC): {best} (AIC: {:.2})", results[&best].aic);
  }

  Ok(CopulaSelection { n_obs, best, results })
}

fn fit_family(mut copula: Box<dyn Copula>, u: &Array2<f64>) -> anyhow::Result<FamilyFit> {
  copula.fit(u)?;
  let log_likelihood = copula.log_lik(u)?;
  let params = copula.params();
  let k = copula.n_params();
  let (aic, bic) = information_criteria(log_likelihood, k, u.nrows());

  Ok(FamilyFit {
    family: copula.family(),
    log_likelihood,
    aic,
    bic,
    params,
    copula: Some(Arc::from(copula)),
    error: None,
  })
}
