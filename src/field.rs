//! # Field
//!
//! $$
//! X(t, y, x),\quad t \in \{t_1,\dots,t_T\},\ \operatorname{month}(t) \in \{1,\dots,12\}
//! $$
//!
use std::fmt;

use chrono::Datelike;
use chrono::NaiveDate;
use ndarray::Array3;
use ndarray::Axis;

use crate::error::DroughtError;

/// The three hydro-climatic variables entering the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variable {
  /// Terrestrial water storage.
  Tws,
  /// Precipitation.
  Precip,
  /// Evapotranspiration.
  Et,
}

impl Variable {
  /// Stacking order used by the marginal transform and the copula columns.
  pub const ALL: [Variable; 3] = [Variable::Tws, Variable::Precip, Variable::Et];

  /// Name of the anomaly variable in the analysis dataset.
  pub fn anomaly_name(&self) -> &'static str {
    match self {
      Variable::Tws => "tws_anom",
      Variable::Precip => "precip_anom",
      Variable::Et => "et_anom",
    }
  }
}

impl fmt::Display for Variable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Variable::Tws => "tws",
      Variable::Precip => "precip",
      Variable::Et => "et",
    };
    f.write_str(name)
  }
}

/// A monthly scalar field on a `(time, y, x)` grid. Missing values are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateField {
  variable: Variable,
  times: Vec<NaiveDate>,
  values: Array3<f64>,
}

impl ClimateField {
  /// Build a field, checking that every time step has a slab of values.
  pub fn new(
    variable: Variable,
    times: Vec<NaiveDate>,
    values: Array3<f64>,
  ) -> Result<Self, DroughtError> {
    if times.len() != values.len_of(Axis(0)) {
      return Err(DroughtError::ShapeMismatch {
        what: format!("{variable} time axis"),
        expected: vec![times.len()],
        got: vec![values.len_of(Axis(0))],
      });
    }

    Ok(Self {
      variable,
      times,
      values,
    })
  }

  pub fn variable(&self) -> Variable {
    self.variable
  }

  pub fn times(&self) -> &[NaiveDate] {
    &self.times
  }

  pub fn values(&self) -> &Array3<f64> {
    &self.values
  }

  pub fn into_values(self) -> Array3<f64> {
    self.values
  }

  /// `(time, y, x)`.
  pub fn shape(&self) -> (usize, usize, usize) {
    self.values.dim()
  }

  /// Calendar month (1..=12) of every time step.
  pub fn months(&self) -> Vec<u32> {
    self.times.iter().map(|t| t.month()).collect()
  }

  /// Same coordinates, new values.
  pub(crate) fn with_values(&self, values: Array3<f64>) -> Self {
    debug_assert_eq!(values.dim(), self.values.dim());
    Self {
      variable: self.variable,
      times: self.times.clone(),
      values,
    }
  }

  /// Checks that `other` lives on exactly the same coordinates.
  pub fn ensure_aligned(&self, other: &ClimateField) -> Result<(), DroughtError> {
    if self.shape() != other.shape() {
      let (t, y, x) = self.shape();
      let (ot, oy, ox) = other.shape();
      return Err(DroughtError::ShapeMismatch {
        what: other.variable.anomaly_name().to_string(),
        expected: vec![t, y, x],
        got: vec![ot, oy, ox],
      });
    }

    if let Some(i) = self
      .times
      .iter()
      .zip(other.times.iter())
      .position(|(a, b)| a != b)
    {
      return Err(DroughtError::TimeAxisMismatch {
        reason: format!(
          "{} has {} at step {i} but {} has {}",
          self.variable, self.times[i], other.variable, other.times[i]
        ),
      });
    }

    Ok(())
  }
}

/// Monthly time axis of `n` steps starting on the first of `start_year`-`start_month`.
pub fn monthly_axis(start_year: i32, start_month: u32, n: usize) -> Vec<NaiveDate> {
  let mut out = Vec::with_capacity(n);
  let mut year = start_year;
  let mut month = start_month;
  for _ in 0..n {
    if let Some(d) = NaiveDate::from_ymd_opt(year, month, 1) {
      out.push(d);
    }
    month += 1;
    if month > 12 {
      month = 1;
      year += 1;
    }
  }
  out
}
