//! # Synthetic
//!
//! $$
//! X_j(t,y,x)=a_j\sin\left(\tfrac{2\pi}{12}(m(t)-1)+\phi_j\right)+s_j\,\Phi^{-1}(U_j),\quad
//! U=\left(1+E_j/W\right)^{-1/\theta},\ W\sim\Gamma(1/\theta,1)
//! $$
//!
//! Raw monthly fields with a seasonal cycle and Clayton-dependent noise, for
//! demonstrations and tests.
//!
use std::f64::consts::PI;

use ndarray::Array3;
use rand::Rng;
use rand_distr::Distribution;
use rand_distr::Exp1;
use rand_distr::Gamma;
use statrs::distribution::ContinuousCDF;

use crate::cache::SubregionId;
use crate::copulas::gaussian::std_normal;
use crate::error::DroughtError;
use crate::field::monthly_axis;
use crate::field::ClimateField;
use crate::field::Variable;
use crate::pipeline::SubregionInputs;

/// `(amplitude, phase, noise scale)` of each variable.
const SEASONALITY: [(f64, f64, f64); 3] = [(40.0, 0.0, 15.0), (60.0, 1.0, 20.0), (30.0, 2.5, 10.0)];

/// Shape of a generated subregion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticGrid {
  pub start_year: i32,
  pub years: usize,
  pub ny: usize,
  pub nx: usize,
  /// Clayton dependence of the noise.
  pub theta: f64,
  /// Probability that a single value is missing.
  pub missing: f64,
}

impl Default for SyntheticGrid {
  fn default() -> Self {
    Self {
      start_year: 2003,
      years: 10,
      ny: 3,
      nx: 3,
      theta: 2.0,
      missing: 0.01,
    }
  }
}

pub fn generate_subregion<R: Rng + ?Sized>(
  id: SubregionId,
  grid: &SyntheticGrid,
  rng: &mut R,
) -> Result<SubregionInputs, DroughtError> {
  if !(grid.theta > 0.0 && grid.theta.is_finite()) {
    return Err(DroughtError::InvalidConfig {
      reason: format!("Clayton theta must be positive, got {}", grid.theta),
    });
  }
  if !(0.0..1.0).contains(&grid.missing) {
    return Err(DroughtError::InvalidConfig {
      reason: format!("missing fraction must be in [0, 1), got {}", grid.missing),
    });
  }

  let frailty = Gamma::new(1.0 / grid.theta, 1.0).map_err(|e| DroughtError::InvalidConfig {
    reason: format!("frailty distribution: {e}"),
  })?;
  let normal = std_normal();

  let nt = grid.years * 12;
  let times = monthly_axis(grid.start_year, 1, nt);
  let mut values: [Array3<f64>; 3] = std::array::from_fn(|_| Array3::zeros((nt, grid.ny, grid.nx)));

  for t in 0..nt {
    let season = 2.0 * PI * (t % 12) as f64 / 12.0;
    for y in 0..grid.ny {
      for x in 0..grid.nx {
        let w: f64 = frailty.sample(rng);
        for (j, &(amplitude, phase, scale)) in SEASONALITY.iter().enumerate() {
          let e: f64 = Exp1.sample(rng);
          let u = (1.0 + e / w).powf(-1.0 / grid.theta).clamp(1e-12, 1.0 - 1e-12);
          let v = amplitude * (season + phase).sin() + scale * normal.inverse_cdf(u);
          values[j][[t, y, x]] = if rng.gen::<f64>() < grid.missing { f64::NAN } else { v };
        }
      }
    }
  }

  let [tws, precip, et] = values;
  let tws = ClimateField::new(Variable::Tws, times.clone(), tws)?;
  let precip = ClimateField::new(Variable::Precip, times.clone(), precip)?;
  let et = ClimateField::new(Variable::Et, times, et)?;

  Ok(SubregionInputs::new(id, tws, precip, et))
}
