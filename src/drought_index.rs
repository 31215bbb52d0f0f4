//! # Drought index
//!
//! $$
//! p_t=C\left(u^{tws}_t,u^{precip}_t,u^{et}_t\right),\qquad \mathrm{MDI}_t=\Phi^{-1}(p_t)
//! $$
//!
use anyhow::bail;
use anyhow::Result;
use chrono::NaiveDate;
use ndarray::Array3;
use statrs::distribution::ContinuousCDF;

use crate::copulas::gaussian::std_normal;
use crate::copulas::Copula;
use crate::ecdf::UniformMarginals;

const EPS: f64 = 1e-12;

/// Joint non-exceedance probability and its standard normal score on the
/// `(time, y, x)` grid. Points outside the common mask are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct DroughtIndex {
  pub times: Vec<NaiveDate>,
  pub joint_probability: Array3<f64>,
  pub index: Array3<f64>,
}

pub fn compute_drought_index(copula: &dyn Copula, marginals: &UniformMarginals) -> Result<DroughtIndex> {
  if copula.dim() != 3 {
    bail!("drought index needs a 3-dimensional copula, got {}", copula.dim());
  }

  let p = copula.cdf(&marginals.paired())?;
  let mut joint_probability = Array3::<f64>::from_elem(marginals.mask.raw_dim(), f64::NAN);
  let valid = joint_probability
    .iter_mut()
    .zip(marginals.mask.iter())
    .filter(|(_, &keep)| keep)
    .map(|(v, _)| v);
  for (dst, &src) in valid.zip(p.iter()) {
    *dst = src;
  }

  let n = std_normal();
  let index = joint_probability.mapv(|p| if p.is_nan() { p } else { n.inverse_cdf(p.clamp(EPS, 1.0 - EPS)) });

  Ok(DroughtIndex {
    times: marginals.tws.times().to_vec(),
    joint_probability,
    index,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::Array2;

  use super::*;
  use crate::copulas::ClaytonCopula;
  use crate::copulas::CopulaOptions;
  use crate::copulas::GaussianCopula;
  use crate::ecdf::compute_ecdf_consistent;
  use crate::field::monthly_axis;
  use crate::field::ClimateField;
  use crate::field::Variable;

  fn marginals() -> UniformMarginals {
    let times = monthly_axis(2003, 1, 4);
    let field = |variable, values: Vec<f64>| {
      ClimateField::new(variable, times.clone(), Array3::from_shape_vec((4, 1, 2), values).unwrap()).unwrap()
    };
    let tws = field(Variable::Tws, vec![0.1, -1.0, 0.4, 0.2, -0.3, 1.1, 0.9, f64::NAN]);
    let precip = field(Variable::Precip, vec![1.0, 0.5, -0.2, 0.3, 0.0, -0.7, 0.6, 0.8]);
    let et = field(Variable::Et, vec![-0.5, 0.2, 0.7, 0.1, 0.3, -0.1, 0.4, 0.9]);
    compute_ecdf_consistent(&tws, &precip, &et).unwrap()
  }

  #[test]
  fn independence_index_is_product_of_marginals() {
    let m = marginals();
    let copula = GaussianCopula::with_corr(Array2::eye(3), CopulaOptions::default()).unwrap();
    let di = compute_drought_index(&copula, &m).unwrap();

    assert_eq!(di.index.dim(), (4, 1, 2));
    assert_eq!(di.times.len(), 4);
    assert!(di.joint_probability[[3, 0, 1]].is_nan());
    assert!(di.index[[3, 0, 1]].is_nan());

    let n = std_normal();
    for t in 0..3 {
      for x in 0..2 {
        let expected = m.tws.values()[[t, 0, x]] * m.precip.values()[[t, 0, x]] * m.et.values()[[t, 0, x]];
        assert_abs_diff_eq!(di.joint_probability[[t, 0, x]], expected, epsilon = 1e-9);
        assert_abs_diff_eq!(di.index[[t, 0, x]], n.inverse_cdf(expected), epsilon = 1e-6);
      }
    }
  }

  #[test]
  fn joint_probability_respects_frechet_bounds() {
    let m = marginals();
    let copula = ClaytonCopula::with_theta(3, 2.5).unwrap();
    let di = compute_drought_index(&copula, &m).unwrap();
    for ((t, y, x), &p) in di.joint_probability.indexed_iter() {
      if !m.mask[[t, y, x]] {
        continue;
      }
      let lowest = m.tws.values()[[t, y, x]]
        .min(m.precip.values()[[t, y, x]])
        .min(m.et.values()[[t, y, x]]);
      assert!(p > 0.0 && p <= lowest + 1e-12);
      assert!(di.index[[t, y, x]].is_finite());
    }
  }

  #[test]
  fn requires_three_dimensions() {
    let m = marginals();
    let copula = GaussianCopula::with_corr(Array2::eye(2), CopulaOptions::default()).unwrap();
    assert!(compute_drought_index(&copula, &m).is_err());
  }
}
