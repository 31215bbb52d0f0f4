//! # Cache
//!
//! $$
//! \text{id}\mapsto\left(\hat C_{\text{id}},\ \{\text{family}\mapsto(\ell,\mathrm{AIC},\mathrm{BIC},\hat\theta)\}\right)
//! $$
//!
//! Selections are written once per subregion by the batch driver and read
//! many times afterwards.
//!
use std::collections::HashMap;

use tracing::info;

use crate::error::DroughtError;
use crate::selection::min_aic_family;
use crate::selection::CopulaSelection;
use crate::selection::FamilyFit;

/// Identifier of a spatial subregion.
pub type SubregionId = u32;

#[derive(Debug, Clone, Default)]
pub struct SubregionCache {
  selections: HashMap<SubregionId, CopulaSelection>,
}

impl SubregionCache {
  pub fn new() -> Self {
    Self::default()
  }

  /// Stores the selection of a subregion. A second write for the same id is
  /// rejected, and so is a selection without results.
  pub fn insert(&mut self, id: SubregionId, selection: CopulaSelection) -> Result<(), DroughtError> {
    if self.selections.contains_key(&id) {
      return Err(DroughtError::DuplicateSubregion(id));
    }
    if selection.results.is_empty() {
      return Err(DroughtError::EmptySelection(id));
    }
    self.selections.insert(id, selection);
    Ok(())
  }

  pub fn get(&self, id: SubregionId) -> Option<&CopulaSelection> {
    self.selections.get(&id)
  }

  pub fn contains(&self, id: SubregionId) -> bool {
    self.selections.contains_key(&id)
  }

  pub fn len(&self) -> usize {
    self.selections.len()
  }

  pub fn is_empty(&self) -> bool {
    self.selections.is_empty()
  }

  /// Ids in ascending order.
  pub fn ids(&self) -> Vec<SubregionId> {
    let mut ids: Vec<SubregionId> = self.selections.keys().copied().collect();
    ids.sort_unstable();
    ids
  }

  /// Best cached fit of a subregion, chosen again by minimum AIC.
  ///
  /// The returned fit carries the stored copula handle, which is `None`
  /// only if every family failed for that subregion.
  pub fn lookup_best_copula(&self, id: SubregionId) -> Result<&FamilyFit, DroughtError> {
    let selection = self
      .selections
      .get(&id)
      .ok_or(DroughtError::SubregionNotFound(id))?;
    let best = min_aic_family(&selection.results)
      .and_then(|family| selection.results.get(&family))
      .ok_or(DroughtError::EmptySelection(id))?;

    info!(
      subregion = id,
      "Best Copula: {}, Log-Likelihood: {:.2}, AIC: {:.2}, BIC: {:.2}, Parameters: {:?}",
      best.family,
      best.log_likelihood,
      best.aic,
      best.bic,
      best.params.as_ref().map(|p| p.to_vec()),
    );
    Ok(best)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use tracing_test::traced_test;

  use super::*;
  use crate::copulas::clayton::sample_clayton;
  use crate::copulas::CopulaFamily;
  use crate::selection::select_copula;
  use crate::selection::SelectorConfig;

  fn selection(seed: u64) -> CopulaSelection {
    let config = SelectorConfig::default().with_families(vec![CopulaFamily::Clayton, CopulaFamily::Gumbel]);
    select_copula(&sample_clayton(3.0, 150, 3, seed), &config).unwrap()
  }

  #[test]
  fn missing_subregion_is_not_found() {
    let cache = SubregionCache::new();
    assert_eq!(
      cache.lookup_best_copula(3).unwrap_err(),
      DroughtError::SubregionNotFound(3)
    );
  }

  #[traced_test]
  #[test]
  fn lookup_returns_the_stored_model() {
    let mut cache = SubregionCache::new();
    let stored = selection(1);
    let stored_copula = stored.best_copula().unwrap().clone();
    cache.insert(7, stored).unwrap();

    let fit = cache.lookup_best_copula(7).unwrap();
    assert_eq!(fit.family, CopulaFamily::Clayton);
    assert!(Arc::ptr_eq(fit.copula.as_ref().unwrap(), &stored_copula));
    assert!(logs_contain("Best Copula: Clayton"));
    assert!(cache.lookup_best_copula(8).is_err());
  }

  #[test]
  fn empty_selection_is_rejected() {
    let mut cache = SubregionCache::new();
    let mut empty = selection(5);
    empty.results.clear();
    assert_eq!(cache.insert(4, empty).unwrap_err(), DroughtError::EmptySelection(4));
    assert!(!cache.contains(4));
    assert_eq!(
      cache.lookup_best_copula(4).unwrap_err(),
      DroughtError::SubregionNotFound(4)
    );
  }

  #[test]
  fn writes_are_once_per_subregion() {
    let mut cache = SubregionCache::new();
    cache.insert(2, selection(2)).unwrap();
    cache.insert(1, selection(3)).unwrap();
    assert_eq!(
      cache.insert(2, selection(4)).unwrap_err(),
      DroughtError::DuplicateSubregion(2)
    );
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.ids(), vec![1, 2]);
    assert!(cache.contains(1));
    assert!(!cache.is_empty());
  }
}
