//! # Pipeline
//!
//! $$
//! X\ \xrightarrow{\text{standardize}}\ Z\ \xrightarrow{\text{ECDF}}\ U\ \xrightarrow{\text{AIC}}\ \hat C
//! $$
//!
use impl_new_derive::ImplNew;
use tracing::debug;
use tracing::info;
use tracing::info_span;

use crate::anomaly::calc_standardized_anomalies;
use crate::cache::SubregionCache;
use crate::cache::SubregionId;
use crate::ecdf::compute_ecdf_consistent;
use crate::ecdf::UniformMarginals;
use crate::error::DroughtError;
use crate::field::ClimateField;
use crate::selection::fit_best_copula;
use crate::selection::CopulaSelection;
use crate::selection::SelectorConfig;

/// Raw monthly fields of one subregion.
#[derive(ImplNew, Debug, Clone)]
pub struct SubregionInputs {
  pub id: SubregionId,
  pub tws: ClimateField,
  pub precip: ClimateField,
  pub et: ClimateField,
}

/// Intermediate and final products of one subregion.
#[derive(Debug, Clone)]
pub struct SubregionAnalysis {
  pub id: SubregionId,
  pub tws_anom: ClimateField,
  pub precip_anom: ClimateField,
  pub et_anom: ClimateField,
  pub marginals: UniformMarginals,
  pub selection: CopulaSelection,
}

/// Standardize, transform and select for one subregion.
pub fn analyze_subregion(
  inputs: &SubregionInputs,
  config: &SelectorConfig,
) -> Result<SubregionAnalysis, DroughtError> {
  inputs.tws.ensure_aligned(&inputs.precip)?;
  inputs.tws.ensure_aligned(&inputs.et)?;

  let tws_anom = calc_standardized_anomalies(&inputs.tws);
  let precip_anom = calc_standardized_anomalies(&inputs.precip);
  let et_anom = calc_standardized_anomalies(&inputs.et);

  let marginals = compute_ecdf_consistent(&tws_anom, &precip_anom, &et_anom)?;
  debug!(n_valid = marginals.n_valid, "uniform marginals");

  let u = marginals.paired();
  let selection = fit_best_copula(u.column(0), u.column(1), u.column(2), config)?;

  Ok(SubregionAnalysis {
    id: inputs.id,
    tws_anom,
    precip_anom,
    et_anom,
    marginals,
    selection,
  })
}

/// Analyzes every subregion in turn and caches the selections.
pub fn run_batch<I>(subregions: I, config: &SelectorConfig) -> Result<SubregionCache, DroughtError>
where
  I: IntoIterator<Item = SubregionInputs>,
{
  run_batch_with(subregions, config, |_| {})
}

/// [`run_batch`] with a callback invoked after each subregion.
pub fn run_batch_with<I, F>(
  subregions: I,
  config: &SelectorConfig,
  mut on_done: F,
) -> Result<SubregionCache, DroughtError>
where
  I: IntoIterator<Item = SubregionInputs>,
  F: FnMut(&SubregionAnalysis),
{
  config.validate()?;
  let mut cache = SubregionCache::new();

  for inputs in subregions {
    let span = info_span!("subregion", id = inputs.id);
    let _guard = span.enter();

    if cache.contains(inputs.id) {
      return Err(DroughtError::DuplicateSubregion(inputs.id));
    }
    let analysis = analyze_subregion(&inputs, config)?;
    on_done(&analysis);
    cache.insert(inputs.id, analysis.selection)?;
  }

  info!(subregions = cache.len(), "batch complete");
  Ok(cache)
}
