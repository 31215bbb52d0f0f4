//! # Error
//!
//! $$
//! \text{missing values} \ne \text{errors}
//! $$
//!
//! Missing data is carried as `NaN` inside the arrays and never surfaces here.
//! Per-family copula fitting failures are recorded in the selection results.
//! What remains are caller mistakes and failed lookups.

use crate::cache::SubregionId;

/// Error type for the fallible operations of the crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DroughtError {
  /// Two arrays that must share a layout do not.
  #[error("shape mismatch for {what}: expected {expected:?}, got {got:?}")]
  ShapeMismatch {
    /// What was being compared.
    what: String,
    /// Expected shape.
    expected: Vec<usize>,
    /// Actual shape.
    got: Vec<usize>,
  },

  /// The time coordinates of fields that must be aligned differ.
  #[error("time axis mismatch: {reason}")]
  TimeAxisMismatch {
    /// Description of the problem.
    reason: String,
  },

  /// A configuration parameter is invalid.
  #[error("invalid configuration: {reason}")]
  InvalidConfig {
    /// Description of the problem.
    reason: String,
  },

  /// Lookup of a subregion that was never inserted into the cache.
  #[error("subregion {0} not found in processed data")]
  SubregionNotFound(SubregionId),

  /// A selection without any per-family result.
  #[error("subregion {0} has no copula results")]
  EmptySelection(SubregionId),

  /// A subregion was written to the cache twice.
  #[error("subregion {0} has already been processed")]
  DuplicateSubregion(SubregionId),
}
