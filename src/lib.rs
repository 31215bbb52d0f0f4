//! # drought-rs
//!
//! $$
//! \mathrm{MDI}=\Phi^{-1}\left(\hat C\left(\hat F_{tws}(z_{tws}),\hat F_{precip}(z_{precip}),\hat F_{et}(z_{et})\right)\right)
//! $$
//!
//! Monthly anomalies are standardized per calendar month, mapped to uniform
//! marginals on a common support, and joined by the copula family with the
//! smallest AIC. Selections are cached per subregion.
//!
pub mod anomaly;
pub mod cache;
pub mod copulas;
pub mod drought_index;
pub mod ecdf;
pub mod error;
pub mod field;
pub mod logging;
pub mod pipeline;
pub mod selection;
pub mod synthetic;

pub use cache::SubregionCache;
pub use cache::SubregionId;
pub use error::DroughtError;
pub use selection::CopulaSelection;
pub use selection::SelectorConfig;
