//! # Logging
//!
//! $$
//! \texttt{-v}^k \mapsto \{\text{warn},\text{info},\text{debug},\text{trace}\}_k
//! $$
//!
use tracing_subscriber::EnvFilter;

/// Targets that receive log output. The binary shares the library's crate name.
const TARGETS: &[&str] = &["drought_rs"];

/// Installs the global subscriber for a `-v` count.
///
/// `RUST_LOG` overrides the count when set.
pub fn init(verbosity: u8) {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));
  tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn default_directives(verbosity: u8) -> String {
  let level = match verbosity {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  TARGETS
    .iter()
    .map(|t| format!("{t}={level}"))
    .collect::<Vec<_>>()
    .join(",")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn verbosity_maps_to_levels() {
    assert_eq!(default_directives(0), "drought_rs=warn");
    assert_eq!(default_directives(2), "drought_rs=debug");
    assert!(default_directives(7).ends_with("=trace"));
  }
}
