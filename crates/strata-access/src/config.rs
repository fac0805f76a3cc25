//! Runtime configuration for the access layer.
//!
//! Quota limits are deployment policy rather than code: they load from a
//! TOML file with `STRATA_`-prefixed environment overrides and are applied
//! to the registry before the layer is built.

use std::{collections::HashMap, path::Path};

use chrono::Duration;
use serde::Deserialize;

use strata_core::entity::{QuotaRule, Registry, RegistryError};

/// Per-kind quota settings as they appear in the config file:
///
/// ```toml
/// [quotas.post]
/// max_per_actor = 5
/// window_secs   = 86400
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaSetting {
  pub max_per_actor: u32,
  /// Rolling window length in seconds. Defaults to 24 hours.
  #[serde(default = "default_window_secs")]
  pub window_secs: u64,
}

fn default_window_secs() -> u64 { 86_400 }

/// Top-level access layer configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
  /// Quota rules keyed by entity kind.
  #[serde(default)]
  pub quotas: HashMap<String, QuotaSetting>,
}

impl AccessConfig {
  /// Load from a TOML file (which may be absent) plus `STRATA_…`
  /// environment overrides.
  pub fn load(path: impl AsRef<Path>) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path.as_ref()).required(false))
      .add_source(config::Environment::with_prefix("STRATA").separator("__"))
      .build()?
      .try_deserialize()
  }

  /// Apply the configured quotas to `registry`, replacing any rules set in
  /// code. Naming a kind the registry does not know is a configuration
  /// error.
  pub fn apply(&self, registry: &mut Registry) -> Result<(), RegistryError> {
    for (kind, setting) in &self.quotas {
      let window = Duration::seconds(setting.window_secs as i64);
      registry.set_quota(kind, Some(QuotaRule::new(setting.max_per_actor, window)))?;
    }
    Ok(())
  }
}
