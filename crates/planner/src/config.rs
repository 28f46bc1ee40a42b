use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0} must be at least 1")]
    ZeroHorizon(&'static str),
}

/// How an amount change travels into snapshots dated after the edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationPolicy {
    /// Every later snapshot takes the new amount.
    #[default]
    Overwrite,
    /// Later snapshots take the new amount until one holds an amount that
    /// differs from the pre-edit value; that snapshot and the rest keep theirs.
    StopAtDivergence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// How far ahead the forward occurrence search may look.
    pub forward_horizon_years: u32,
    /// Plan horizon when neither a goal deadline nor a profile end date exists.
    pub fallback_horizon_years: u32,
    /// Upcoming occurrences treated as already locked in; the first proposed
    /// change lands on the occurrence after these.
    pub lead_occurrences: u32,
    pub profile_end_date: Option<NaiveDate>,
    pub propagation: PropagationPolicy,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            forward_horizon_years: 10,
            fallback_horizon_years: 54,
            lead_occurrences: 1,
            profile_end_date: None,
            propagation: PropagationPolicy::Overwrite,
        }
    }
}

impl PlannerConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let config: PlannerConfig = toml::from_str(toml_content)?;
        config.check()?;
        Ok(config)
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.forward_horizon_years == 0 {
            return Err(ConfigError::ZeroHorizon("forward_horizon_years"));
        }
        if self.fallback_horizon_years == 0 {
            return Err(ConfigError::ZeroHorizon("fallback_horizon_years"));
        }
        Ok(())
    }
}
