//! Regime pipeline configuration.
//!
//! Model size, split and EM settings for one symbol's run.

use super::EnvLookup;
use crate::domain::errors::ConfigError;
use crate::domain::regime::labeler::SUPPORTED_STATES;
use crate::domain::regime::{CovarianceMode, FitOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Settings passed explicitly into each pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub n_states: usize,
    pub covariance_mode: CovarianceMode,
    /// Fraction of the return series held out for decoding and trading
    pub test_fraction: f64,
    /// Seeds model initialization and synthetic state samples
    pub seed: u64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub variance_floor: f64,
    /// Synthetic draws per state for the model summary
    pub summary_samples: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let fit = FitOptions::default();
        Self {
            n_states: SUPPORTED_STATES,
            covariance_mode: CovarianceMode::Full,
            test_fraction: 0.2,
            seed: fit.seed,
            max_iterations: fit.max_iterations,
            tolerance: fit.tolerance,
            variance_floor: fit.variance_floor,
            summary_samples: 10_000,
        }
    }
}

impl PipelineConfig {
    pub fn from_lookup(lookup: &EnvLookup<'_>) -> Result<Self> {
        let defaults = Self::default();
        let covariance_mode = match lookup("COVARIANCE_MODE") {
            Some(raw) => CovarianceMode::from_str(&raw)?,
            None => defaults.covariance_mode,
        };

        Ok(Self {
            n_states: parse(lookup, "REGIME_STATES", defaults.n_states)?,
            covariance_mode,
            test_fraction: parse(lookup, "TEST_FRACTION", defaults.test_fraction)?,
            seed: parse(lookup, "RANDOM_SEED", defaults.seed)?,
            max_iterations: parse(lookup, "EM_MAX_ITERATIONS", defaults.max_iterations)?,
            tolerance: parse(lookup, "EM_TOLERANCE", defaults.tolerance)?,
            variance_floor: parse(lookup, "VARIANCE_FLOOR", defaults.variance_floor)?,
            summary_samples: parse(lookup, "SUMMARY_SAMPLES", defaults.summary_samples)?,
        })
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            variance_floor: self.variance_floor,
            seed: self.seed,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_states != SUPPORTED_STATES {
            return Err(ConfigError::Invalid {
                field: "n_states",
                reason: format!(
                    "regime labeling requires exactly {} states, got {}",
                    SUPPORTED_STATES, self.n_states
                ),
            });
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigError::Invalid {
                field: "test_fraction",
                reason: format!("must be in (0, 1), got {}", self.test_fraction),
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.tolerance > 0.0) {
            return Err(ConfigError::Invalid {
                field: "tolerance",
                reason: format!("must be positive, got {}", self.tolerance),
            });
        }
        if !(self.variance_floor > 0.0) {
            return Err(ConfigError::Invalid {
                field: "variance_floor",
                reason: format!("must be positive, got {}", self.variance_floor),
            });
        }
        Ok(())
    }
}

fn parse<T>(lookup: &EnvLookup<'_>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .context(format!("Failed to parse {}", key)),
        None => Ok(default),
    }
}
