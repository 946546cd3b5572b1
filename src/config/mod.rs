//! Configuration module for the regime trader.
//!
//! Settings load from environment variables (after `.env` is read by the
//! binary) or from a TOML file, organized by concern: Pipeline and Data source.

mod data_source_config;
mod pipeline_config;

pub use data_source_config::{DEFAULT_YAHOO_BASE_URL, DataSource, DataSourceConfig, parse_symbols};
pub use pipeline_config::PipelineConfig;

use crate::domain::errors::ConfigError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Key-to-value lookup used by the `from_lookup` constructors.
pub type EnvLookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub data: DataSourceConfig,
    /// Directory for JSON and CSV reports; nothing is written when unset
    pub output_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup(lookup: &EnvLookup<'_>) -> Result<Self> {
        let pipeline =
            PipelineConfig::from_lookup(lookup).context("Failed to load pipeline config")?;
        let data =
            DataSourceConfig::from_lookup(lookup).context("Failed to load data source config")?;

        Ok(Self {
            pipeline,
            data,
            output_dir: lookup("OUTPUT_DIR").map(PathBuf::from),
        })
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse TOML configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.data.validate()
    }
}
