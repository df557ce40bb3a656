//! Fan-out Configuration
//!
//! Options that shape a fan-out run. Configuration can be built in code or
//! loaded from a YAML file:
//!
//! ```yaml
//! concurrency: 4
//! ```
//!
//! Missing fields fall back to their defaults. Every configuration is
//! validated before a fan-out starts; an invalid one never launches a unit.

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::error::FanOutError;

/// Concurrency ceiling used when none is configured.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Options recognised by a fan-out.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct FanOutConfig {
    /// Maximum number of units outstanding at once. Must be at least 1.
    pub concurrency: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl FanOutConfig {
    /// Creates a configuration with the given ceiling.
    pub fn new(concurrency: usize) -> Self {
        Self { concurrency }
    }

    /// Sets the concurrency ceiling.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Checks the configuration for values that can never run.
    pub fn validate(&self) -> Result<(), FanOutError> {
        if self.concurrency == 0 {
            return Err(FanOutError::configuration(
                "concurrency must be at least 1, got 0",
            ));
        }
        Ok(())
    }

    /// Parses and validates a configuration from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, FanOutError> {
        // An empty document means "all defaults".
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: FanOutConfig = serde_yaml::from_str(yaml).map_err(|e| {
            FanOutError::configuration(format!(
                "Failed to parse configuration YAML: {}. Check the file format.",
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a YAML file.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use fanrunner::FanOutConfig;
    ///
    /// fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = FanOutConfig::load("fanout.yaml")?;
    ///     println!("concurrency: {}", config.concurrency);
    ///     Ok(())
    /// }
    /// ```
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FanOutError> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let yaml_content = fs::read_to_string(path).map_err(|e| {
            FanOutError::configuration(format!(
                "Failed to read configuration file '{}': {}. Check that the file exists and is readable.",
                path.display(),
                e
            ))
        })?;

        debug!("YAML content loaded ({} bytes)", yaml_content.len());

        let config = Self::from_yaml_str(&yaml_content)?;
        info!("Configuration loaded (concurrency: {})", config.concurrency);
        Ok(config)
    }
}
