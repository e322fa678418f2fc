//! Configuration file management for certstatus.
//!
//! Settings come from three places, later ones overriding earlier ones:
//!
//! 1. Default values
//! 2. Configuration file (`certstatus.toml` in the working directory, or `--config`)
//! 3. Command-line arguments
//!
//! # Example Configuration File
//!
//! ```toml
//! output = "text"
//! timeout_secs = 10
//! crl_freshness = "warn"
//!
//! [prometheus]
//! enabled = true
//! address = "http://localhost:9091"
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checker::OutputFormat;
use crate::crl::CrlFreshness;
use crate::fetcher::DEFAULT_TIMEOUT_SECS;

/// File picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "certstatus.toml";

/// Main configuration structure.
///
/// All fields are optional so that partial configurations can be merged.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Output format: text, json, summary
    pub output: Option<String>,
    /// Per-request HTTP timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Behaviour for a CRL past its nextUpdate: warn, strict
    pub crl_freshness: Option<CrlFreshness>,
    /// User-Agent sent with every request
    pub user_agent: Option<String>,
    pub prometheus: Option<PrometheusConfig>,
}

/// Prometheus Push Gateway settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PrometheusConfig {
    pub enabled: Option<bool>,
    /// Push gateway address (e.g. "http://localhost:9091")
    pub address: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output: Some(OutputFormat::Text.to_string()),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            crl_freshness: Some(CrlFreshness::Warn),
            user_agent: Some(default_user_agent()),
            prometheus: Some(PrometheusConfig {
                enabled: Some(false),
                address: Some("http://localhost:9091".to_string()),
            }),
        }
    }
}

pub fn default_user_agent() -> String {
    format!("certstatus/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// ```no_run
    /// # use certstatus::config::Config;
    /// let config = Config::from_file("certstatus.toml")?;
    /// # Ok::<(), certstatus::config::ConfigError>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Loads `path` if given, else [`DEFAULT_CONFIG_FILE`] when it exists.
    ///
    /// An explicitly named file must exist; the implicit one is optional.
    pub fn discover(path: Option<&Path>) -> Result<Option<Self>, ConfigError> {
        match path {
            Some(path) => Self::from_file(path).map(Some),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(DEFAULT_CONFIG_FILE).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Merges `other` over this configuration; `None` fields in `other` keep
    /// the current value.
    pub fn merge_with(mut self, other: Config) -> Self {
        if other.output.is_some() {
            self.output = other.output;
        }
        if other.timeout_secs.is_some() {
            self.timeout_secs = other.timeout_secs;
        }
        if other.crl_freshness.is_some() {
            self.crl_freshness = other.crl_freshness;
        }
        if other.user_agent.is_some() {
            self.user_agent = other.user_agent;
        }
        if let Some(other_prom) = other.prometheus {
            if let Some(ref mut self_prom) = self.prometheus {
                if other_prom.enabled.is_some() {
                    self_prom.enabled = other_prom.enabled;
                }
                if other_prom.address.is_some() {
                    self_prom.address = other_prom.address;
                }
            } else {
                self.prometheus = Some(other_prom);
            }
        }
        self
    }

    /// Builds the CLI layer for merging. Only `Some` values override.
    pub fn from_cli_args(
        output: Option<OutputFormat>,
        timeout_secs: Option<u64>,
        crl_freshness: Option<CrlFreshness>,
        prometheus: Option<bool>,
        prometheus_address: Option<String>,
    ) -> Self {
        Config {
            output: output.map(|o| o.to_string()),
            timeout_secs,
            crl_freshness,
            user_agent: None,
            prometheus: Some(PrometheusConfig {
                enabled: prometheus,
                address: prometheus_address,
            }),
        }
    }

    /// Rejects values no check could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.output_format()?;
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.prometheus_address().is_some_and(|a| a.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "prometheus address must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        match &self.output {
            Some(output) => output.parse().map_err(|_| {
                ConfigError::Validation(format!(
                    "unknown output format {:?} (expected text, json or summary)",
                    output
                ))
            }),
            None => Ok(OutputFormat::default()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn crl_freshness(&self) -> CrlFreshness {
        self.crl_freshness.unwrap_or_default()
    }

    pub fn user_agent(&self) -> String {
        self.user_agent.clone().unwrap_or_else(default_user_agent)
    }

    /// Push gateway address when pushing is enabled.
    pub fn prometheus_address(&self) -> Option<&str> {
        let prometheus = self.prometheus.as_ref()?;
        if prometheus.enabled != Some(true) {
            return None;
        }
        prometheus.address.as_deref()
    }

    /// Example configuration with every option set.
    pub fn example_toml() -> String {
        let example = Config {
            output: Some(OutputFormat::Summary.to_string()),
            timeout_secs: Some(15),
            crl_freshness: Some(CrlFreshness::Strict),
            user_agent: Some(default_user_agent()),
            prometheus: Some(PrometheusConfig {
                enabled: Some(true),
                address: Some("http://localhost:9091".to_string()),
            }),
        };

        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| "# Error generating example".to_string())
    }
}

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found, permission denied, ...
    #[error("IO Error: {0}")]
    Io(String),
    /// Invalid TOML or a type mismatch
    #[error("Parse Error: {0}")]
    Parse(String),
    #[error("Validation Error: {0}")]
    Validation(String),
}
