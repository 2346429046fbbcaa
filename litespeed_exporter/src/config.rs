//! This module controls configuration parsing from the end user. Every field
//! has a default so an empty file, or no file at all, is a valid
//! configuration. Command line flags are layered on top by the binary.
use std::{
    fs, io,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use rustc_hash::FxHashMap;
use serde::Deserialize;

/// Errors produced by [`Config`]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Error for a serde [`serde_yaml`].
    #[error("Failed to deserialize yaml: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),
    /// Error reading config file
    #[error("Failed to read config file {path:?}: {source}")]
    ReadFile {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: Box<io::Error>,
    },
    /// The telemetry path is not usable as an HTTP route.
    #[error("Telemetry path must start with '/' and must not be '/': {0:?}")]
    TelemetryPath(String),
}

fn default_report_path() -> PathBuf {
    PathBuf::from(litespeed_report::DEFAULT_REPORT_PATH)
}

fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9104))
}

fn default_telemetry_path() -> String {
    "/metrics".to_string()
}

fn default_concurrency_limit() -> usize {
    litespeed_report::Config::default().concurrency_limit
}

/// Main configuration struct for this program
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory LiteSpeed writes its `.rtreport*` files into.
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
    /// Address to serve the landing page and telemetry on.
    #[serde(default = "default_listen_address")]
    pub listen_address: SocketAddr,
    /// Path under which the metrics are served.
    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: String,
    /// Upper bound on report files loaded at the same time.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Labels added to every exported series.
    #[serde(default)]
    pub global_labels: FxHashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            report_path: default_report_path(),
            listen_address: default_listen_address(),
            telemetry_path: default_telemetry_path(),
            concurrency_limit: default_concurrency_limit(),
            global_labels: FxHashMap::default(),
        }
    }
}

impl Config {
    /// Parse a configuration from YAML text and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed, names an unknown field or
    /// carries an unusable telemetry path.
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        // An empty document deserializes as unit, not as an empty mapping.
        let config: Self = if contents.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold a valid
    /// configuration.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        Self::from_yaml(&contents)
    }

    /// Check invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TelemetryPath`] if the telemetry path would shadow the
    /// landing page or is not absolute.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.telemetry_path.starts_with('/') || self.telemetry_path == "/" {
            return Err(Error::TelemetryPath(self.telemetry_path.clone()));
        }
        Ok(())
    }

    /// The part of this configuration the report aggregator needs.
    #[must_use]
    pub fn aggregator(&self) -> litespeed_report::Config {
        litespeed_report::Config {
            concurrency_limit: self.concurrency_limit,
        }
    }
}
