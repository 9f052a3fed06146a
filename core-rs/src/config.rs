/**
 * config.rs
 * Parser for universal edges configuration files (YAML format)
 *
 * Format:
 * ```yaml
 * apiVersion: universal-edges/v1
 * kind: EdgeConfig
 * spec:
 *   controller:
 *     databaseDirectory: database
 *     directoryFile: edgeDatastore.json
 *   instance:
 *     instanceId: 1446149399
 *     outgoingRatePerSecond: 50
 *     commandRatePerSecond: 34
 *     edgeWaitTimeoutMs: 10000
 * ```
 */

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dispatch::MAX_INTERVAL;
use crate::edge::InstanceId;
use crate::errors::EdgeError;

pub const API_VERSION: &str = "universal-edges/v1";
pub const KIND: &str = "EdgeConfig";

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

fn default_database_directory() -> PathBuf {
    PathBuf::from("database")
}

fn default_directory_file() -> String {
    crate::DEFAULT_DIRECTORY_FILE.to_string()
}

fn default_outgoing_rate() -> f64 {
    50.0
}

/// Roughly two game ticks per command
fn default_command_rate() -> f64 {
    34.0
}

fn default_edge_wait_timeout_ms() -> u64 {
    10_000
}

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EdgesConfig {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub spec: Spec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Spec {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub instance: InstanceConfig,
}

/// Controller settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    #[serde(default = "default_database_directory")]
    pub database_directory: PathBuf,
    #[serde(default = "default_directory_file")]
    pub directory_file: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            database_directory: default_database_directory(),
            directory_file: default_directory_file(),
        }
    }
}

impl ControllerConfig {
    /// Full path of the edge directory file
    pub fn directory_path(&self) -> PathBuf {
        self.database_directory.join(&self.directory_file)
    }
}

/// Per-instance settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    #[serde(default)]
    pub instance_id: InstanceId,
    /// Maximum `EdgeTransfer` messages per second per edge
    #[serde(default = "default_outgoing_rate")]
    pub outgoing_rate_per_second: f64,
    /// Maximum simulation commands per second per edge
    #[serde(default = "default_command_rate")]
    pub command_rate_per_second: f64,
    #[serde(default = "default_edge_wait_timeout_ms")]
    pub edge_wait_timeout_ms: u64,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        InstanceConfig {
            instance_id: 0,
            outgoing_rate_per_second: default_outgoing_rate(),
            command_rate_per_second: default_command_rate(),
            edge_wait_timeout_ms: default_edge_wait_timeout_ms(),
        }
    }
}

impl InstanceConfig {
    pub fn for_instance(instance_id: InstanceId) -> Self {
        InstanceConfig {
            instance_id,
            ..Default::default()
        }
    }

    pub fn edge_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.edge_wait_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), EdgeError> {
        check_rate("outgoingRatePerSecond", self.outgoing_rate_per_second)?;
        check_rate("commandRatePerSecond", self.command_rate_per_second)?;
        if self.edge_wait_timeout_ms == 0 {
            return Err(EdgeError::Config("edgeWaitTimeoutMs must not be zero".to_string()));
        }
        Ok(())
    }
}

/// A rate must be positive and allow at least one run per `MAX_INTERVAL`
fn check_rate(name: &str, rate: f64) -> Result<(), EdgeError> {
    if !(rate > 0.0) {
        return Err(EdgeError::Config(format!("{} must be positive, got {}", name, rate)));
    }
    let min_rate = 1.0 / MAX_INTERVAL.as_secs_f64();
    if rate < min_rate {
        return Err(EdgeError::Config(format!(
            "{} must be at least {} (one per {}s), got {}",
            name,
            min_rate,
            MAX_INTERVAL.as_secs(),
            rate
        )));
    }
    Ok(())
}

impl Default for EdgesConfig {
    fn default() -> Self {
        EdgesConfig {
            api_version: default_api_version(),
            kind: default_kind(),
            spec: Spec::default(),
        }
    }
}

impl EdgesConfig {
    /// Load configuration from a YAML file
    ///
    /// # Example
    /// ```no_run
    /// use universal_edges::config::EdgesConfig;
    ///
    /// let config = EdgesConfig::load("universal-edges.yaml").unwrap();
    /// assert!(config.spec.instance.outgoing_rate_per_second > 0.0);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EdgeError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(EdgeError::FileNotFound(path.to_string_lossy().to_string()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, EdgeError> {
        let config: EdgesConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EdgeError> {
        if self.api_version != API_VERSION {
            return Err(EdgeError::Config(format!(
                "unsupported apiVersion {} (expected {})",
                self.api_version, API_VERSION
            )));
        }
        if self.kind != KIND {
            return Err(EdgeError::Config(format!("unexpected kind {} (expected {})", self.kind, KIND)));
        }
        self.spec.instance.validate()
    }

    pub fn to_yaml(&self) -> Result<String, EdgeError> {
        Ok(serde_yaml::to_string(self)?)
    }
}
