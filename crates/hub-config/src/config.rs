//! Service configuration
//!
//! ```yaml
//! log_level: info
//! storage_dir: ./data
//! topics: { sensors: sensors, hubs: hubs, snapshots: snapshots }
//! log: { partitions: 4 }
//! consumer:
//!   poll_timeout_ms: 500
//!   max_batch: 100
//!   groups: { aggregator: aggregator, hub_events: analyzer-hubs, snapshots: analyzer-snapshots }
//! actuator:
//!   endpoint: http://localhost:59090/device-actions
//!   request_timeout_ms: 2000
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::YamlLoader;

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "SMARTHUB_CONFIG";
/// Configuration file used when neither argument nor environment names one
pub const DEFAULT_CONFIG_FILE: &str = "smarthub.yaml";

/// Pick the configuration path: explicit argument, then environment, then default
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default tracing filter; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding `.storage/` for registry persistence
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    #[serde(default)]
    pub topics: TopicsConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub consumer: ConsumerConfig,

    #[serde(default)]
    pub actuator: ActuatorConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            storage_dir: default_storage_dir(),
            topics: TopicsConfig::default(),
            log: LogConfig::default(),
            consumer: ConsumerConfig::default(),
            actuator: ActuatorConfig::default(),
        }
    }
}

/// Topic names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    pub sensors: String,
    pub hubs: String,
    pub snapshots: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            sensors: "sensors".to_string(),
            hubs: "hubs".to_string(),
            snapshots: "snapshots".to_string(),
        }
    }
}

/// In-process event log settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub partitions: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { partitions: 4 }
    }
}

/// Consumer loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Upper bound of one blocking poll, and so of shutdown latency
    pub poll_timeout_ms: u64,
    pub max_batch: usize,
    pub groups: GroupsConfig,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: 500,
            max_batch: 100,
            groups: GroupsConfig::default(),
        }
    }
}

impl ConsumerConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Consumer group of each loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupsConfig {
    pub aggregator: String,
    pub hub_events: String,
    pub snapshots: String,
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            aggregator: "aggregator".to_string(),
            hub_events: "analyzer-hubs".to_string(),
            snapshots: "analyzer-snapshots".to_string(),
        }
    }
}

/// Actuation endpoint; without an endpoint actions are only logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout_ms: 2000,
        }
    }
}

impl ActuatorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl AppConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let loader = YamlLoader::new(path);
        Self::from_value(path, loader.load()?)
    }

    /// Parse YAML text, as found in `path`
    pub fn from_str_at(path: impl AsRef<Path>, content: &str) -> ConfigResult<Self> {
        let path = path.as_ref();
        let loader = YamlLoader::new(path);
        Self::from_value(path, loader.load_str(content)?)
    }

    fn from_value(path: &Path, value: serde_yaml::Value) -> ConfigResult<Self> {
        // An empty file parses as null
        let config: Self = if value.is_null() {
            Self::default()
        } else {
            serde_yaml::from_value(value).map_err(|e| ConfigError::ParseYaml {
                path: path.to_path_buf(),
                source: e,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.consumer.poll_timeout_ms == 0 || self.consumer.poll_timeout_ms >= 1000 {
            return Err(invalid(
                "consumer.poll_timeout_ms",
                "must be between 1 and 999 milliseconds",
            ));
        }
        if self.consumer.max_batch == 0 {
            return Err(invalid("consumer.max_batch", "must be greater than zero"));
        }
        if self.log.partitions == 0 {
            return Err(invalid("log.partitions", "must be greater than zero"));
        }
        if self.actuator.request_timeout_ms == 0 {
            return Err(invalid(
                "actuator.request_timeout_ms",
                "must be greater than zero",
            ));
        }
        for (key, topic) in [
            ("topics.sensors", &self.topics.sensors),
            ("topics.hubs", &self.topics.hubs),
            ("topics.snapshots", &self.topics.snapshots),
        ] {
            if topic.trim().is_empty() {
                return Err(invalid(key, "must not be empty"));
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
