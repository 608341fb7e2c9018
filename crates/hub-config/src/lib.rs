//! Smarthub configuration
//!
//! Configuration is read from a single YAML file. Every key has a default, so
//! a missing file yields a working in-process setup.

pub mod config;
pub mod error;
pub mod loader;

pub use config::{
    resolve_config_path, ActuatorConfig, AppConfig, ConsumerConfig, GroupsConfig, LogConfig,
    TopicsConfig, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::YamlLoader;
