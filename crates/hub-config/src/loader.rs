//! YAML loader with `!env_var` substitution
//!
//! `!env_var NAME` is replaced by the value of the environment variable
//! `NAME`; an unset variable is an error. Other tags are kept as-is.

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, trace};

/// YAML loader for one configuration file
pub struct YamlLoader {
    path: PathBuf,
}

impl YamlLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read and process the file
    pub fn load(&self) -> ConfigResult<Value> {
        debug!("Loading YAML file: {:?}", self.path);
        let content = fs::read_to_string(&self.path).map_err(|e| ConfigError::ReadFile {
            path: self.path.clone(),
            source: e,
        })?;
        self.load_str(&content)
    }

    /// Process YAML text as if it were the content of the file
    pub fn load_str(&self, content: &str) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: self.path.clone(),
            source: e,
        })?;
        self.process_value(value)
    }

    fn process_value(&self, value: Value) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::new();
                for (k, v) in map {
                    result.insert(self.process_value(k)?, self.process_value(v)?);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => {
                let result: ConfigResult<Vec<Value>> =
                    seq.into_iter().map(|v| self.process_value(v)).collect();
                Ok(Value::Sequence(result?))
            }
            _ => Ok(value),
        }
    }

    fn process_tagged(&self, tagged: serde_yaml::value::TaggedValue) -> ConfigResult<Value> {
        trace!("Processing tag '{}'", tagged.tag);
        if tagged.tag == "!env_var" {
            return self.process_env_var(tagged.value);
        }
        let value = self.process_value(tagged.value)?;
        Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
            tag: tagged.tag,
            value,
        })))
    }

    fn process_env_var(&self, value: Value) -> ConfigResult<Value> {
        let Value::String(var_name) = value else {
            return Err(ConfigError::InvalidValue {
                key: "!env_var".to_string(),
                reason: "environment variable name must be a string".to_string(),
            });
        };

        let env_value = std::env::var(&var_name).map_err(|_| ConfigError::EnvVarNotFound {
            var: var_name.clone(),
        })?;

        debug!("Substituted env var: {}", var_name);
        // Re-parse so numeric values keep their YAML type
        Ok(serde_yaml::from_str(&env_value).unwrap_or(Value::String(env_value)))
    }
}
