//! Configuration loading contract

use serde::de::DeserializeOwned;
use std::path::Path;

use super::validation::{ValidationError, ValidationResult};

/// Configuration load failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Core trait for engine configuration types
pub trait EngineConfig: Clone + Default + DeserializeOwned + Send + Sync + 'static {
    /// Prefix of environment variables that override this configuration
    const ENV_PREFIX: &'static str;

    /// Set a configuration value from a string
    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> ValidationResult;

    /// Load configuration from a TOML file
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: display,
                source,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })
    }

    /// Merge with environment variables, e.g. `ONEFS_RECONCILE_VERIFY_AFTER_UPDATE=false`
    fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Merge with an explicit set of variables
    fn merge_with_vars<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix(Self::ENV_PREFIX) {
                self.set_from_string(&config_key.to_lowercase(), &value)?;
            }
        }
        Ok(())
    }

    /// File, then environment, then validation
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }
}

/// Parse a boolean setting the way environment variables spell them
pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_spellings() {
        assert!(parse_bool("k", "TRUE").unwrap());
        assert!(parse_bool("k", "on").unwrap());
        assert!(!parse_bool("k", "0").unwrap());
        assert!(matches!(
            parse_bool("k", "maybe"),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
