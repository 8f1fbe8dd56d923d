//! Reconciliation runtime configuration.

use onefs_core::config::{parse_bool, ConfigError, ConfigValidator, EngineConfig, ValidationResult};
use serde::{Deserialize, Serialize};

/// Order in which a relation's additions and removals are issued when the
/// parent identity is stable. A key change always removes first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationOrder {
    #[default]
    RemovesFirst,
    AddsFirst,
}

impl std::str::FromStr for RelationOrder {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "removes_first" | "removes-first" => Ok(Self::RemovesFirst),
            "adds_first" | "adds-first" => Ok(Self::AddsFirst),
            _ => Err(ConfigError::InvalidValue {
                key: "relation_order".to_string(),
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Delete a freshly created resource whose verification read failed
    pub compensate_failed_creates: bool,
    /// Re-read after an update instead of trusting the update echo
    pub verify_after_update: bool,
    pub relation_order: RelationOrder,
    /// Upper bound on pages followed by one drain; unbounded when absent
    pub max_pages: Option<u32>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            compensate_failed_creates: true,
            verify_after_update: true,
            relation_order: RelationOrder::RemovesFirst,
            max_pages: None,
        }
    }
}

impl EngineConfig for ReconcileConfig {
    const ENV_PREFIX: &'static str = "ONEFS_RECONCILE_";

    fn set_from_string(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "compensate_failed_creates" => self.compensate_failed_creates = parse_bool(key, value)?,
            "verify_after_update" => self.verify_after_update = parse_bool(key, value)?,
            "relation_order" => self.relation_order = value.parse()?,
            "max_pages" => {
                self.max_pages = match value.trim() {
                    "" | "none" => None,
                    raw => Some(raw.parse().map_err(|_| ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?),
                }
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    fn validate(&self) -> ValidationResult {
        let mut validator = ConfigValidator::new();
        if let Some(max_pages) = self.max_pages {
            validator.range("max_pages", max_pages, Some(1), None);
        }
        validator.result()
    }
}
