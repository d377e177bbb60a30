//! Declared adapter options resolved against user-supplied configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ConfigError;

/// One configuration knob an adapter understands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigOption {
    pub name: String,
    pub default: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConfigOption {
    #[must_use]
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            description: None,
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Resolved configuration: every declared option has a value, and keys
/// nobody declared are parked in `extras`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AdapterConfig {
    values: BTreeMap<String, Value>,
    extras: BTreeMap<String, Value>,
}

impl AdapterConfig {
    /// Fill declared options from `supplied`, falling back to their defaults.
    #[must_use]
    pub fn resolve(declared: &[ConfigOption], mut supplied: Map<String, Value>) -> Self {
        let mut values = BTreeMap::new();
        for option in declared {
            let value = supplied
                .remove(&option.name)
                .unwrap_or_else(|| option.default.clone());
            values.insert(option.name.clone(), value);
        }
        let extras: BTreeMap<String, Value> = supplied.into_iter().collect();
        if !extras.is_empty() {
            debug!(
                keys = ?extras.keys().collect::<Vec<_>>(),
                "keeping undeclared configuration keys"
            );
        }
        Self { values, extras }
    }

    /// Resolve using defaults only.
    #[must_use]
    pub fn defaults(declared: &[ConfigOption]) -> Self {
        Self::resolve(declared, Map::new())
    }

    pub fn get(&self, name: &str) -> Result<&Value, ConfigError> {
        self.values.get(name).ok_or_else(|| ConfigError::UnknownOption {
            name: name.to_string(),
        })
    }

    pub fn get_f64(&self, name: &str) -> Result<f64, ConfigError> {
        let value = self.get(name)?;
        value.as_f64().ok_or_else(|| mismatch(name, "a number", value))
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, ConfigError> {
        let value = self.get(name)?;
        value.as_bool().ok_or_else(|| mismatch(name, "a boolean", value))
    }

    pub fn get_str(&self, name: &str) -> Result<&str, ConfigError> {
        let value = self.get(name)?;
        value.as_str().ok_or_else(|| mismatch(name, "a string", value))
    }

    /// Optional unsigned integer; `null` reads as `None`.
    pub fn get_opt_u64(&self, name: &str) -> Result<Option<u64>, ConfigError> {
        let value = self.get(name)?;
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_u64()
            .map(Some)
            .ok_or_else(|| mismatch(name, "an unsigned integer or null", value))
    }

    /// Keys supplied without a matching declaration.
    #[must_use]
    pub fn extras(&self) -> &BTreeMap<String, Value> {
        &self.extras
    }
}

fn mismatch(name: &str, expected: &'static str, found: &Value) -> ConfigError {
    ConfigError::TypeMismatch {
        name: name.to_string(),
        expected,
        found: found.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declared() -> Vec<ConfigOption> {
        vec![
            ConfigOption::new("gain", 1.5).describe("actuator gain"),
            ConfigOption::new("enabled", true),
            ConfigOption::new("rng_seed", Value::Null),
        ]
    }

    #[test]
    fn defaults_fill_missing_options() {
        let supplied = json!({ "gain": 3.0 });
        let supplied = supplied.as_object().cloned().unwrap_or_default();
        let config = AdapterConfig::resolve(&declared(), supplied);
        assert_eq!(config.get_f64("gain").expect("gain"), 3.0);
        assert!(config.get_bool("enabled").expect("enabled"));
        assert_eq!(config.get_opt_u64("rng_seed").expect("seed"), None);
        assert!(config.extras().is_empty());
    }

    #[test]
    fn undeclared_keys_are_kept_aside() {
        let supplied = json!({ "colour": "teal", "enabled": false });
        let supplied = supplied.as_object().cloned().unwrap_or_default();
        let config = AdapterConfig::resolve(&declared(), supplied);
        assert_eq!(config.extras().get("colour"), Some(&json!("teal")));
        assert!(matches!(
            config.get("colour"),
            Err(ConfigError::UnknownOption { .. })
        ));
        assert!(!config.get_bool("enabled").expect("enabled"));
    }

    #[test]
    fn typed_getters_report_mismatch() {
        let supplied = json!({ "gain": "loud", "rng_seed": 7 });
        let supplied = supplied.as_object().cloned().unwrap_or_default();
        let config = AdapterConfig::resolve(&declared(), supplied);
        assert!(matches!(
            config.get_f64("gain"),
            Err(ConfigError::TypeMismatch { expected: "a number", .. })
        ));
        assert_eq!(config.get_opt_u64("rng_seed").expect("seed"), Some(7));
    }
}
