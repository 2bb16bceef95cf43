//! Engine configuration.
//!
//! Loaded from JSON; every field is optional and falls back to [`EngineConfig::default`].

use serde::{Deserialize, Serialize};

use crate::command::normalize_group_name;
use crate::error::ConfigError;

/// Longest group name accepted by default.
pub const DEFAULT_MAX_NAME_LENGTH: usize = 36;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Added to every query as `server=<value>` unless the query names a server.
    pub server: Option<String>,
    /// Added to every query as `world=<value>` unless the query names a world.
    pub world: Option<String>,
    /// Group that can never be deleted.
    pub default_group: String,
    pub max_name_length: usize,
    /// Emit a warning when the inheritance walk hits a cycle.
    pub log_inheritance_cycles: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            server: None,
            world: None,
            default_group: "default".to_owned(),
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            log_inheritance_cycles: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_name_length == 0 {
            return Err(ConfigError::Invalid("max_name_length must be greater than zero".into()));
        }
        normalize_group_name(&self.default_group, self.max_name_length)
            .map_err(|e| ConfigError::Invalid(format!("default_group: {e}")))?;
        for (key, value) in [("server", &self.server), ("world", &self.world)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!("{key} must not be blank")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        assert_eq!(EngineConfig::from_json_str("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = EngineConfig::from_json_str(r#"{"server": "lobby", "max_name_length": 16}"#).unwrap();
        assert_eq!(config.server.as_deref(), Some("lobby"));
        assert_eq!(config.max_name_length, 16);
        assert_eq!(config.default_group, "default");
        assert!(config.log_inheritance_cycles);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(EngineConfig::from_json_str("not json"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"max_name_length": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"default_group": "bad name!"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(EngineConfig::from_json_str(r#"{"world": " "}"#), Err(ConfigError::Invalid(_))));
    }
}
