//! Configuration types.

use std::str::FromStr;

use crate::error::ConfigError;

/// Task manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    /// Clear acknowledgments expected before a load task starts loading
    /// (one per result list that has to be emptied).
    pub preparation_steps_for_load: u32,
    /// Location batches expected per load task.
    pub location_steps_for_load: u32,
    /// Feature definition steps expected per load task.
    pub feature_definition_steps_for_load: u32,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            preparation_steps_for_load: 2,
            location_steps_for_load: 1,
            feature_definition_steps_for_load: 1,
        }
    }
}

impl AdminConfig {
    /// Build a config from `FEATURE_ADMIN_*` environment variables, falling
    /// back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            preparation_steps_for_load: env_or(
                "FEATURE_ADMIN_PREPARATION_STEPS",
                defaults.preparation_steps_for_load,
            )?,
            location_steps_for_load: env_or(
                "FEATURE_ADMIN_LOCATION_STEPS",
                defaults.location_steps_for_load,
            )?,
            feature_definition_steps_for_load: env_or(
                "FEATURE_ADMIN_DEFINITION_STEPS",
                defaults.feature_definition_steps_for_load,
            )?,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{raw}': {e}"),
        })
}
