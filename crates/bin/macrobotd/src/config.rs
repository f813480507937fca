//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `macrobot.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::BTreeMap;

use macrobot_domain::config::AutomationConfig;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    /// Overrides written into the stored automation settings at start-up.
    pub automation: AutomationOverrides,
    pub virtual_screen: VirtualScreenConfig,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Optional replacements for individual [`AutomationConfig`] fields.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AutomationOverrides {
    pub default_confidence: Option<f32>,
    pub default_delay_ms: Option<u64>,
    pub random_delay_variation_ms: Option<u64>,
    pub emergency_stop_key: Option<String>,
}

/// Templates placed on the simulated screen, by name.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VirtualScreenConfig {
    /// Template name to `[x, y]`.
    pub templates: BTreeMap<String, [i32; 2]>,
}

impl Config {
    /// Load configuration from `macrobot.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("macrobot.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MACROBOT_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("MACROBOT_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database url must not be empty".to_string(),
            ));
        }
        if let Some(confidence) = self.automation.default_confidence
            && !(0.0..=1.0).contains(&confidence)
        {
            return Err(ConfigError::Validation(format!(
                "default_confidence must be between 0 and 1, got {confidence}"
            )));
        }
        if self
            .automation
            .emergency_stop_key
            .as_deref()
            .is_some_and(|key| key.trim().is_empty())
        {
            return Err(ConfigError::Validation(
                "emergency_stop_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }
}

impl AutomationOverrides {
    /// Write every set override into `config`. Returns `true` when
    /// something changed.
    pub fn apply(&self, config: &mut AutomationConfig) -> bool {
        let before = config.clone();
        if let Some(confidence) = self.default_confidence {
            config.default_confidence = confidence;
        }
        if let Some(delay) = self.default_delay_ms {
            config.default_delay_ms = delay;
        }
        if let Some(variation) = self.random_delay_variation_ms {
            config.random_delay_variation_ms = variation;
        }
        if let Some(key) = &self.emergency_stop_key {
            config.emergency_stop_key.clone_from(key);
        }
        *config != before
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:macrobot.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "macrobotd=info,macrobot=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.database.url, "sqlite:macrobot.db?mode=rwc");
        assert_eq!(config.logging.filter, "macrobotd=info,macrobot=info");
        assert!(config.automation.default_delay_ms.is_none());
        assert!(config.virtual_screen.templates.is_empty());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.database_url(), "sqlite:macrobot.db?mode=rwc");
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [database]
            url = 'sqlite:test.db'

            [logging]
            filter = 'debug'

            [automation]
            default_confidence = 0.75
            default_delay_ms = 0
            random_delay_variation_ms = 10
            emergency_stop_key = 'F10'

            [virtual_screen.templates]
            'ok.png' = [120, 340]
            'close.png' = [5, 5]
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.database.url, "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.automation.default_confidence, Some(0.75));
        assert_eq!(config.automation.default_delay_ms, Some(0));
        assert_eq!(config.automation.random_delay_variation_ms, Some(10));
        assert_eq!(config.automation.emergency_stop_key.as_deref(), Some("F10"));
        assert_eq!(config.virtual_screen.templates.get("ok.png"), Some(&[120, 340]));
        assert_eq!(config.virtual_screen.templates.len(), 2);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.database.url, "sqlite:macrobot.db?mode=rwc");
    }

    #[test]
    fn should_reject_empty_database_url() {
        let mut config = Config::default();
        config.database.url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_confidence_outside_unit_range() {
        let mut config = Config::default();
        config.automation.default_confidence = Some(1.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_blank_emergency_stop_key() {
        let mut config = Config::default();
        config.automation.emergency_stop_key = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_report_change_when_override_differs() {
        let overrides = AutomationOverrides {
            default_delay_ms: Some(0),
            emergency_stop_key: Some("F10".to_string()),
            ..AutomationOverrides::default()
        };
        let mut settings = AutomationConfig::default();

        assert!(overrides.apply(&mut settings));
        assert_eq!(settings.default_delay_ms, 0);
        assert_eq!(settings.emergency_stop_key, "F10");
        assert!((settings.default_confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn should_report_no_change_when_overrides_match_settings() {
        let overrides = AutomationOverrides {
            default_delay_ms: Some(100),
            ..AutomationOverrides::default()
        };
        let mut settings = AutomationConfig::default();

        assert!(!overrides.apply(&mut settings));
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
