use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WardenError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub tracker: TrackerConfig,
    pub check_interval_seconds: u64,
    pub checkpoint_path: PathBuf,
    pub debug: DebugConfig,
    pub modules: HashMap<String, ModuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub url: String,
    pub username: String,
    pub password: Option<String>,
    /// Environment variable holding the password, consulted when `password` is unset
    pub password_env: Option<String>,
    /// Per-request deadline. Unset means requests may block indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            url: "https://bugs.example.com".to_string(),
            username: String::new(),
            password: None,
            password_env: Some("TICKETWARDEN_PASSWORD".to_string()),
            request_timeout_secs: None,
        }
    }
}

impl TrackerConfig {
    /// Resolve the password from the config file or the configured environment variable.
    pub fn resolve_password(&self) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        match &self.password_env {
            Some(var) => std::env::var(var)
                .map_err(|_| WardenError::Configuration(format!("password not set and ${} is empty", var))),
            None => Err(WardenError::Configuration("no tracker password configured".to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// When set, only these modules run, regardless of their own `enabled` flag
    pub enabled_modules: Option<Vec<String>>,
    /// When set, replaces every module's project scope with `key IN (...)`
    pub ticket_whitelist: Option<Vec<String>>,
}

/// Per-module settings. The first four fields are common to every module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub enabled: bool,
    pub project_whitelist: Option<Vec<String>>,
    pub resolution_filter: Option<Vec<String>>,
    pub excluded_statuses: Vec<String>,
    pub message: Option<String>,
    pub delay_minutes: Option<u64>,
    pub refresh_minutes: Option<u64>,
    /// Field id a module writes to, for modules that own a custom field
    pub field: Option<String>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project_whitelist: None,
            resolution_filter: None,
            excluded_statuses: Vec::new(),
            message: None,
            delay_minutes: None,
            refresh_minutes: None,
            field: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            tracker: TrackerConfig::default(),
            check_interval_seconds: 10,
            checkpoint_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ticketwarden")
                .join("last-run.json"),
            debug: DebugConfig::default(),
            modules: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config = Self::from_yaml(&content)?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Settings for one module; modules absent from the file get defaults.
    pub fn module(&self, name: &str) -> ModuleConfig {
        self.modules.get(name).cloned().unwrap_or_default()
    }

    /// Sleep between successful cycles, and the floor for every backoff sleep.
    pub fn min_cycle_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.check_interval_seconds, 10);
        assert_eq!(config.min_cycle_interval(), Duration::from_secs(10));
        assert!(config.debug.enabled_modules.is_none());
        assert!(config.modules.is_empty());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
check_interval_seconds: 30
tracker:
  url: https://tracker.test
  username: bot
  password: hunter2
debug:
  enabled_modules: [empty]
modules:
  empty:
    project_whitelist: [MC, REALMS]
    excluded_statuses: [Closed]
    message: please fill in the description
  future_version:
    enabled: false
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.check_interval_seconds, 30);
        assert_eq!(config.tracker.username, "bot");
        assert_eq!(config.debug.enabled_modules, Some(vec!["empty".to_string()]));

        let empty = config.module("empty");
        assert!(empty.enabled);
        assert_eq!(empty.project_whitelist, Some(vec!["MC".to_string(), "REALMS".to_string()]));
        assert_eq!(empty.excluded_statuses, vec!["Closed".to_string()]);

        assert!(!config.module("future_version").enabled);
    }

    #[test]
    fn test_missing_module_gets_defaults() {
        let config = Config::default();
        assert_eq!(config.module("nope"), ModuleConfig::default());
    }

    #[test]
    fn test_min_cycle_interval_never_zero() {
        let config = Config {
            check_interval_seconds: 0,
            ..Default::default()
        };
        assert_eq!(config.min_cycle_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_resolve_password_prefers_inline() {
        let tracker = TrackerConfig {
            password: Some("inline".to_string()),
            ..Default::default()
        };
        assert_eq!(tracker.resolve_password().unwrap(), "inline");
    }

    #[test]
    fn test_resolve_password_missing_is_configuration_error() {
        let tracker = TrackerConfig {
            password: None,
            password_env: Some("TICKETWARDEN_TEST_UNSET_PASSWORD_VAR".to_string()),
            ..Default::default()
        };
        let err = tracker.resolve_password().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ticketwarden.yml");
        fs::write(&path, "check_interval_seconds: 12\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.check_interval_seconds, 12);
    }
}
