use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::autosave::AutosaveConfig;
use crate::providers::tasks::DEFAULT_MAX_ACTIVE_TASKS;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Files,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage_backend: StorageBackend,
    #[serde(default = "default_data_path")]
    pub data_path: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_max_daily_tasks")]
    pub max_daily_tasks: usize,
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,
    #[serde(default)]
    pub autosave: AutosaveSettings,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub key_bindings: KeyBindings,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutosaveSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_fallback_namespace")]
    pub fallback_namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default = "default_fg")]
    pub fg: String,
    #[serde(default = "default_bg")]
    pub bg: String,
    #[serde(default = "default_highlight_bg")]
    pub highlight_bg: String,
    #[serde(default = "default_highlight_fg")]
    pub highlight_fg: String,
    #[serde(default = "default_accent")]
    pub accent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyBindings {
    #[serde(default = "default_quit")]
    pub quit: String,
    #[serde(default = "default_new")]
    pub new: String,
    #[serde(default = "default_delete")]
    pub delete: String,
    #[serde(default = "default_toggle_task")]
    pub toggle_task: String,
    #[serde(default = "default_cycle_priority")]
    pub cycle_priority: String,
    #[serde(default = "default_list_up")]
    pub list_up: String,
    #[serde(default = "default_list_down")]
    pub list_down: String,
    #[serde(default = "default_pomodoro_toggle")]
    pub pomodoro_toggle: String,
    #[serde(default = "default_pomodoro_reset")]
    pub pomodoro_reset: String,
    #[serde(default = "default_toggle_adhd_mode")]
    pub toggle_adhd_mode: String,
    #[serde(default = "default_clear_completed")]
    pub clear_completed: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::default(),
            data_path: default_data_path(),
            log_level: default_log_level(),
            max_daily_tasks: default_max_daily_tasks(),
            sync_interval_ms: default_sync_interval_ms(),
            autosave: AutosaveSettings::default(),
            theme: Theme::default(),
            key_bindings: KeyBindings::default(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            max_retries: default_max_retries(),
            fallback_namespace: default_fallback_namespace(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            fg: default_fg(),
            bg: default_bg(),
            highlight_bg: default_highlight_bg(),
            highlight_fg: default_highlight_fg(),
            accent: default_accent(),
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            quit: default_quit(),
            new: default_new(),
            delete: default_delete(),
            toggle_task: default_toggle_task(),
            cycle_priority: default_cycle_priority(),
            list_up: default_list_up(),
            list_down: default_list_down(),
            pomodoro_toggle: default_pomodoro_toggle(),
            pomodoro_reset: default_pomodoro_reset(),
            toggle_adhd_mode: default_toggle_adhd_mode(),
            clear_completed: default_clear_completed(),
        }
    }
}

impl AutosaveSettings {
    pub fn to_autosave_config(&self) -> AutosaveConfig {
        AutosaveConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            max_retries: self.max_retries,
            fallback_namespace: self.fallback_namespace.clone(),
        }
    }
}

// Default value functions
fn default_data_path() -> String {
    // Fallback only; the profile's data dir is filled in at load time
    default_data_path_for_profile(utils::Profile::Prod)
}

fn default_data_path_for_profile(profile: utils::Profile) -> String {
    match utils::get_data_dir(profile) {
        Some(dir) => dir.to_string_lossy().to_string(),
        None => match profile {
            utils::Profile::Dev => "~/.local/share/tiempo-justo-dev".to_string(),
            utils::Profile::Prod => "~/.local/share/tiempo-justo".to_string(),
        },
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_daily_tasks() -> usize {
    DEFAULT_MAX_ACTIVE_TASKS
}

fn default_sync_interval_ms() -> u64 {
    1000
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_retry_interval_ms() -> u64 {
    2000
}

fn default_max_retries() -> u32 {
    3
}

fn default_fallback_namespace() -> String {
    "fallback:".to_string()
}

fn default_fg() -> String {
    "white".to_string()
}

fn default_bg() -> String {
    "black".to_string()
}

fn default_highlight_bg() -> String {
    "blue".to_string()
}

fn default_highlight_fg() -> String {
    "white".to_string()
}

fn default_accent() -> String {
    "yellow".to_string()
}

fn default_quit() -> String {
    "q".to_string()
}

fn default_new() -> String {
    "n".to_string()
}

fn default_delete() -> String {
    "d".to_string()
}

fn default_toggle_task() -> String {
    "Space".to_string()
}

fn default_cycle_priority() -> String {
    "p".to_string()
}

fn default_list_up() -> String {
    "k".to_string()
}

fn default_list_down() -> String {
    "j".to_string()
}

fn default_pomodoro_toggle() -> String {
    "s".to_string()
}

fn default_pomodoro_reset() -> String {
    "r".to_string()
}

fn default_toggle_adhd_mode() -> String {
    "g".to_string()
}

fn default_clear_completed() -> String {
    "c".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration from file, or create default if missing.
    /// An explicit `path` overrides the profile's config location.
    pub fn load_with_profile(profile: utils::Profile, path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(path) => path,
            None => Self::get_config_path(profile)?,
        };

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let config: Config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            let mut config = Config::default();
            config.data_path = default_data_path_for_profile(profile);
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Save configuration to `path`, creating parent directories
    pub fn save_to(&mut self, path: &PathBuf) -> Result<(), ConfigError> {
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile).ok_or_else(|| {
            ConfigError::ConfigDirError("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("config.toml"))
    }

    /// Data directory with `~` expanded
    pub fn get_data_path(&self) -> PathBuf {
        utils::expand_path(&self.data_path)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            storage_backend = "files"
            max_daily_tasks = 5

            [autosave]
            debounce_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.storage_backend, StorageBackend::Files);
        assert_eq!(config.max_daily_tasks, 5);
        assert_eq!(config.autosave.debounce_ms, 250);
        assert_eq!(config.autosave.max_retries, 3);
        assert_eq!(config.key_bindings.toggle_task, "Space");

        let autosave = config.autosave.to_autosave_config();
        assert_eq!(autosave.debounce, Duration::from_millis(250));
        assert_eq!(autosave.retry_interval, Duration::from_millis(2000));
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_with_profile(utils::Profile::Dev, Some(path.clone())).unwrap();
        assert!(path.exists());
        assert_eq!(config.max_daily_tasks, DEFAULT_MAX_ACTIVE_TASKS);

        let reloaded = Config::load_with_profile(utils::Profile::Dev, Some(path)).unwrap();
        assert_eq!(reloaded.data_path, config.data_path);
        assert_eq!(reloaded.config_version, Some(CURRENT_CONFIG_VERSION));
    }
}
