//! Code for loading program settings.
use crate::get_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::Result;
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# This file contains the program settings for fabplan.
";

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_interval_min() -> u64 {
    60
}

fn default_workers() -> usize {
    4
}

fn default_timeout_sec() -> u64 {
    300
}

fn default_dev_dir() -> String {
    "./data".to_string()
}

/// Which backend a run's data crosses: a fixed flat-file bundle, or the live
/// tabular backend (optionally pointed at a staging vs. production instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SystemMode {
    #[default]
    LocalTest,
    Dev,
    Prod,
}

/// Whether the process polls the data source on a fixed interval, submitting a new
/// job each time, instead of waiting to be triggered through the HTTP API.
#[derive(Debug, DocumentedFields, Default, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// Whether the interval trigger runs alongside the HTTP API
    #[serde(default)]
    pub enabled: bool,
    /// Minutes between automatic job submissions when the trigger is enabled
    #[serde(default = "default_interval_min")]
    pub interval_min: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_min: default_interval_min(),
        }
    }
}

/// HTTP API surface configuration.
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Number of jobs the orchestrator will run concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// Solver budget configuration.
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct OptimizationConfig {
    /// Wall-clock seconds the solver is given before a job is marked timed out
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            timeout_sec: default_timeout_sec(),
        }
    }
}

/// Data source connection details for every system mode.
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Directory of flat CSV files used when `system_mode` is `dev`
    #[serde(default = "default_dev_dir")]
    pub dev_dir: String,
    /// Base URL of the live tabular backend, used in `prod` mode
    #[serde(default)]
    pub base_url: String,
    /// API key for the live tabular backend
    #[serde(default)]
    pub api_key: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dev_dir: default_dev_dir(),
            base_url: String::new(),
            api_key: String::new(),
        }
    }
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_config_dir();
    path.push(SETTINGS_FILE_NAME);
    path
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Which data backend this process talks to
    #[serde(default)]
    pub system_mode: SystemMode,
    /// Scheduled-trigger configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Solver budget configuration
    #[serde(default)]
    pub optimization: OptimizationConfig,
    /// Data source connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Settings {
    /// Read the contents of a settings file from the config directory.
    ///
    /// If the file is not present, default values for settings will be used
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }
        read_toml(file_path)
    }

    /// The contents of the default settings file
    pub fn default_file_contents() -> String {
        let settings: Settings =
            toml::from_str("").expect("Cannot create settings from empty TOML file");
        let settings_raw = toml::to_string(&settings).expect("Could not convert settings to TOML");

        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        let mut section: Option<String> = None;
        for line in settings_raw.split('\n') {
            let trimmed = line.trim();
            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                section = Some(name.to_string());
                writeln!(&mut out, "\n# [{name}]").unwrap();
                continue;
            }

            if let Some(last) = line.find('=') {
                let field = line[..last].trim();
                let docs = field_docs(section.as_deref(), field)
                    .unwrap_or_else(|| panic!("Missing doc comment for field {field}"));
                for docs_line in docs.split('\n') {
                    write!(&mut out, "\n# # {}\n", docs_line.trim()).unwrap();
                }
                writeln!(&mut out, "# {}", line.trim()).unwrap();
            }
        }

        out
    }
}

fn field_docs(section: Option<&str>, field: &str) -> Option<&'static str> {
    match section {
        None => Settings::get_field_docs(field).ok(),
        Some("scheduler") => SchedulerConfig::get_field_docs(field).ok(),
        Some("api") => ApiConfig::get_field_docs(field).ok(),
        Some("optimization") => OptimizationConfig::get_field_docs(field).ok(),
        Some("database") => DatabaseConfig::get_field_docs(field).ok(),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write as _;
    use tempfile::tempdir;

    #[test]
    fn load_from_path_falls_back_to_default_when_missing() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);
        assert_eq!(
            Settings::load_from_path(&file_path).unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn load_from_path_reads_overrides() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "log_level = \"warn\"").unwrap();
            writeln!(file, "system_mode = \"prod\"").unwrap();
        }

        let settings = Settings::load_from_path(&file_path).unwrap();
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.system_mode, SystemMode::Prod);
    }

    #[test]
    fn default_file_contents_is_non_empty_and_documents_every_field() {
        let contents = Settings::default_file_contents();
        assert!(!contents.is_empty());
        assert!(contents.contains("[scheduler]"));
        assert!(contents.contains("[database]"));
    }
}
