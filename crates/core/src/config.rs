//! TOML-based configuration system for projvault.
//!
//! Every section is optional; a missing file section takes its defaults.
//! A few settings can be overridden from the environment through
//! [`AppConfig::apply_env_overrides`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::merge::MergeOptions;
use crate::project::{default_palette, ProjectSettings};

/// Environment variable overriding `storage.data_dir`.
pub const DATA_DIR_ENV: &str = "PROJVAULT_DATA_DIR";
/// Environment variable overriding `logging.level`.
pub const LOG_LEVEL_ENV: &str = "PROJVAULT_LOG_LEVEL";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where project data lives.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log verbosity.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Merge engine tunables and defaults for `merge apply`.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Branch defaults for new projects.
    #[serde(default)]
    pub branches: BranchConfig,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Database file name inside `data_dir`.
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("projvault"))
        .unwrap_or_else(|| PathBuf::from(".projvault"))
}
fn default_database_file() -> String {
    "projvault.db".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error. `RUST_LOG`
    /// takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Similarity above which a scalar conflict is auto-resolvable.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Similarity gap needed before one side is suggested.
    #[serde(default = "default_suggestion_margin")]
    pub suggestion_margin: f64,

    /// Confidence for conflicts found without a common ancestor.
    #[serde(default = "default_two_way_confidence")]
    pub two_way_confidence: f64,

    /// Commit merges as a new version (otherwise overwrite in place).
    #[serde(default = "default_true")]
    pub create_new_version: bool,

    /// Fill unresolved auto-resolvable conflicts with the engine's
    /// suggestion when applying.
    #[serde(default)]
    pub auto_apply_suggestions: bool,
}

fn default_similarity_threshold() -> f64 {
    0.8
}
fn default_suggestion_margin() -> f64 {
    0.3
}
fn default_two_way_confidence() -> f64 {
    0.3
}
fn default_true() -> bool {
    true
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            suggestion_margin: default_suggestion_margin(),
            two_way_confidence: default_two_way_confidence(),
            create_new_version: true,
            auto_apply_suggestions: false,
        }
    }
}

impl MergeConfig {
    pub fn options(&self) -> MergeOptions {
        MergeOptions {
            similarity_threshold: self.similarity_threshold,
            suggestion_margin: self.suggestion_margin,
            two_way_confidence: self.two_way_confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// Branches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    /// Name of the branch every new project starts on.
    #[serde(default = "default_branch_name")]
    pub default_name: String,

    /// Colours handed out to branches.
    #[serde(default = "default_palette")]
    pub palette: Vec<String>,
}

fn default_branch_name() -> String {
    "main".into()
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            default_name: default_branch_name(),
            palette: default_palette(),
        }
    }
}

impl BranchConfig {
    pub fn settings(&self) -> ProjectSettings {
        ProjectSettings {
            default_branch_name: self.default_name.clone(),
            palette: self.palette.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Apply `PROJVAULT_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(dir) = read_env(DATA_DIR_ENV) {
            debug!(data_dir = %dir, "data directory overridden from environment");
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(level) = read_env(LOG_LEVEL_ENV) {
            debug!(level = %level, "log level overridden from environment");
            self.logging.level = level;
        }
    }

    /// Validate that all values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("merge.similarity_threshold", self.merge.similarity_threshold),
            ("merge.suggestion_margin", self.merge.suggestion_margin),
            ("merge.two_way_confidence", self.merge.two_way_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    detail: format!("{} is outside [0, 1]", value),
                });
            }
        }
        if self.branches.default_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "branches.default_name".into(),
                detail: "default branch name must not be empty".into(),
            });
        }
        if self.branches.palette.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "branches.palette".into(),
                detail: "palette must contain at least one colour".into(),
            });
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".into(),
                detail: format!(
                    "unknown level '{}' (expected one of {})",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        if self.storage.database_file.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.database_file".into(),
                detail: "database file name must not be empty".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load, apply environment overrides, and validate in one
    /// call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/projvault/config.toml`, falling back to the working
    /// directory when the platform has no config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("projvault"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.database_file)
    }

    /// Render this configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Read a non-empty environment variable.
fn read_env(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => Some(val),
        Ok(_) => {
            warn!(env_name = name, "env var is set but empty");
            None
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r##"
[storage]
data_dir = "/tmp/projvault"
database_file = "vault.db"

[logging]
level = "debug"

[merge]
similarity_threshold = 0.9
suggestion_margin = 0.25
create_new_version = false

[branches]
default_name = "trunk"
palette = ["#111111", "#222222"]
"##
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/projvault"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.merge.similarity_threshold, 0.9);
        assert_eq!(config.merge.two_way_confidence, 0.3);
        assert!(!config.merge.create_new_version);
        assert_eq!(config.branches.default_name, "trunk");
        assert_eq!(config.branches.palette.len(), 2);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/projvault/vault.db"));
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.storage.database_file, "projvault.db");
        assert!(config.merge.create_new_version);
        assert!(!config.merge.auto_apply_suggestions);
        assert_eq!(config.merge.options(), MergeOptions::default());
        assert_eq!(config.branches.settings(), ProjectSettings::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.storage.database_file, "vault.db");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[merge\nsimilarity_threshold = ").unwrap();
        assert!(matches!(
            AppConfig::load_from_file(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = AppConfig::default();
        config.merge.similarity_threshold = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "merge.similarity_threshold"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_palette_and_branch() {
        let mut config = AppConfig::default();
        config.branches.palette.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "branches.palette"
        ));

        let mut config = AppConfig::default();
        config.branches.default_name = "  ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "branches.default_name"
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".into();
        assert!(config.validate().is_err());
        config.logging.level = "INFO".into();
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var(DATA_DIR_ENV, "/srv/projvault");
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.storage.data_dir, PathBuf::from("/srv/projvault"));
        std::env::remove_var(DATA_DIR_ENV);
    }

    #[test]
    fn test_toml_round_trip() {
        let config: AppConfig = toml::from_str(sample_toml()).unwrap();
        let rendered = config.to_toml().unwrap();
        let back: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(back.branches.palette, config.branches.palette);
        assert_eq!(back.merge.suggestion_margin, 0.25);
    }
}
