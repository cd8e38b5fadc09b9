//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/weft/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/weft/` (~/.config/weft/)
//! - State/Logs: `$XDG_STATE_HOME/weft/` (~/.local/state/weft/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
pub(crate) fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Live rebuild loop timing
    #[serde(default)]
    pub live: LiveConfig,

    /// Path overrides
    #[serde(default)]
    pub paths: PathOverrides,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Debounce windows for the live rebuild loop
#[derive(Debug, Deserialize, Clone)]
pub struct LiveConfig {
    /// Quiet period after a parent log write before rebuilding
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Quiet period after a sibling file appears while team members are
    /// spawning. Team sidecars fill in progressively, so this is longer.
    #[serde(default = "default_team_debounce_ms")]
    pub team_debounce_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            team_debounce_ms: default_team_debounce_ms(),
        }
    }
}

impl LiveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn team_debounce(&self) -> Duration {
        Duration::from_millis(self.team_debounce_ms)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms == 0 {
            return Err(Error::Config(
                "live.debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.team_debounce_ms < self.debounce_ms {
            return Err(Error::Config(
                "live.team_debounce_ms must not be shorter than live.debounce_ms".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_debounce_ms() -> u64 {
    150
}

fn default_team_debounce_ms() -> u64 {
    1000
}

/// Override paths for assistant data
#[derive(Debug, Deserialize, Default)]
pub struct PathOverrides {
    /// Override for `~/.claude/projects`
    pub projects_root: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.live.validate()?;
        Ok(config)
    }

    /// Root of the per-project session directories.
    ///
    /// Uses `paths.projects_root` when set, otherwise `~/.claude/projects`.
    pub fn projects_root(&self) -> PathBuf {
        self.paths
            .projects_root
            .clone()
            .unwrap_or_else(crate::paths::default_projects_root)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/weft/config.toml` (~/.config/weft/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("weft").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/weft/` (~/.local/state/weft/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("weft")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.live.debounce_ms, 150);
        assert_eq!(config.live.team_debounce_ms, 1000);
        assert_eq!(config.logging.level, "info");
        assert!(config.paths.projects_root.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[live]
debounce_ms = 50
team_debounce_ms = 400

[paths]
projects_root = "/tmp/claude/projects"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.live.debounce(), Duration::from_millis(50));
        assert_eq!(config.live.team_debounce(), Duration::from_millis(400));
        assert_eq!(
            config.projects_root(),
            PathBuf::from("/tmp/claude/projects")
        );
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_live_config_validation() {
        assert!(LiveConfig::default().validate().is_ok());

        let zero = LiveConfig {
            debounce_ms: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());

        let inverted = LiveConfig {
            debounce_ms: 500,
            team_debounce_ms: 100,
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_load_from_rejects_invalid_live_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[live]\ndebounce_ms = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
