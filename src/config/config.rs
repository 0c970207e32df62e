use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub filter: FilterConfig,
    pub bridge: BridgeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Candidate values starting with this are error rows that travel with
    /// the value before them
    pub error_marker: String,

    /// Label of the pseudo-checkbox that selects every candidate
    pub select_all_label: String,

    /// How many filter events to keep for debugging
    pub history_size: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Whether new embedded panels may run scripts unless told otherwise
    pub default_enable_scripts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is not set, e.g. "info" or "grid_bridge=debug"
    pub level: String,

    /// Lines kept in the in-memory log buffer
    pub buffer_size: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            error_marker: "Error:".to_string(),
            select_all_label: "(Select All)".to_string(),
            history_size: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            buffer_size: 1000,
        }
    }
}

impl Config {
    /// Load config from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            // Create default config if it doesn't exist
            let default_config = Self::default();
            default_config.save_to(&config_path)?;
            return Ok(default_config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Get the default config file path
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("grid-bridge").join("config.toml"))
    }

    /// Create a default config file with comments
    pub fn create_default_with_comments() -> String {
        r#"# grid-bridge configuration
# Location: ~/.config/grid-bridge/config.toml (Linux)
#           ~/Library/Application Support/grid-bridge/config.toml (macOS)
#           %APPDATA%\grid-bridge\config.toml (Windows)

[filter]
# Candidate values starting with this marker are error rows. Checking the
# value right before one also checks the error row.
error_marker = "Error:"

# Label of the checkbox that selects every candidate value
select_all_label = "(Select All)"

# Number of filter events kept for debugging
history_size = 100

[bridge]
# Let new embedded panels run scripts by default
default_enable_scripts = false

[logging]
# Used when RUST_LOG is not set
level = "info"

# Lines kept in memory (shown with --logs)
buffer_size = 1000
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.filter.error_marker, "Error:");
        assert_eq!(config.filter.history_size, 100);
        assert!(!config.bridge.default_enable_scripts);
    }

    #[test]
    fn test_commented_template_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::create_default_with_comments()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.filter.select_all_label, defaults.filter.select_all_label);
        assert_eq!(parsed.logging.level, defaults.logging.level);
        assert_eq!(parsed.logging.buffer_size, defaults.logging.buffer_size);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[filter]\nerror_marker = \"ERR\"\n").unwrap();
        assert_eq!(parsed.filter.error_marker, "ERR");
        assert_eq!(parsed.filter.select_all_label, "(Select All)");
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.filter.history_size = 7;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.filter.history_size, 7);
    }
}
