//! Configuration management for the extension host.
//!
//! This module handles loading and validation of host configuration from TOML
//! files, and applying command-line overrides on top of it.

use crate::cli::CliArgs;
use extension_host::PluginLoaderConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host settings
    #[serde(default)]
    pub host: HostSettings,
    /// Plugin discovery settings
    #[serde(default)]
    pub plugins: PluginSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Host-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSettings {
    /// Project root; plugins are discovered in `<root>/<plugins.plugins_dir>`
    pub root: PathBuf,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

/// Plugin system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSettings {
    /// Whether to discover and install plugins on startup
    #[serde(default = "default_auto_load")]
    pub auto_load: bool,
    /// Discovery and entry-point resolution settings
    #[serde(flatten)]
    pub loader: PluginLoaderConfig,
}

fn default_auto_load() -> bool {
    true
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            auto_load: default_auto_load(),
            loader: PluginLoaderConfig::default(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, a default configuration is written to that
    /// path and returned.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, args: &CliArgs) {
        if let Some(root) = &args.root {
            self.host.root = root.clone();
        }
        if let Some(dir) = &args.plugins_dir {
            self.plugins.loader.plugins_dir = dir.clone();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
        if args.no_auto_load {
            self.plugins.auto_load = false;
        }
        if args.danger_allow_abi_mismatch {
            self.plugins.loader.native.allow_abi_mismatch = true;
        }
        if args.strict_versioning {
            self.plugins.loader.native.strict_versioning = true;
        }
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<(), String> {
        if self.plugins.loader.plugins_dir.trim().is_empty() {
            return Err("Plugin directory cannot be empty".to_string());
        }

        if self.plugins.loader.manifest_file.trim().is_empty() {
            return Err("Plugin manifest file name cannot be empty".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn base_args() -> CliArgs {
        CliArgs {
            config_path: PathBuf::from("host.toml"),
            root: None,
            plugins_dir: None,
            log_level: None,
            json_logs: false,
            no_auto_load: false,
            danger_allow_abi_mismatch: false,
            strict_versioning: false,
        }
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.host.root, PathBuf::from("."));
        assert!(config.plugins.auto_load);
        assert_eq!(config.plugins.loader.plugins_dir, "plugins");
        assert_eq!(config.plugins.loader.manifest_file, "package.json");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("host.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(path.exists());

        // the written defaults read back
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.plugins.loader.build_dirs, config.plugins.loader.build_dirs);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[host]
root = "/srv/project"

[plugins]
auto_load = false
plugins_dir = "extensions"
prefer_source = false

[plugins.native]
strict_versioning = true

[logging]
level = "debug"
json_format = true
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();

        assert_eq!(config.host.root, PathBuf::from("/srv/project"));
        assert!(!config.plugins.auto_load);
        assert_eq!(config.plugins.loader.plugins_dir, "extensions");
        assert!(!config.plugins.loader.prefer_source);
        assert!(config.plugins.loader.native.strict_versioning);
        // unspecified loader fields keep their defaults
        assert_eq!(config.plugins.loader.default_entry, "src/index.ts");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = AppConfig::default();
        let args = CliArgs {
            root: Some(PathBuf::from("/tmp/project")),
            plugins_dir: Some("addons".to_string()),
            log_level: Some("trace".to_string()),
            no_auto_load: true,
            danger_allow_abi_mismatch: true,
            ..base_args()
        };

        config.apply_overrides(&args);

        assert_eq!(config.host.root, PathBuf::from("/tmp/project"));
        assert_eq!(config.plugins.loader.plugins_dir, "addons");
        assert_eq!(config.logging.level, "trace");
        assert!(!config.plugins.auto_load);
        assert!(config.plugins.loader.native.allow_abi_mismatch);
        assert!(!config.logging.json_format);
    }

    #[test]
    fn test_validation_empty_plugin_directory() {
        let mut config = AppConfig::default();
        config.plugins.loader.plugins_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        for level in ["trace", "debug", "info", "warn", "error"] {
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok());
        }
    }
}
