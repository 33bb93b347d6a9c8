//! Configuration manager - main API for config operations

use crate::file::ConfigFile;
use crate::{Config, ConfigError, ConfigResult};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration manager
///
/// Locates the config file, loads it with defaults for anything left out,
/// and writes it back validated.
pub struct ConfigManager {
    file: ConfigFile,
}

impl ConfigManager {
    /// Creates a config manager using the platform config directory
    ///
    /// - Linux: `~/.config/shelfmark/`
    /// - macOS: `~/Library/Application Support/shelfmark/`
    /// - Windows: `%APPDATA%\shelfmark\`
    pub fn new() -> ConfigResult<Self> {
        let dirs = ProjectDirs::from("", "", "shelfmark").ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::with_directory(dirs.config_dir().to_path_buf()))
    }

    /// Creates a config manager for `config.toml` inside `config_dir`
    pub fn with_directory(config_dir: PathBuf) -> Self {
        Self::from_file(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Creates a config manager for an explicit config file
    pub fn from_file(config_path: impl Into<PathBuf>) -> Self {
        Self {
            file: ConfigFile::new(config_path.into()),
        }
    }

    pub fn config_path(&self) -> &Path {
        self.file.path()
    }

    /// Loads the configuration
    ///
    /// A missing file yields the defaults, anchored at the config directory.
    /// An empty or malformed file is an error. Invalid values are logged and
    /// left for the caller to reject.
    pub fn load(&self) -> ConfigResult<Config> {
        let config = match self.file.read()? {
            Some(config) => config,
            None => {
                log::info!(
                    "No config file at {}, using defaults",
                    self.config_path().display()
                );
                let mut config = Config::default();
                if let Some(dir) = self.config_path().parent() {
                    config.resolve_relative_to(dir);
                }
                config
            }
        };

        if let Err(errors) = config.validate() {
            for error in &errors {
                log::warn!("Config {}: {}", self.config_path().display(), error);
            }
        }

        Ok(config)
    }

    /// Validates and writes the configuration
    pub fn save(&self, config: &Config) -> ConfigResult<()> {
        config.validate().map_err(ConfigError::Invalid)?;
        self.file.write(config)
    }

    /// Writes a default config file if none exists
    ///
    /// Returns whether a file was created.
    pub fn initialize(&self) -> ConfigResult<bool> {
        if self.file.exists() {
            log::info!(
                "Config file already exists at {}",
                self.config_path().display()
            );
            return Ok(false);
        }

        self.save(&Config::default())?;
        Ok(true)
    }
}
